//! Web utility functions

/// Escape text for safe interpolation into an HTML fragment
pub fn html_escape(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_escape() {
        assert_eq!(html_escape("cat"), "cat");
        assert_eq!(
            html_escape("<b>'tom' & \"jerry\"</b>"),
            "&lt;b&gt;&#x27;tom&#x27; &amp; &quot;jerry&quot;&lt;/b&gt;"
        );
    }
}
