/// Fallback reported when nothing better is known about a payload
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Pick the MIME type for an uploaded payload.
///
/// A declared content type wins unless it is missing, blank or the generic
/// `application/octet-stream`. Otherwise the leading bytes are sniffed, and
/// only image signatures are accepted.
pub fn detect_mime_type(declared: Option<&str>, data: &[u8]) -> String {
    let declared = declared
        .map(str::trim)
        .filter(|mime| !mime.is_empty() && !mime.eq_ignore_ascii_case(OCTET_STREAM));

    if let Some(mime) = declared {
        return mime.to_string();
    }

    infer::get(data)
        .filter(|kind| kind.matcher_type() == infer::MatcherType::Image)
        .map(|kind| kind.mime_type().to_string())
        .unwrap_or_else(|| OCTET_STREAM.to_string())
}
