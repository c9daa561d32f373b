//! Upload form and embedded static assets

use axum::{
    http::{StatusCode, Uri, header},
    response::{Html, IntoResponse, Response},
};

use crate::assets::StaticAssets;

/// Serve the upload form
pub async fn index() -> Response {
    match StaticAssets::get_asset("static/index.html") {
        Some(file) => {
            let content = String::from_utf8_lossy(&file.data);
            Html(content.into_owned()).into_response()
        }
        None => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Html("<h1>500 Internal Server Error</h1><p>Upload form not found</p>".to_string()),
        )
            .into_response(),
    }
}

/// Fallback: serve any other embedded file under `/static/`, 404 otherwise
pub async fn serve_embedded_asset(uri: Uri) -> Response {
    let path = uri.path().trim_start_matches('/');

    match StaticAssets::get_asset(path) {
        Some(file) if path.starts_with("static/") => (
            [(header::CONTENT_TYPE, StaticAssets::get_content_type(path))],
            file.data.into_owned(),
        )
            .into_response(),
        _ => (StatusCode::NOT_FOUND, "Not Found").into_response(),
    }
}
