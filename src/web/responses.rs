//! HTTP response types and error mapping

use axum::{
    Json,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::error;

use super::utils::html_escape;
use crate::errors::{AppError, CacheError};

/// JSON error payload: `{"error": "...", "details": "..."}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorBody {
    pub fn new<S: Into<String>>(error: S) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details<S: Into<String>, D: Into<String>>(error: S, details: D) -> Self {
        Self {
            error: error.into(),
            details: Some(details.into()),
        }
    }
}

/// Convert AppError to appropriate HTTP response
pub fn handle_error(error: AppError) -> Response {
    let (status, body) = match &error {
        AppError::NotFound { .. } => (StatusCode::NOT_FOUND, ErrorBody::new(error.to_string())),
        AppError::Lookup { source, .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorBody::with_details(error.to_string(), source.to_string()),
        ),
        AppError::Cache(CacheError::MalformedEntry { key, .. }) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorBody::with_details("Malformed cache entry", format!("key '{}'", key)),
        ),
        AppError::Repository(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorBody::with_details("Data access failed", error.to_string()),
        ),
        AppError::Cache(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorBody::with_details("Cache backend failed", error.to_string()),
        ),
    };

    if status.is_server_error() {
        match std::error::Error::source(&error) {
            Some(cause) => error!("Request failed: {}: {}", error, cause),
            None => error!("Request failed: {}", error),
        }
    }

    (status, Json(body)).into_response()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        handle_error(self)
    }
}

/// HTML fragment returned to the upload form on success
pub fn upload_accepted(request_id: &str, nickname: &str) -> Response {
    (
        StatusCode::ACCEPTED,
        Html(format!(
            "<div class='success-message'>Request {} received. \
             Image '{}' is being processed.</div>",
            html_escape(request_id),
            html_escape(nickname)
        )),
    )
        .into_response()
}

/// HTML fragment returned to the upload form on failure
pub fn upload_failed(status: StatusCode, reason: &str) -> Response {
    (
        status,
        Html(format!(
            "<div class='error-message'>Image upload failed: {}</div>",
            html_escape(reason)
        )),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::RepositoryError;

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(
            handle_error(AppError::not_found("images", "cat")).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            handle_error(CacheError::malformed("cat", "oops").into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            handle_error(AppError::Repository(RepositoryError::Database(
                sea_orm::DbErr::Custom("down".into())
            )))
            .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_lookup_error_keeps_nickname_and_cause() {
        let error = AppError::lookup("cat", CacheError::malformed("cat", "oops").into());
        assert_eq!(error.to_string(), "Error fetching images for nickname 'cat'");

        let AppError::Lookup { source, .. } = &error else {
            panic!("expected a lookup error");
        };
        assert!(source.to_string().contains("Malformed cache entry"));
        assert_eq!(handle_error(error).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_error_body_omits_empty_details() {
        let json = serde_json::to_value(ErrorBody::new("nope")).unwrap();
        assert_eq!(json, serde_json::json!({ "error": "nope" }));
    }
}
