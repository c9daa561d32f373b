//! Image upload, lookup and MIME sniffing handlers

use axum::{
    Json,
    body::Bytes,
    extract::{
        Multipart, Path, State,
        multipart::{MultipartError, MultipartRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::{error, info};

use crate::errors::{AppError, AppResult};
use crate::services::mime::detect_mime_type;
use crate::web::{
    AppState,
    responses::{ErrorBody, upload_accepted, upload_failed},
};

pub const NICKNAME_FIELD: &str = "nickname";
pub const IMAGE_FIELD: &str = "image_data";
pub const CACHE_HEADER: &str = "x-cache";

/// Uploaded file part with the content type the client declared for it
struct FilePart {
    data: Bytes,
    content_type: Option<String>,
}

#[derive(Default)]
struct UploadForm {
    nickname: Option<String>,
    image: Option<FilePart>,
}

async fn read_upload_form(multipart: &mut Multipart) -> Result<UploadForm, MultipartError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some(NICKNAME_FIELD) => form.nickname = Some(field.text().await?),
            Some(IMAGE_FIELD) => {
                let content_type = field.content_type().map(str::to_string);
                let data = field.bytes().await?;
                form.image = Some(FilePart { data, content_type });
            }
            _ => {}
        }
    }

    Ok(form)
}

/// Read failures caused by an oversized body keep their 413; anything else is a 500
fn read_failure_status(error: &MultipartError) -> StatusCode {
    match error.status() {
        StatusCode::PAYLOAD_TOO_LARGE => StatusCode::PAYLOAD_TOO_LARGE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Accept an upload and queue it for ingestion.
///
/// Responds 202 as soon as the request is published; persistence happens later.
pub async fn upload_image(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let mut multipart = match multipart {
        Ok(multipart) => multipart,
        Err(rejection) => {
            return upload_failed(StatusCode::BAD_REQUEST, &rejection.body_text());
        }
    };

    let form = match read_upload_form(&mut multipart).await {
        Ok(form) => form,
        Err(e) => {
            error!("Failed to read upload: {}", e);
            return upload_failed(read_failure_status(&e), &e.body_text());
        }
    };

    let Some(nickname) = form.nickname else {
        return upload_failed(
            StatusCode::BAD_REQUEST,
            &format!("missing form field '{}'", NICKNAME_FIELD),
        );
    };
    let Some(image) = form.image else {
        return upload_failed(
            StatusCode::BAD_REQUEST,
            &format!("missing form field '{}'", IMAGE_FIELD),
        );
    };

    let receipt = state
        .upload_service
        .submit(&nickname, &image.data, image.content_type.as_deref())
        .await;

    info!(
        request_id = %receipt.request_id,
        mime_type = %receipt.mime_type,
        "Accepted upload of {} bytes for '{}'",
        image.data.len(),
        receipt.nickname
    );

    upload_accepted(&receipt.request_id.to_string(), &receipt.nickname)
}

/// Look up the image stored under a nickname through the cache
pub async fn get_image(
    State(state): State<AppState>,
    Path(nickname): Path<String>,
) -> AppResult<Response> {
    let result = state
        .lookup_service
        .lookup(&nickname)
        .await
        .map_err(|e| AppError::lookup(nickname.as_str(), e))?
        .ok_or_else(|| AppError::not_found("images", nickname.as_str()))?;

    let cache_status: &'static str = result.cache_status.into();
    Ok(([(CACHE_HEADER, cache_status)], Json(vec![result.image])).into_response())
}

#[derive(Debug, Serialize)]
pub struct SniffResponse {
    pub mime_type: String,
}

/// Report the MIME type an upload of the given file would be stored with
pub async fn sniff_mime(multipart: Result<Multipart, MultipartRejection>) -> Response {
    let bad_request =
        |message: String| (StatusCode::BAD_REQUEST, Json(ErrorBody::new(message))).into_response();

    let mut multipart = match multipart {
        Ok(multipart) => multipart,
        Err(rejection) => return bad_request(rejection.body_text()),
    };

    match read_upload_form(&mut multipart).await {
        Ok(UploadForm {
            image: Some(image), ..
        }) => Json(SniffResponse {
            mime_type: detect_mime_type(image.content_type.as_deref(), &image.data),
        })
        .into_response(),
        Ok(_) => bad_request(format!("missing form field '{}'", IMAGE_FIELD)),
        Err(e) => bad_request(e.body_text()),
    }
}
