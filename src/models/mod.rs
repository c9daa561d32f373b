use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A persisted image. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub id: Uuid,
    pub image_data: Vec<u8>,
    pub nickname: String,
    pub mime_type: String,
}

/// Insert request for the image store. The id is assigned by the caller.
#[derive(Debug, Clone)]
pub struct NewImage {
    pub id: Uuid,
    pub image_data: Vec<u8>,
    pub nickname: String,
    pub mime_type: String,
}

/// Wire view of an image: base64 payload plus its MIME type.
///
/// This is both the lookup response element and the cached value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagePayload {
    pub image_data: String,
    pub mime_type: String,
}

impl From<&Image> for ImagePayload {
    fn from(image: &Image) -> Self {
        Self {
            image_data: STANDARD.encode(&image.image_data),
            mime_type: image.mime_type.clone(),
        }
    }
}

/// Message published by the upload endpoint and consumed by the ingestion relay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageProcessingRequest {
    /// Correlation id for log traceability only; never persisted
    pub request_id: String,
    pub nickname: String,
    /// Standard base64 with padding
    pub image_data: String,
    pub mime_type: String,
}

impl ImageProcessingRequest {
    pub fn new(
        request_id: Uuid,
        nickname: impl Into<String>,
        data: &[u8],
        mime_type: impl Into<String>,
    ) -> Self {
        Self {
            request_id: request_id.to_string(),
            nickname: nickname.into(),
            image_data: STANDARD.encode(data),
            mime_type: mime_type.into(),
        }
    }

    pub fn from_json(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }

    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn decode_image_data(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(self.image_data.as_bytes())
    }

    /// Best-effort extraction of the request id from a body that may not fully parse
    pub fn peek_request_id(body: &[u8]) -> Option<String> {
        #[derive(Deserialize)]
        struct Partial {
            request_id: Option<String>,
        }

        serde_json::from_slice::<Partial>(body)
            .ok()
            .and_then(|partial| partial.request_id)
    }
}

/// Notification emitted after an image has been committed. The body is the bare id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageStoredNotification {
    pub image_id: Uuid,
}

impl ImageStoredNotification {
    pub fn new(image_id: Uuid) -> Self {
        Self { image_id }
    }

    pub fn to_body(&self) -> Vec<u8> {
        self.image_id.to_string().into_bytes()
    }

    pub fn parse(body: &[u8]) -> Option<Self> {
        let text = std::str::from_utf8(body).ok()?;
        Uuid::parse_str(text.trim()).ok().map(Self::new)
    }
}
