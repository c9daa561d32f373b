use tracing::{debug, error, warn};
use uuid::Uuid;

use super::mime::detect_mime_type;
use crate::errors::MessagingResult;
use crate::messaging::{IMAGE_PROCESSING_EXCHANGE, IMAGE_PROCESSING_QUEUE, MessageBroker};
use crate::models::ImageProcessingRequest;

/// What the uploader is told after a submission
#[derive(Debug, Clone)]
pub struct UploadReceipt {
    pub request_id: Uuid,
    pub nickname: String,
    pub mime_type: String,
}

/// Turns accepted uploads into processing requests on the broker
#[derive(Clone)]
pub struct ImageUploadService {
    broker: MessageBroker,
}

impl ImageUploadService {
    pub fn new(broker: MessageBroker) -> Self {
        Self { broker }
    }

    /// Publish an upload for asynchronous ingestion.
    ///
    /// Never waits on the ingestion backlog. The receipt is returned whether or
    /// not the publish succeeded; a failed publish, a full queue included, is
    /// only logged.
    pub async fn submit(
        &self,
        nickname: &str,
        data: &[u8],
        declared_mime: Option<&str>,
    ) -> UploadReceipt {
        let mime_type = detect_mime_type(declared_mime, data);
        let request_id = Uuid::new_v4();
        let request = ImageProcessingRequest::new(request_id, nickname, data, mime_type.as_str());

        match self.publish(&request).await {
            Ok(0) => warn!(
                %request_id,
                "Processing request for '{}' was not routed to any queue", nickname
            ),
            Ok(_) => debug!(
                %request_id,
                bytes = data.len(),
                mime_type = %mime_type,
                "Published processing request for '{}'", nickname
            ),
            Err(e) => error!(
                %request_id,
                "Failed to publish processing request for '{}': {}", nickname, e
            ),
        }

        UploadReceipt {
            request_id,
            nickname: nickname.to_string(),
            mime_type,
        }
    }

    async fn publish(&self, request: &ImageProcessingRequest) -> MessagingResult<usize> {
        let body = request.to_json()?;
        self.broker
            .try_publish(IMAGE_PROCESSING_EXCHANGE, IMAGE_PROCESSING_QUEUE, body)
            .await
    }
}
