//! Ingestion relay: processing requests in, stored images and notifications out

use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::database::repositories::ImageStore;
use crate::errors::IngestionError;
use crate::messaging::{
    Consumer, Delivery, IMAGE_UPLOADED_EXCHANGE, IMAGE_UPLOADED_ROUTING_KEY, MessageBroker,
};
use crate::models::{ImageProcessingRequest, ImageStoredNotification, NewImage};

/// Persists processing requests and announces each stored image
pub struct ImageIngestionRelay {
    store: Arc<dyn ImageStore>,
    broker: MessageBroker,
}

impl ImageIngestionRelay {
    pub fn new(store: Arc<dyn ImageStore>, broker: MessageBroker) -> Self {
        Self { store, broker }
    }

    /// Decode and persist one request body, then publish the new image id.
    ///
    /// A failed notification publish is logged and does not fail the call;
    /// the record is already committed at that point.
    pub async fn process(&self, body: &[u8]) -> Result<Uuid, IngestionError> {
        let request = ImageProcessingRequest::from_json(body)?;
        let image_data = request.decode_image_data()?;

        let image = self
            .store
            .insert(NewImage {
                id: Uuid::new_v4(),
                image_data,
                nickname: request.nickname.clone(),
                mime_type: request.mime_type.clone(),
            })
            .await?;

        info!(
            "Request {}: Image with nickname '{}' uploaded successfully.",
            request.request_id, request.nickname
        );

        let notification = ImageStoredNotification::new(image.id);
        match self
            .broker
            .publish(
                IMAGE_UPLOADED_EXCHANGE,
                IMAGE_UPLOADED_ROUTING_KEY,
                notification.to_body(),
            )
            .await
        {
            Ok(routed) => debug!(image_id = %image.id, routed, "Published stored notification"),
            Err(e) => error!(
                "Request {}: failed to publish notification for image {}: {}",
                request.request_id, image.id, e
            ),
        }

        Ok(image.id)
    }

    /// Process a delivery and acknowledge it. Failures are logged, never retried.
    pub async fn handle_delivery(&self, delivery: Delivery) {
        if delivery.redelivered() {
            warn!(
                "Delivery {} is a redelivery of an unacknowledged message",
                delivery.delivery_tag()
            );
        }

        if let Err(e) = self.process(delivery.body()).await {
            let request_id = ImageProcessingRequest::peek_request_id(delivery.body())
                .unwrap_or_else(|| "<unknown>".to_string());
            error!("Request {}: failed to ingest image: {}", request_id, e);
        }

        delivery.ack();
    }
}

/// Start `workers` relay workers competing on `consumer`'s queue.
///
/// Each message runs in its own task so a panic is confined to that message;
/// its unacknowledged delivery is requeued by the broker. Workers finish the
/// message in hand and stop when `cancellation_token` fires or the queue closes.
pub fn spawn_relay_workers(
    relay: Arc<ImageIngestionRelay>,
    consumer: Consumer,
    workers: usize,
    cancellation_token: CancellationToken,
) -> Vec<JoinHandle<()>> {
    (0..workers.max(1))
        .map(|worker_id| {
            let relay = relay.clone();
            let consumer = consumer.clone();
            let cancellation_token = cancellation_token.clone();
            tokio::spawn(run_worker(worker_id, relay, consumer, cancellation_token))
        })
        .collect()
}

async fn run_worker(
    worker_id: usize,
    relay: Arc<ImageIngestionRelay>,
    consumer: Consumer,
    cancellation_token: CancellationToken,
) {
    info!(
        "Ingestion relay worker {} consuming from '{}'",
        worker_id,
        consumer.queue()
    );

    loop {
        let delivery = tokio::select! {
            _ = cancellation_token.cancelled() => {
                info!("Ingestion relay worker {} received cancellation signal", worker_id);
                break;
            }
            delivery = consumer.next() => delivery,
        };

        let Some(delivery) = delivery else {
            info!("Ingestion relay worker {}: queue closed", worker_id);
            break;
        };

        let delivery_tag = delivery.delivery_tag();
        let relay = relay.clone();
        let task = tokio::spawn(async move { relay.handle_delivery(delivery).await });

        if let Err(e) = task.await {
            error!(
                "Ingestion relay worker {}: processing of delivery {} aborted: {}",
                worker_id, delivery_tag, e
            );
        }
    }

    info!("Ingestion relay worker {} stopped", worker_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{RepositoryError, RepositoryResult};
    use crate::messaging::{IMAGE_PROCESSING_EXCHANGE, IMAGE_PROCESSING_QUEUE};
    use crate::models::Image;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use tokio::sync::Mutex;

    /// In-memory store that can be told to panic on a given nickname
    #[derive(Default)]
    struct RecordingStore {
        images: Mutex<Vec<Image>>,
        panic_on: Option<String>,
        panicked: AtomicBool,
    }

    #[async_trait::async_trait]
    impl ImageStore for RecordingStore {
        async fn insert(&self, image: NewImage) -> RepositoryResult<Image> {
            if self.panic_on.as_deref() == Some(image.nickname.as_str()) {
                self.panicked.store(true, Ordering::SeqCst);
                panic!("store exploded");
            }
            if image.nickname == "broken" {
                return Err(RepositoryError::Database(sea_orm::DbErr::Custom(
                    "disk full".to_string(),
                )));
            }
            let image = Image {
                id: image.id,
                image_data: image.image_data,
                nickname: image.nickname,
                mime_type: image.mime_type,
            };
            self.images.lock().await.push(image.clone());
            Ok(image)
        }

        async fn find_by_nickname(&self, nickname: &str) -> RepositoryResult<Vec<Image>> {
            Ok(self
                .images
                .lock()
                .await
                .iter()
                .filter(|image| image.nickname == nickname)
                .cloned()
                .collect())
        }
    }

    async fn topology() -> (MessageBroker, Consumer, Consumer) {
        let broker = MessageBroker::new(16);
        broker.declare_exchange(IMAGE_PROCESSING_EXCHANGE).await;
        broker.declare_queue(IMAGE_PROCESSING_QUEUE).await;
        broker
            .bind_queue(IMAGE_PROCESSING_QUEUE, IMAGE_PROCESSING_EXCHANGE, IMAGE_PROCESSING_QUEUE)
            .await
            .unwrap();
        broker.declare_exchange(IMAGE_UPLOADED_EXCHANGE).await;
        let notifications = broker.declare_queue("").await;
        broker
            .bind_queue(&notifications, IMAGE_UPLOADED_EXCHANGE, IMAGE_UPLOADED_ROUTING_KEY)
            .await
            .unwrap();

        let requests = broker.consume(IMAGE_PROCESSING_QUEUE).await.unwrap();
        let notifications = broker.consume(&notifications).await.unwrap();
        (broker, requests, notifications)
    }

    fn request_body(nickname: &str, data: &[u8]) -> Vec<u8> {
        ImageProcessingRequest::new(Uuid::new_v4(), nickname, data, "image/png")
            .to_json()
            .unwrap()
    }

    async fn wait_for_images(store: &RecordingStore, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while store.images.lock().await.len() < count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_process_persists_and_notifies() {
        let (broker, _, notifications) = topology().await;
        let store = Arc::new(RecordingStore::default());
        let relay = ImageIngestionRelay::new(store.clone(), broker);

        let id = relay.process(&request_body("cat", &[0x01, 0x02])).await.unwrap();

        let stored = store.find_by_nickname("cat").await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, id);
        assert_eq!(stored[0].image_data, vec![0x01, 0x02]);

        let delivery = notifications.next().await.unwrap();
        assert_eq!(ImageStoredNotification::parse(delivery.body()).unwrap().image_id, id);
        delivery.ack();
    }

    #[tokio::test]
    async fn test_invalid_payloads_create_no_record() {
        let (broker, _, _) = topology().await;
        let store = Arc::new(RecordingStore::default());
        let relay = ImageIngestionRelay::new(store.clone(), broker);

        let bad_base64 = serde_json::json!({
            "request_id": "r-1",
            "nickname": "cat",
            "image_data": "***not base64***",
            "mime_type": "image/png",
        });
        let err = relay
            .process(bad_base64.to_string().as_bytes())
            .await
            .unwrap_err();
        assert!(matches!(err, IngestionError::Payload(_)));

        let err = relay.process(b"{not json").await.unwrap_err();
        assert!(matches!(err, IngestionError::Decode(_)));

        let err = relay.process(&request_body("broken", &[1])).await.unwrap_err();
        assert!(matches!(err, IngestionError::Persistence(_)));

        assert!(store.images.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_missing_notification_exchange_keeps_record() {
        let broker = MessageBroker::new(4);
        let store = Arc::new(RecordingStore::default());
        let relay = ImageIngestionRelay::new(store.clone(), broker);

        relay.process(&request_body("cat", &[7])).await.unwrap();
        assert_eq!(store.images.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_workers_keep_going_after_bad_messages() {
        let (broker, requests, _) = topology().await;
        let store = Arc::new(RecordingStore::default());
        let relay = Arc::new(ImageIngestionRelay::new(store.clone(), broker.clone()));
        let cancel = CancellationToken::new();
        let handles = spawn_relay_workers(relay, requests, 2, cancel.clone());

        broker
            .publish(IMAGE_PROCESSING_EXCHANGE, IMAGE_PROCESSING_QUEUE, &b"garbage"[..])
            .await
            .unwrap();
        for nickname in ["cat", "dog"] {
            broker
                .publish(
                    IMAGE_PROCESSING_EXCHANGE,
                    IMAGE_PROCESSING_QUEUE,
                    request_body(nickname, &[1, 2, 3]),
                )
                .await
                .unwrap();
        }

        wait_for_images(&store, 2).await;
        cancel.cancel();
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(broker.queue_depth(IMAGE_PROCESSING_QUEUE).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_panicking_message_is_contained() {
        let (broker, requests, _) = topology().await;
        let store = Arc::new(RecordingStore {
            panic_on: Some("boom".to_string()),
            ..RecordingStore::default()
        });
        let relay = Arc::new(ImageIngestionRelay::new(store.clone(), broker.clone()));
        let cancel = CancellationToken::new();
        let handles = spawn_relay_workers(relay, requests, 1, cancel.clone());

        for nickname in ["boom", "cat"] {
            broker
                .publish(
                    IMAGE_PROCESSING_EXCHANGE,
                    IMAGE_PROCESSING_QUEUE,
                    request_body(nickname, &[9]),
                )
                .await
                .unwrap();
        }

        wait_for_images(&store, 1).await;
        assert!(store.panicked.load(Ordering::SeqCst));

        // The panicked message is requeued once, panics again and is then discarded
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(broker.queue_depth(IMAGE_PROCESSING_QUEUE).await.unwrap(), 0);
        assert_eq!(store.find_by_nickname("cat").await.unwrap().len(), 1);

        cancel.cancel();
        for handle in handles {
            handle.await.unwrap();
        }
    }
}
