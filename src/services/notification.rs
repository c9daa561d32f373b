use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::messaging::Consumer;
use crate::models::ImageStoredNotification;

/// Logs every "image stored" notification it receives. Holds no state.
pub struct NotificationSink {
    consumer: Consumer,
}

impl NotificationSink {
    pub fn new(consumer: Consumer) -> Self {
        Self { consumer }
    }

    pub async fn run(self, cancellation_token: CancellationToken) {
        info!(
            "Notification sink listening on '{}'",
            self.consumer.queue()
        );

        loop {
            let delivery = tokio::select! {
                _ = cancellation_token.cancelled() => break,
                delivery = self.consumer.next() => delivery,
            };
            let Some(delivery) = delivery else {
                break;
            };

            match ImageStoredNotification::parse(delivery.body()) {
                Some(notification) => info!(
                    "Received notification for uploaded image: {}",
                    notification.image_id
                ),
                None => warn!(
                    "Received notification with unexpected body: {}",
                    String::from_utf8_lossy(delivery.body())
                ),
            }
            delivery.ack();
        }

        info!("Notification sink stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::{IMAGE_UPLOADED_EXCHANGE, IMAGE_UPLOADED_ROUTING_KEY, MessageBroker};
    use std::time::Duration;
    use tracing::Instrument;
    use tracing_test::traced_test;
    use uuid::Uuid;

    #[tokio::test]
    #[traced_test]
    async fn test_sink_logs_and_acks_notifications() {
        let broker = MessageBroker::new(4);
        broker.declare_exchange(IMAGE_UPLOADED_EXCHANGE).await;
        let queue = broker.declare_queue("").await;
        broker
            .bind_queue(&queue, IMAGE_UPLOADED_EXCHANGE, IMAGE_UPLOADED_ROUTING_KEY)
            .await
            .unwrap();

        let sink = NotificationSink::new(broker.consume(&queue).await.unwrap());
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(sink.run(cancel.clone()).instrument(tracing::Span::current()));

        let id = Uuid::new_v4();
        broker
            .publish(
                IMAGE_UPLOADED_EXCHANGE,
                IMAGE_UPLOADED_ROUTING_KEY,
                ImageStoredNotification::new(id).to_body(),
            )
            .await
            .unwrap();

        let expected = format!("Received notification for uploaded image: {id}");
        tokio::time::timeout(Duration::from_secs(5), async {
            while !logs_contain(&expected) {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        cancel.cancel();
        handle.await.unwrap();
        assert_eq!(broker.queue_depth(&queue).await.unwrap(), 0);
    }
}
