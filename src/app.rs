//! Application assembly: database, cache, broker topology and background workers

use anyhow::{Context, Result};
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cache::build_cache;
use crate::config::Config;
use crate::database::Database;
use crate::database::repositories::{ImageSeaOrmRepository, ImageStore};
use crate::messaging::{
    Consumer, IMAGE_PROCESSING_EXCHANGE, IMAGE_PROCESSING_QUEUE, IMAGE_UPLOADED_EXCHANGE,
    IMAGE_UPLOADED_ROUTING_KEY, MessageBroker,
};
use crate::services::{
    ImageIngestionRelay, ImageLookupService, ImageUploadService, NotificationSink,
    spawn_relay_workers,
};
use crate::web::{self, AppState};

/// A fully wired application: HTTP state plus the running relay workers and sink
pub struct PhotoApp {
    pub state: AppState,
    broker: MessageBroker,
    cancellation_token: CancellationToken,
    relay_workers: Vec<JoinHandle<()>>,
    notification_sink: JoinHandle<()>,
    max_upload_bytes: usize,
    shutdown_timeout: Duration,
}

impl PhotoApp {
    pub async fn build(config: Config) -> Result<Self> {
        config.validate()?;
        let max_upload_bytes = config.web.max_upload_bytes()?;
        let shutdown_timeout = config.messaging.shutdown_timeout()?;

        let database = Database::new(&config.database).await?;
        database.migrate().await?;
        let store: Arc<dyn ImageStore> =
            Arc::new(ImageSeaOrmRepository::new(database.connection()));

        let cache = build_cache(&config.cache).await;

        let broker = MessageBroker::new(config.messaging.queue_capacity);
        let (requests, notifications) = Self::declare_topology(&broker).await?;

        let cancellation_token = CancellationToken::new();

        let relay = Arc::new(ImageIngestionRelay::new(store.clone(), broker.clone()));
        let relay_workers = spawn_relay_workers(
            relay,
            requests,
            config.messaging.relay_workers,
            cancellation_token.clone(),
        );
        info!("Started {} ingestion relay worker(s)", relay_workers.len());

        let notification_sink =
            tokio::spawn(NotificationSink::new(notifications).run(cancellation_token.clone()));

        let state = AppState {
            config: Arc::new(config),
            database,
            upload_service: ImageUploadService::new(broker.clone()),
            lookup_service: ImageLookupService::new(store, cache),
        };

        Ok(Self {
            state,
            broker,
            cancellation_token,
            relay_workers,
            notification_sink,
            max_upload_bytes,
            shutdown_timeout,
        })
    }

    /// Declare exchanges and queues; returns the processing and notification consumers
    async fn declare_topology(broker: &MessageBroker) -> Result<(Consumer, Consumer)> {
        broker.declare_exchange(IMAGE_PROCESSING_EXCHANGE).await;
        broker.declare_queue(IMAGE_PROCESSING_QUEUE).await;
        broker
            .bind_queue(
                IMAGE_PROCESSING_QUEUE,
                IMAGE_PROCESSING_EXCHANGE,
                IMAGE_PROCESSING_QUEUE,
            )
            .await
            .context("Failed to bind image processing queue")?;

        broker.declare_exchange(IMAGE_UPLOADED_EXCHANGE).await;
        let notification_queue = broker.declare_queue("").await;
        broker
            .bind_queue(
                &notification_queue,
                IMAGE_UPLOADED_EXCHANGE,
                IMAGE_UPLOADED_ROUTING_KEY,
            )
            .await
            .context("Failed to bind notification queue")?;

        let requests = broker.consume(IMAGE_PROCESSING_QUEUE).await?;
        let notifications = broker.consume(&notification_queue).await?;
        Ok((requests, notifications))
    }

    pub fn router(&self) -> Router {
        web::create_router(self.state.clone(), self.max_upload_bytes)
    }

    /// Stop background processing.
    ///
    /// Requests already queued are drained by the relay workers for up to the
    /// configured shutdown timeout; whatever is left after that is abandoned.
    pub async fn shutdown(self) -> Result<()> {
        info!("Shutting down ingestion pipeline");

        self.broker.delete_queue(IMAGE_PROCESSING_QUEUE).await?;
        let drained = tokio::time::timeout(
            self.shutdown_timeout,
            join_relay_workers(self.relay_workers),
        )
        .await;
        if drained.is_err() {
            warn!(
                "Relay workers did not drain within {:?}, cancelling",
                self.shutdown_timeout
            );
        }

        self.cancellation_token.cancel();
        self.broker.close().await;
        if let Err(e) = self.notification_sink.await {
            warn!("Notification sink ended abnormally: {}", e);
        }

        info!("Ingestion pipeline stopped");
        Ok(())
    }
}

async fn join_relay_workers(handles: Vec<JoinHandle<()>>) {
    for handle in handles {
        if let Err(e) = handle.await {
            warn!("Relay worker ended abnormally: {}", e);
        }
    }
}
