//! Message routing between the upload endpoint, the ingestion relay and the
//! notification sink
//!
//! Producers and consumers never call each other directly; everything flows
//! through named exchanges and queues on the [`MessageBroker`].

pub mod broker;

pub use broker::{Consumer, Delivery, MessageBroker};

/// Exchange receiving image processing requests from the upload endpoint
pub const IMAGE_PROCESSING_EXCHANGE: &str = "image-processing";
/// Durable work queue drained by the ingestion relay workers; also its routing key
pub const IMAGE_PROCESSING_QUEUE: &str = "image-processing-queue";
/// Exchange carrying "image stored" notifications
pub const IMAGE_UPLOADED_EXCHANGE: &str = "photo-app";
pub const IMAGE_UPLOADED_ROUTING_KEY: &str = "image.uploaded";
