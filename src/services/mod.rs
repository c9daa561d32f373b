//! Application services sitting between the HTTP handlers, the broker and the store

pub mod ingestion;
pub mod lookup;
pub mod mime;
pub mod notification;
pub mod upload;

pub use ingestion::{ImageIngestionRelay, spawn_relay_workers};
pub use lookup::{CacheStatus, ImageLookupService, LookupResult};
pub use notification::NotificationSink;
pub use upload::{ImageUploadService, UploadReceipt};
