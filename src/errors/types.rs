//! Error type definitions for the photo service

use thiserror::Error;

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Repository layer errors
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Cache layer errors
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// Nothing is stored under the requested nickname
    #[error("No {resource} found for nickname '{nickname}'")]
    NotFound { resource: String, nickname: String },

    /// A nickname lookup failed below the web layer
    #[error("Error fetching images for nickname '{nickname}'")]
    Lookup {
        nickname: String,
        #[source]
        source: Box<AppError>,
    },
}

/// Repository layer specific errors
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// Database errors from SeaORM
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

/// Cache layer specific errors
#[derive(Error, Debug)]
pub enum CacheError {
    /// Redis command or connection failures
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// A cached value that does not follow the `<base64>|<mime>` layout
    #[error("Malformed cache entry for key '{key}': {value}")]
    MalformedEntry { key: String, value: String },
}

/// Message broker specific errors
#[derive(Error, Debug)]
pub enum MessagingError {
    #[error("Exchange not found: {exchange}")]
    ExchangeNotFound { exchange: String },

    #[error("Queue not found: {queue}")]
    QueueNotFound { queue: String },

    /// The queue already holds as many messages as it can buffer
    #[error("Queue full: {queue}")]
    QueueFull { queue: String },

    /// The receiving side of a queue has gone away
    #[error("Queue closed: {queue}")]
    QueueClosed { queue: String },

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Reasons an ingestion relay could not persist a processing request
#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("Malformed processing request: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid base64 image payload: {0}")]
    Payload(#[from] base64::DecodeError),

    #[error("Failed to persist image: {0}")]
    Persistence(#[from] RepositoryError),
}

/// Convenience methods for creating common error types
impl AppError {
    /// Create a not found error for a nickname
    pub fn not_found<R: Into<String>, N: Into<String>>(resource: R, nickname: N) -> Self {
        Self::NotFound {
            resource: resource.into(),
            nickname: nickname.into(),
        }
    }

    /// Attach the nickname being resolved to a lower-level failure
    pub fn lookup<N: Into<String>>(nickname: N, source: AppError) -> Self {
        Self::Lookup {
            nickname: nickname.into(),
            source: Box::new(source),
        }
    }
}

impl CacheError {
    pub fn malformed<K: Into<String>, V: Into<String>>(key: K, value: V) -> Self {
        Self::MalformedEntry {
            key: key.into(),
            value: value.into(),
        }
    }
}
