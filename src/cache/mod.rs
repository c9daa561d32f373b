//! Nickname cache for image lookups
//!
//! Values are stored as `"<base64-payload>|<mime-type>"` strings keyed by
//! nickname. There is no TTL and no invalidation: an entry lives until the
//! backing store is flushed, and concurrent writers simply overwrite each other.

use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{CacheBackend, CacheConfig};
use crate::errors::{CacheError, CacheResult};
use crate::models::ImagePayload;

pub mod memory;
pub mod redis_cache;

pub use memory::MemoryImageCache;
pub use redis_cache::RedisImageCache;

/// Separates the base64 payload from the MIME type inside a cache value
pub const CACHE_DELIMITER: char = '|';

/// Key-value store used by the lookup service
#[async_trait::async_trait]
pub trait ImageCache: Send + Sync {
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    async fn set(&self, key: &str, value: String) -> CacheResult<()>;

    /// Short name surfaced by the health endpoint
    fn backend_name(&self) -> &'static str;
}

/// A cache value decoded into its payload and MIME type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedImage {
    pub payload: ImagePayload,
}

impl CachedImage {
    pub fn encode(&self) -> String {
        format!(
            "{}{}{}",
            self.payload.image_data, CACHE_DELIMITER, self.payload.mime_type
        )
    }

    /// Split a raw cache value. A value without the delimiter is an error, not a miss.
    pub fn parse(key: &str, raw: &str) -> CacheResult<Self> {
        let (image_data, mime_type) = raw
            .split_once(CACHE_DELIMITER)
            .ok_or_else(|| CacheError::malformed(key, raw))?;

        Ok(Self {
            payload: ImagePayload {
                image_data: image_data.to_string(),
                mime_type: mime_type.to_string(),
            },
        })
    }
}

impl From<ImagePayload> for CachedImage {
    fn from(payload: ImagePayload) -> Self {
        Self { payload }
    }
}

/// Build the configured cache backend.
///
/// Returns `None` when caching is disabled, or when Redis cannot be reached at
/// startup; lookups then go straight to the database.
pub async fn build_cache(config: &CacheConfig) -> Option<Arc<dyn ImageCache>> {
    match config.backend {
        CacheBackend::Disabled => {
            info!("Image cache disabled by configuration");
            None
        }
        CacheBackend::Memory => {
            info!("Using in-memory image cache");
            Some(Arc::new(MemoryImageCache::new()))
        }
        CacheBackend::Redis => match RedisImageCache::connect(&config.redis_url).await {
            Ok(cache) => {
                info!("Connected to Redis image cache");
                Some(Arc::new(cache))
            }
            Err(e) => {
                warn!(
                    "Could not connect to Redis at {}: {}. Caching will be disabled.",
                    config.redis_url, e
                );
                None
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cached_image_encoding() {
        let cached = CachedImage::from(ImagePayload {
            image_data: "AQI=".to_string(),
            mime_type: "image/png".to_string(),
        });
        assert_eq!(cached.encode(), "AQI=|image/png");
        assert_eq!(CachedImage::parse("cat", "AQI=|image/png").unwrap(), cached);
    }

    #[test]
    fn test_missing_delimiter_is_malformed() {
        let err = CachedImage::parse("cat", "AQI=").unwrap_err();
        assert!(matches!(err, CacheError::MalformedEntry { ref key, .. } if key == "cat"));
    }

    #[tokio::test]
    async fn test_build_cache_respects_backend() {
        let disabled = CacheConfig {
            backend: CacheBackend::Disabled,
            ..CacheConfig::default()
        };
        assert!(build_cache(&disabled).await.is_none());

        let memory = build_cache(&CacheConfig::default()).await.unwrap();
        assert_eq!(memory.backend_name(), "memory");
    }

    #[tokio::test]
    async fn test_unreachable_redis_disables_cache() {
        let config = CacheConfig {
            backend: CacheBackend::Redis,
            redis_url: "redis://127.0.0.1:1/0".to_string(),
        };
        assert!(build_cache(&config).await.is_none());
    }
}
