//! Read-through cache over the image store

use std::sync::Arc;
use strum::{Display, IntoStaticStr};
use tracing::{debug, warn};

use crate::cache::{CachedImage, ImageCache};
use crate::database::repositories::ImageStore;
use crate::errors::AppResult;
use crate::models::ImagePayload;

/// Where a lookup answer came from; surfaced as the `X-Cache` response header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "UPPERCASE")]
pub enum CacheStatus {
    Hit,
    Miss,
    /// Caching is disabled; the store was queried directly
    Bypass,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupResult {
    pub image: ImagePayload,
    pub cache_status: CacheStatus,
}

#[derive(Clone)]
pub struct ImageLookupService {
    store: Arc<dyn ImageStore>,
    cache: Option<Arc<dyn ImageCache>>,
}

impl ImageLookupService {
    pub fn new(store: Arc<dyn ImageStore>, cache: Option<Arc<dyn ImageCache>>) -> Self {
        Self { store, cache }
    }

    pub fn cache_backend(&self) -> &'static str {
        self.cache
            .as_ref()
            .map(|cache| cache.backend_name())
            .unwrap_or("disabled")
    }

    /// Resolve a nickname to one image, `None` when nothing was ever stored under it.
    ///
    /// With several images under one nickname the first in store order is used.
    /// A cache entry without the payload delimiter is an error.
    pub async fn lookup(&self, nickname: &str) -> AppResult<Option<LookupResult>> {
        let Some(cache) = &self.cache else {
            return Ok(self.fetch_from_store(nickname).await?.map(|image| LookupResult {
                image,
                cache_status: CacheStatus::Bypass,
            }));
        };

        match cache.get(nickname).await {
            Ok(Some(raw)) => {
                debug!("Cache hit for nickname '{}'", nickname);
                let cached = CachedImage::parse(nickname, &raw)?;
                return Ok(Some(LookupResult {
                    image: cached.payload,
                    cache_status: CacheStatus::Hit,
                }));
            }
            Ok(None) => debug!("Cache miss for nickname '{}'", nickname),
            Err(e) => warn!(
                "Cache read for nickname '{}' failed, falling back to database: {}",
                nickname, e
            ),
        }

        let Some(image) = self.fetch_from_store(nickname).await? else {
            return Ok(None);
        };

        let entry = CachedImage::from(image.clone()).encode();
        if let Err(e) = cache.set(nickname, entry).await {
            warn!("Failed to cache image for nickname '{}': {}", nickname, e);
        }

        Ok(Some(LookupResult {
            image,
            cache_status: CacheStatus::Miss,
        }))
    }

    async fn fetch_from_store(&self, nickname: &str) -> AppResult<Option<ImagePayload>> {
        let images = self.store.find_by_nickname(nickname).await?;
        if images.len() > 1 {
            debug!(
                "{} images share nickname '{}', using the first",
                images.len(),
                nickname
            );
        }
        Ok(images.first().map(ImagePayload::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryImageCache;
    use crate::errors::{AppError, CacheError, CacheResult, RepositoryError, RepositoryResult};
    use crate::models::{Image, NewImage};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    /// Store double that counts queries
    #[derive(Default)]
    struct CountingStore {
        images: Vec<Image>,
        queries: AtomicUsize,
        fail: bool,
    }

    impl CountingStore {
        fn with(images: &[(&str, &[u8], &str)]) -> Self {
            Self {
                images: images
                    .iter()
                    .map(|(nickname, data, mime)| Image {
                        id: Uuid::new_v4(),
                        image_data: data.to_vec(),
                        nickname: nickname.to_string(),
                        mime_type: mime.to_string(),
                    })
                    .collect(),
                ..Self::default()
            }
        }

        fn queries(&self) -> usize {
            self.queries.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl ImageStore for CountingStore {
        async fn insert(&self, _image: NewImage) -> RepositoryResult<Image> {
            unimplemented!("lookups never insert")
        }

        async fn find_by_nickname(&self, nickname: &str) -> RepositoryResult<Vec<Image>> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(RepositoryError::Database(sea_orm::DbErr::Custom(
                    "connection reset".to_string(),
                )));
            }
            Ok(self
                .images
                .iter()
                .filter(|image| image.nickname == nickname)
                .cloned()
                .collect())
        }
    }

    /// Cache double whose reads and writes always fail
    struct BrokenCache;

    #[async_trait::async_trait]
    impl ImageCache for BrokenCache {
        async fn get(&self, _key: &str) -> CacheResult<Option<String>> {
            Err(CacheError::malformed("any", "backend down"))
        }

        async fn set(&self, _key: &str, _value: String) -> CacheResult<()> {
            Err(CacheError::malformed("any", "backend down"))
        }

        fn backend_name(&self) -> &'static str {
            "broken"
        }
    }

    #[tokio::test]
    async fn test_miss_then_hit_skips_store() {
        let store = Arc::new(CountingStore::with(&[("cat", &[0x01, 0x02], "image/png")]));
        let cache = Arc::new(MemoryImageCache::new());
        let service = ImageLookupService::new(store.clone(), Some(cache.clone()));

        let first = service.lookup("cat").await.unwrap().unwrap();
        assert_eq!(first.cache_status, CacheStatus::Miss);
        assert_eq!(first.image.image_data, "AQI=");
        assert_eq!(first.image.mime_type, "image/png");
        assert_eq!(
            cache.get("cat").await.unwrap().as_deref(),
            Some("AQI=|image/png")
        );

        let second = service.lookup("cat").await.unwrap().unwrap();
        assert_eq!(second.cache_status, CacheStatus::Hit);
        assert_eq!(second.image, first.image);
        assert_eq!(store.queries(), 1);
    }

    #[tokio::test]
    async fn test_unknown_nickname_is_none_and_not_cached() {
        let store = Arc::new(CountingStore::default());
        let cache = Arc::new(MemoryImageCache::new());
        let service = ImageLookupService::new(store, Some(cache.clone()));

        assert!(service.lookup("does-not-exist").await.unwrap().is_none());
        assert!(cache.get("does-not-exist").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_nickname_resolves_to_first() {
        let store = Arc::new(CountingStore::with(&[
            ("cat", &[1], "image/png"),
            ("cat", &[2], "image/gif"),
        ]));
        let service = ImageLookupService::new(store, None);

        for _ in 0..3 {
            let result = service.lookup("cat").await.unwrap().unwrap();
            assert_eq!(result.image.mime_type, "image/png");
            assert_eq!(result.cache_status, CacheStatus::Bypass);
        }
    }

    #[tokio::test]
    async fn test_malformed_entry_is_an_error() {
        let store = Arc::new(CountingStore::default());
        let cache = Arc::new(MemoryImageCache::new());
        cache.set("cat", "no-delimiter".to_string()).await.unwrap();
        let service = ImageLookupService::new(store.clone(), Some(cache));

        let err = service.lookup("cat").await.unwrap_err();
        assert!(matches!(err, AppError::Cache(CacheError::MalformedEntry { .. })));
        assert_eq!(store.queries(), 0);
    }

    #[tokio::test]
    async fn test_cache_failures_fall_back_to_store() {
        let store = Arc::new(CountingStore::with(&[("cat", &[5], "image/png")]));
        let service = ImageLookupService::new(store.clone(), Some(Arc::new(BrokenCache)));

        let result = service.lookup("cat").await.unwrap().unwrap();
        assert_eq!(result.cache_status, CacheStatus::Miss);
        assert_eq!(store.queries(), 1);
        assert_eq!(service.cache_backend(), "broken");
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let store = Arc::new(CountingStore {
            fail: true,
            ..CountingStore::default()
        });
        let service = ImageLookupService::new(store, None);

        let err = service.lookup("cat").await.unwrap_err();
        assert!(matches!(err, AppError::Repository(_)));
        assert_eq!(service.cache_backend(), "disabled");
    }

    #[test]
    fn test_cache_status_header_values() {
        assert_eq!(CacheStatus::Hit.to_string(), "HIT");
        let miss: &'static str = CacheStatus::Miss.into();
        assert_eq!(miss, "MISS");
        assert_eq!(CacheStatus::Bypass.to_string(), "BYPASS");
    }
}
