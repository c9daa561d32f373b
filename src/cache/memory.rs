use std::collections::HashMap;
use tokio::sync::RwLock;

use super::ImageCache;
use crate::errors::CacheResult;

/// Process-local cache backend. Contents are lost on restart.
#[derive(Default)]
pub struct MemoryImageCache {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryImageCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ImageCache for MemoryImageCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> CacheResult<()> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
