use redis::{AsyncCommands, Client, aio::ConnectionManager};
use std::time::Duration;

use super::ImageCache;
use crate::errors::{CacheError, CacheResult};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Redis-backed cache. The connection manager reconnects on its own after a
/// dropped connection; commands issued while it is down fail and are
/// reported to the caller.
#[derive(Clone)]
pub struct RedisImageCache {
    conn: ConnectionManager,
}

impl RedisImageCache {
    /// Open a managed connection and confirm the server answers PING
    pub async fn connect(redis_url: &str) -> CacheResult<Self> {
        let client = Client::open(redis_url)?;
        let mut conn = tokio::time::timeout(CONNECT_TIMEOUT, ConnectionManager::new(client))
            .await
            .map_err(|_| {
                CacheError::Redis(redis::RedisError::from((
                    redis::ErrorKind::IoError,
                    "Timed out connecting to Redis",
                )))
            })??;

        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(Self { conn })
    }
}

#[async_trait::async_trait]
impl ImageCache for RedisImageCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.conn.clone();
        Ok(conn.get(key).await?)
    }

    async fn set(&self, key: &str, value: String) -> CacheResult<()> {
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(key, value).await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
