//! Storage seams shared by services and their test doubles

use crate::errors::RepositoryResult;
use crate::models::{Image, NewImage};

/// Durable image store consumed by the ingestion relay and the lookup service
#[async_trait::async_trait]
pub trait ImageStore: Send + Sync {
    /// Persist a new image atomically
    async fn insert(&self, image: NewImage) -> RepositoryResult<Image>;

    /// All images carrying the nickname, in store order
    async fn find_by_nickname(&self, nickname: &str) -> RepositoryResult<Vec<Image>>;
}
