//! SeaORM-based image repository

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use super::traits::ImageStore;
use crate::entities::{images, prelude::Images};
use crate::errors::RepositoryResult;
use crate::models::{Image, NewImage};

/// SeaORM-based repository for image records
#[derive(Clone)]
pub struct ImageSeaOrmRepository {
    connection: Arc<DatabaseConnection>,
}

impl ImageSeaOrmRepository {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    fn model_to_domain(model: images::Model) -> Image {
        Image {
            id: model.id,
            image_data: model.image_data,
            nickname: model.nickname,
            mime_type: model.mime_type,
        }
    }
}

#[async_trait::async_trait]
impl ImageStore for ImageSeaOrmRepository {
    async fn insert(&self, image: NewImage) -> RepositoryResult<Image> {
        let txn = self.connection.begin().await?;

        let active_model = images::ActiveModel {
            id: Set(image.id),
            image_data: Set(image.image_data),
            nickname: Set(image.nickname),
            mime_type: Set(image.mime_type),
        };
        let model = active_model.insert(&txn).await?;

        txn.commit().await?;
        debug!(image_id = %model.id, nickname = %model.nickname, "Committed image record");

        Ok(Self::model_to_domain(model))
    }

    /// Images under a nickname ordered by id, so every backend agrees on which comes first
    async fn find_by_nickname(&self, nickname: &str) -> RepositoryResult<Vec<Image>> {
        let models = Images::find()
            .filter(images::Column::Nickname.eq(nickname))
            .order_by_asc(images::Column::Id)
            .all(&*self.connection)
            .await?;

        Ok(models.into_iter().map(Self::model_to_domain).collect())
    }
}
