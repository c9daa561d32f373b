//! Create the images table
//!
//! One row per ingested upload. Rows are written once by the ingestion relay
//! and looked up by nickname, so nickname carries a (non-unique) index.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Images::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Images::Id).uuid().not_null().primary_key())
                    .col(Self::create_payload_column(manager, Images::ImageData))
                    .col(ColumnDef::new(Images::Nickname).string().not_null())
                    .col(ColumnDef::new(Images::MimeType).string().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_images_nickname")
                    .table(Images::Table)
                    .col(Images::Nickname)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Images::Table).to_owned())
            .await
    }
}

impl Migration {
    /// Binary payload column sized for full uploads on every backend
    fn create_payload_column(
        manager: &SchemaManager<'_>,
        column_name: impl sea_orm::Iden + 'static,
    ) -> ColumnDef {
        match manager.get_database_backend() {
            // MySQL's plain BLOB stops at 64KiB
            sea_orm::DatabaseBackend::MySql => ColumnDef::new(column_name)
                .custom(Alias::new("LONGBLOB"))
                .not_null()
                .to_owned(),
            _ => ColumnDef::new(column_name).blob().not_null().to_owned(),
        }
    }
}

/// Entity identifiers for the images table
#[derive(DeriveIden)]
pub enum Images {
    Table,
    Id,
    ImageData,
    Nickname,
    MimeType,
}
