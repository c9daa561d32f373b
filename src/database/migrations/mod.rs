//! SeaORM migrations for multi-database support
//!
//! Migrations are written once and work across SQLite, PostgreSQL and MySQL.
//! Column types that differ between backends are chosen per backend.

use sea_orm_migration::prelude::*;

pub mod m20241019_000001_create_images;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(m20241019_000001_create_images::Migration)]
    }
}
