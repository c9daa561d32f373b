//! SeaORM repository implementations
//!
//! Repositories work across SQLite, PostgreSQL and MySQL and hand domain
//! models, never SeaORM models, back to callers.

pub mod image;
pub mod traits;

pub use image::ImageSeaOrmRepository;
pub use traits::ImageStore;
