//! Image upload service with asynchronous ingestion and a read-through
//! nickname cache.
//!
//! Uploads are accepted over HTTP and published to an in-process message
//! broker. Relay workers persist them through SeaORM and announce each stored
//! image. Lookups by nickname go through a Redis or in-memory cache.

pub mod app;
pub mod assets;
pub mod cache;
pub mod config;
pub mod database;
pub mod entities;
pub mod errors;
pub mod messaging;
pub mod models;
pub mod services;
pub mod web;

pub use app::PhotoApp;
