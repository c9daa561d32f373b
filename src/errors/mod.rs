//! Centralized error handling for the photo service
//!
//! Every layer owns a focused error enum. They all funnel into [`AppError`],
//! which the web layer maps onto HTTP status codes.
//!
//! # Error Categories
//!
//! - **Database Errors**: SeaORM connection and migration failures
//! - **Repository Errors**: image persistence and lookup failures
//! - **Cache Errors**: key-value store failures and malformed cache entries
//! - **Messaging Errors**: broker topology and delivery failures
//! - **Ingestion Errors**: processing requests the relay cannot persist
//!
//! # Usage
//!
//! ```rust
//! use photo_app::errors::{AppError, AppResult};
//!
//! fn first_image(nickname: &str, found: Vec<String>) -> AppResult<String> {
//!     found
//!         .into_iter()
//!         .next()
//!         .ok_or_else(|| AppError::not_found("images", nickname))
//! }
//!
//! let err = first_image("cat", Vec::new()).unwrap_err();
//! assert_eq!(err.to_string(), "No images found for nickname 'cat'");
//! ```

pub mod types;

pub use types::*;

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Convenience type alias for Repository Results
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Convenience type alias for Cache Results
pub type CacheResult<T> = Result<T, CacheError>;

/// Convenience type alias for Messaging Results
pub type MessagingResult<T> = Result<T, MessagingError>;
