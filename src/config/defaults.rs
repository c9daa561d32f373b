//! Configuration default values
//!
//! This module contains all the default values for configuration options,
//! making them easily changeable in one central location.

use bytesize::ByteSize;

// Database defaults
pub const DEFAULT_DATABASE_URL: &str = "sqlite://./data/photo.db";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

// Web server defaults
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_MAX_UPLOAD_SIZE: ByteSize = ByteSize::mib(10);

// Cache defaults
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379/0";

// Messaging defaults
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;
pub const DEFAULT_RELAY_WORKERS: usize = 2;
pub const DEFAULT_SHUTDOWN_TIMEOUT: &str = "10s";

// Environment variable prefix; nested keys are separated by a double underscore
pub const ENV_PREFIX: &str = "PHOTO_APP_";
