use anyhow::{Context, Result};
use bytesize::ByteSize;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use strum::{Display, EnumString};
use tracing::info;

pub mod defaults;

use defaults::*;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub web: WebConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub messaging: MessagingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    pub max_connections: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Upper bound for multipart upload bodies, e.g. "10MiB"
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size: ByteSize,
}

/// Which key-value store backs the nickname cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CacheBackend {
    Memory,
    Redis,
    Disabled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_backend")]
    pub backend: CacheBackend,
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagingConfig {
    /// Bound of every broker queue; publishers wait when a queue is full
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Number of ingestion relay workers competing on the processing queue
    #[serde(default = "default_relay_workers")]
    pub relay_workers: usize,
    /// How long shutdown waits for in-flight messages, e.g. "10s"
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout: String,
}

fn default_database_url() -> String {
    DEFAULT_DATABASE_URL.to_string()
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_max_upload_size() -> ByteSize {
    DEFAULT_MAX_UPLOAD_SIZE
}

fn default_cache_backend() -> CacheBackend {
    CacheBackend::Memory
}

fn default_redis_url() -> String {
    DEFAULT_REDIS_URL.to_string()
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

fn default_relay_workers() -> usize {
    DEFAULT_RELAY_WORKERS
}

fn default_shutdown_timeout() -> String {
    DEFAULT_SHUTDOWN_TIMEOUT.to_string()
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: default_cache_backend(),
            redis_url: default_redis_url(),
        }
    }
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            relay_workers: default_relay_workers(),
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: default_database_url(),
                max_connections: Some(DEFAULT_MAX_CONNECTIONS),
            },
            web: WebConfig {
                host: default_host(),
                port: default_port(),
                max_upload_size: default_max_upload_size(),
            },
            cache: CacheConfig::default(),
            messaging: MessagingConfig::default(),
        }
    }
}

impl WebConfig {
    pub fn max_upload_bytes(&self) -> Result<usize> {
        usize::try_from(self.max_upload_size.as_u64()).with_context(|| {
            format!(
                "web.max_upload_size {} does not fit this platform",
                self.max_upload_size
            )
        })
    }
}

impl MessagingConfig {
    pub fn shutdown_timeout(&self) -> Result<Duration> {
        humantime::parse_duration(&self.shutdown_timeout).with_context(|| {
            format!(
                "Invalid messaging.shutdown_timeout '{}'",
                self.shutdown_timeout
            )
        })
    }
}

impl Config {
    /// Layer defaults, an optional TOML file and `PHOTO_APP_*` environment variables
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));

        if let Some(path) = config_file {
            if path.exists() {
                info!("Loading configuration from {}", path.display());
            } else {
                info!(
                    "Configuration file {} not found, using defaults",
                    path.display()
                );
            }
            figment = figment.merge(Toml::file(path));
        }

        let config: Config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to load configuration")?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.web.max_upload_bytes()?;
        self.messaging.shutdown_timeout()?;
        if self.messaging.queue_capacity == 0 {
            anyhow::bail!("messaging.queue_capacity must be greater than zero");
        }
        if self.messaging.relay_workers == 0 {
            anyhow::bail!("messaging.relay_workers must be greater than zero");
        }
        Ok(())
    }
}
