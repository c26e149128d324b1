//! Client configuration.
//!
//! Every field has a serde default, so a partial TOML table (or none at
//! all) yields a working configuration.

use std::num::NonZeroU64;
use std::time::Duration;

use sbg_transfer::{
    DEFAULT_DOWNLOAD_CONCURRENCY, DEFAULT_PART_SIZE, DEFAULT_UPLOAD_CONCURRENCY, PoolConfig,
    RetryPolicy,
};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ClientError;

pub const DEFAULT_BASE_URL: &str = "https://api.sbgenomics.com/v2";

/// Connection and transfer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Authentication token sent as `X-Sbg-Auth-Token`.
    #[serde(default)]
    pub token: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Per-request timeout in seconds (0 disables it).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "TransferSettings::upload", deserialize_with = "upload_settings")]
    pub upload: TransferSettings,

    #[serde(default = "TransferSettings::download", deserialize_with = "download_settings")]
    pub download: TransferSettings,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.into()
}

fn default_user_agent() -> String {
    format!("sbg-client/{}", env!("CARGO_PKG_VERSION"))
}

fn default_timeout_secs() -> u64 {
    300
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: String::new(),
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            upload: TransferSettings::upload(),
            download: TransferSettings::download(),
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.into(),
            ..Self::default()
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }

    /// Rejects settings no transfer could run with.
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.base_url.trim().is_empty() {
            return Err(ClientError::InvalidConfig("base_url is empty".into()));
        }
        self.upload.validate("upload")?;
        self.download.validate("download")?;
        Ok(())
    }
}

/// Sizing and retry settings for one transfer direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferSettings {
    /// Bytes per range. For uploads this is only a suggestion; the server
    /// decides the final part size.
    pub part_size: u64,

    /// Maximum concurrent ranges in flight.
    pub concurrency: usize,

    /// Attempts per range, first try included (0 = unlimited).
    pub max_attempts: u32,

    pub initial_backoff_ms: u64,

    pub max_backoff_ms: u64,
}

/// A settings table as written by the user: absent keys fall back to the
/// defaults of the direction the table configures.
#[derive(Deserialize)]
struct PartialSettings {
    part_size: Option<u64>,
    concurrency: Option<usize>,
    max_attempts: Option<u32>,
    initial_backoff_ms: Option<u64>,
    max_backoff_ms: Option<u64>,
}

impl PartialSettings {
    fn resolve(self, defaults: TransferSettings) -> TransferSettings {
        TransferSettings {
            part_size: self.part_size.unwrap_or(defaults.part_size),
            concurrency: self.concurrency.unwrap_or(defaults.concurrency),
            max_attempts: self.max_attempts.unwrap_or(defaults.max_attempts),
            initial_backoff_ms: self.initial_backoff_ms.unwrap_or(defaults.initial_backoff_ms),
            max_backoff_ms: self.max_backoff_ms.unwrap_or(defaults.max_backoff_ms),
        }
    }
}

fn upload_settings<'de, D: Deserializer<'de>>(d: D) -> Result<TransferSettings, D::Error> {
    PartialSettings::deserialize(d).map(|p| p.resolve(TransferSettings::upload()))
}

fn download_settings<'de, D: Deserializer<'de>>(d: D) -> Result<TransferSettings, D::Error> {
    PartialSettings::deserialize(d).map(|p| p.resolve(TransferSettings::download()))
}

impl TransferSettings {
    pub fn upload() -> Self {
        Self::with_concurrency(DEFAULT_UPLOAD_CONCURRENCY)
    }

    pub fn download() -> Self {
        Self::with_concurrency(DEFAULT_DOWNLOAD_CONCURRENCY)
    }

    fn with_concurrency(concurrency: usize) -> Self {
        Self {
            part_size: DEFAULT_PART_SIZE,
            concurrency,
            max_attempts: 5,
            initial_backoff_ms: 250,
            max_backoff_ms: 15_000,
        }
    }

    pub fn part_size(&self) -> Result<NonZeroU64, ClientError> {
        NonZeroU64::new(self.part_size)
            .ok_or_else(|| ClientError::InvalidConfig("part_size must be greater than zero".into()))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_delay: Duration::from_millis(self.initial_backoff_ms),
            max_delay: Duration::from_millis(self.max_backoff_ms),
            ..RetryPolicy::default()
        }
    }

    pub fn pool_config(&self) -> Result<PoolConfig, ClientError> {
        if self.concurrency == 0 {
            return Err(ClientError::InvalidConfig(
                "concurrency must be greater than zero".into(),
            ));
        }
        Ok(PoolConfig::new(self.concurrency, self.retry_policy()))
    }

    fn validate(&self, direction: &str) -> Result<(), ClientError> {
        self.part_size()
            .and_then(|_| self.pool_config())
            .map(|_| ())
            .map_err(|e| match e {
                ClientError::InvalidConfig(msg) => {
                    ClientError::InvalidConfig(format!("{direction}: {msg}"))
                }
                other => other,
            })
    }
}
