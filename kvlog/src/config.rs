//! Configuration options for the log.
//!
//! This module defines the configuration structs that control storage setup
//! and the retry and poll limits of the log engine. Every struct
//! deserializes from YAML with defaults for omitted fields.

use common::StorageConfig;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default number of entries returned per topic by a single poll.
pub const DEFAULT_MAX_POLL_MESSAGES: usize = 10;

/// Configuration for opening a [`Log`](crate::Log).
///
/// # Example
///
/// ```ignore
/// use kvlog::{Config, Log};
/// use common::StorageConfig;
///
/// let config = Config {
///     storage: StorageConfig::InMemory,
///     ..Default::default()
/// };
/// let log = Log::open(config).await?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage backend configuration.
    ///
    /// See [`StorageConfig`] for the in-memory and SlateDB backends.
    pub storage: StorageConfig,

    /// Retry policy for compare-and-swap loops.
    pub retry: RetryConfig,

    /// Maximum number of entries returned per topic by one poll.
    pub max_poll_messages: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            retry: RetryConfig::default(),
            max_poll_messages: DEFAULT_MAX_POLL_MESSAGES,
        }
    }
}

impl Config {
    /// Parses a configuration from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| Error::InvalidInput(format!("Invalid config: {}", e)))
    }
}

/// Retry policy applied when a compare-and-swap loses a race.
///
/// Used both for offset assignment and for committed-offset updates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts allowed before the operation fails with
    /// [`Error::RetryExhausted`](crate::Error::RetryExhausted). Must be at
    /// least 1.
    pub max_attempts: u32,

    /// Fixed part of the delay between attempts, in milliseconds.
    pub base_delay_ms: u64,

    /// Upper bound of the random jitter added to each delay, in milliseconds.
    pub max_jitter_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            base_delay_ms: 5,
            max_jitter_ms: 5,
        }
    }
}
