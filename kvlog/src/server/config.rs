//! Command-line configuration for the kvlog server.

use std::path::PathBuf;

use clap::{Args, Parser};
use common::StorageConfig;

use crate::{Config, Error, Result};

#[derive(Debug, Parser)]
#[command(name = "kvlog", about = "Kafka-style log over key-value stores")]
pub struct CliArgs {
    /// HTTP server port.
    #[arg(long, default_value_t = 8080)]
    pub port: u16,

    #[command(flatten)]
    pub storage: StorageArgs,

    /// YAML file with the full log configuration (storage, retry policy, poll
    /// limit). Storage flags are ignored when it is given.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// Storage selection flags. Local SlateDB under `--data-dir` unless
/// `--in-memory` or `--s3-bucket` is given.
#[derive(Debug, Clone, Args)]
pub struct StorageArgs {
    /// Keep everything in process memory.
    #[arg(long, conflicts_with = "s3_bucket")]
    pub in_memory: bool,

    /// Directory for local SlateDB files.
    #[arg(long, default_value = ".data")]
    pub data_dir: String,

    /// Store SlateDB files in this S3 bucket.
    #[arg(long)]
    pub s3_bucket: Option<String>,

    /// Region of the S3 bucket.
    #[arg(long, default_value = "us-east-1")]
    pub s3_region: String,
}

impl From<&StorageArgs> for StorageConfig {
    fn from(args: &StorageArgs) -> Self {
        match (&args.s3_bucket, args.in_memory) {
            (_, true) => StorageConfig::InMemory,
            (Some(bucket), false) => StorageConfig::s3(bucket, &args.s3_region),
            (None, false) => StorageConfig::local(&args.data_dir),
        }
    }
}

impl CliArgs {
    /// Resolves the log configuration: the `--config` file when given,
    /// otherwise defaults with storage taken from the flags.
    pub fn to_log_config(&self) -> Result<Config> {
        let Some(path) = &self.config else {
            return Ok(Config {
                storage: StorageConfig::from(&self.storage),
                ..Default::default()
            });
        };
        let yaml = std::fs::read_to_string(path).map_err(|e| {
            Error::InvalidInput(format!("failed to read config file {}: {}", path.display(), e))
        })?;
        Config::from_yaml(&yaml)
    }
}

#[derive(Debug, Clone)]
pub struct LogServerConfig {
    pub port: u16,
}

impl Default for LogServerConfig {
    fn default() -> Self {
        Self { port: 8080 }
    }
}

impl From<&CliArgs> for LogServerConfig {
    fn from(args: &CliArgs) -> Self {
        Self { port: args.port }
    }
}
