//! Storage backend configuration.
//!
//! Selects where the log's registers and entries live. Both capabilities are
//! always served by the same backend instance. Configs are usually read from
//! YAML, tagged by `type`:
//!
//! ```yaml
//! type: SlateDb
//! path: kvlog
//! object_store:
//!   type: Aws
//!   region: eu-west-1
//!   bucket: commit-log
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use slatedb::config::Settings;
use slatedb::object_store::{self, ObjectStore};

use super::{StorageError, StorageResult};

/// Prefix for SlateDB data inside the object store unless configured.
pub const DEFAULT_DB_PATH: &str = "kvlog";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum StorageConfig {
    /// Process-local maps. Nothing survives a restart.
    InMemory,
    SlateDb(SlateDbStorageConfig),
}

impl Default for StorageConfig {
    /// SlateDB over a local `.data` directory.
    fn default() -> Self {
        Self::local(".data")
    }
}

impl StorageConfig {
    /// SlateDB over a directory on the local filesystem.
    pub fn local(dir: impl Into<String>) -> Self {
        Self::slatedb(ObjectStoreConfig::Local(LocalObjectStoreConfig {
            path: dir.into(),
        }))
    }

    /// SlateDB over an S3 bucket.
    pub fn s3(bucket: impl Into<String>, region: impl Into<String>) -> Self {
        Self::slatedb(ObjectStoreConfig::Aws(AwsObjectStoreConfig {
            region: region.into(),
            bucket: bucket.into(),
        }))
    }

    fn slatedb(object_store: ObjectStoreConfig) -> Self {
        StorageConfig::SlateDb(SlateDbStorageConfig {
            object_store,
            ..Default::default()
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SlateDbStorageConfig {
    /// Path prefix for SlateDB data in the object store.
    pub path: String,

    pub object_store: ObjectStoreConfig,

    /// SlateDB settings file. `Settings::load()` is used when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings_path: Option<String>,
}

impl Default for SlateDbStorageConfig {
    fn default() -> Self {
        Self {
            path: DEFAULT_DB_PATH.to_string(),
            object_store: ObjectStoreConfig::default(),
            settings_path: None,
        }
    }
}

impl SlateDbStorageConfig {
    /// Loads SlateDB settings from `settings_path`, or from SlateDB's own
    /// lookup (working directory files, `SLATEDB_` env vars) when unset.
    pub fn load_settings(&self) -> StorageResult<Settings> {
        match &self.settings_path {
            Some(path) => Settings::from_file(path).map_err(|e| {
                StorageError::Storage(format!("Failed to load SlateDB settings from {}: {}", path, e))
            }),
            None => Ok(Settings::load().unwrap_or_default()),
        }
    }
}

/// Where SlateDB keeps its files.
#[derive(Default, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ObjectStoreConfig {
    #[default]
    InMemory,
    Aws(AwsObjectStoreConfig),
    Local(LocalObjectStoreConfig),
}

impl ObjectStoreConfig {
    /// Builds the object store. A local directory is created if missing.
    pub fn build(&self) -> StorageResult<Arc<dyn ObjectStore>> {
        match self {
            ObjectStoreConfig::InMemory => Ok(Arc::new(object_store::memory::InMemory::new())),
            ObjectStoreConfig::Aws(aws) => {
                let store = object_store::aws::AmazonS3Builder::new()
                    .with_region(&aws.region)
                    .with_bucket_name(&aws.bucket)
                    .build()
                    .map_err(|e| {
                        StorageError::Storage(format!("Failed to create AWS S3 store: {}", e))
                    })?;
                Ok(Arc::new(store))
            }
            ObjectStoreConfig::Local(local) => {
                std::fs::create_dir_all(&local.path).map_err(|e| {
                    StorageError::Storage(format!(
                        "Failed to create storage directory '{}': {}",
                        local.path, e
                    ))
                })?;
                let store = object_store::local::LocalFileSystem::new_with_prefix(&local.path)
                    .map_err(StorageError::from_storage)?;
                Ok(Arc::new(store))
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AwsObjectStoreConfig {
    pub region: String,
    pub bucket: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LocalObjectStoreConfig {
    pub path: String,
}
