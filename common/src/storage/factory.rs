//! Storage factory for creating store backends from configuration.

use std::sync::Arc;

use slatedb::DbBuilder;

use super::config::{SlateDbStorageConfig, StorageConfig};
use super::in_memory::InMemoryStorage;
use super::slate::SlateDbStorage;
use super::{LinearizableStore, SequentialStore, StorageError, StorageResult};

/// Both store capabilities, served by one backend instance.
#[derive(Clone)]
pub struct Stores {
    pub linearizable: Arc<dyn LinearizableStore>,
    pub sequential: Arc<dyn SequentialStore>,
}

impl Stores {
    /// Builds a `Stores` where one backend provides both capabilities.
    pub fn shared<S>(storage: Arc<S>) -> Self
    where
        S: LinearizableStore + SequentialStore + 'static,
    {
        Self {
            linearizable: storage.clone(),
            sequential: storage,
        }
    }
}

/// Creates the store backends described by `config`.
///
/// # Examples
///
/// ```rust,ignore
/// use common::{StorageConfig, create_storage};
///
/// let stores = create_storage(&StorageConfig::InMemory).await?;
/// let counter = stores.linearizable.read("offsets/orders").await?;
/// ```
pub async fn create_storage(config: &StorageConfig) -> StorageResult<Stores> {
    match config {
        StorageConfig::InMemory => Ok(Stores::shared(Arc::new(InMemoryStorage::new()))),
        StorageConfig::SlateDb(slate_config) => {
            let storage = create_slatedb_storage(slate_config).await?;
            Ok(Stores::shared(Arc::new(storage)))
        }
    }
}

async fn create_slatedb_storage(config: &SlateDbStorageConfig) -> StorageResult<SlateDbStorage> {
    let object_store = config.object_store.build()?;
    let settings = config.load_settings()?;

    let db = DbBuilder::new(config.path.clone(), object_store)
        .with_settings(settings)
        .build()
        .await
        .map_err(|e| StorageError::Storage(format!("Failed to create SlateDB: {}", e)))?;

    tracing::info!(path = %config.path, "opened SlateDB storage");
    Ok(SlateDbStorage::new(Arc::new(db)))
}
