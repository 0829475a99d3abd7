use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use slatedb::{Db, WriteBatch};
use tokio::sync::Mutex;

use super::{LinearizableStore, SequentialStore, StorageError, StorageResult};

const REGISTER_PREFIX: &str = "lin/";
const ENTRY_PREFIX: &str = "seq/";

/// SlateDB-backed implementation of both store capabilities.
///
/// SlateDB is an embedded key-value store built on object storage, providing
/// LSM-tree semantics with cloud-native durability. It has no native
/// compare-and-swap, so register updates are serialized through an in-process
/// lock; the result is linearizable as long as this process is the only
/// writer of the database.
pub struct SlateDbStorage {
    pub(super) db: Arc<Db>,
    cas_lock: Mutex<()>,
}

impl SlateDbStorage {
    /// Creates a new SlateDbStorage instance wrapping the given SlateDB database.
    pub fn new(db: Arc<Db>) -> Self {
        Self {
            db,
            cas_lock: Mutex::new(()),
        }
    }

    async fn get(&self, key: String) -> StorageResult<Option<Bytes>> {
        self.db
            .get(key.as_bytes())
            .await
            .map_err(StorageError::from_storage)
    }

    async fn put(&self, key: String, value: Bytes) -> StorageResult<()> {
        let mut batch = WriteBatch::new();
        batch.put(key.as_bytes(), value.as_ref());
        self.db
            .write(batch)
            .await
            .map_err(StorageError::from_storage)?;
        Ok(())
    }
}

#[async_trait]
impl LinearizableStore for SlateDbStorage {
    #[tracing::instrument(level = "trace", skip_all)]
    async fn read(&self, key: &str) -> StorageResult<Option<Bytes>> {
        self.get(format!("{REGISTER_PREFIX}{key}")).await
    }

    #[tracing::instrument(level = "trace", skip_all)]
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Bytes,
        new: Bytes,
        create_if_absent: bool,
    ) -> StorageResult<()> {
        let storage_key = format!("{REGISTER_PREFIX}{key}");
        let _guard = self.cas_lock.lock().await;
        match self.get(storage_key.clone()).await? {
            Some(current) if current == expected => self.put(storage_key, new).await,
            Some(_) => Err(StorageError::PreconditionFailed {
                key: key.to_string(),
            }),
            None if create_if_absent => self.put(storage_key, new).await,
            None => Err(StorageError::NotFound {
                key: key.to_string(),
            }),
        }
    }
}

#[async_trait]
impl SequentialStore for SlateDbStorage {
    #[tracing::instrument(level = "trace", skip_all)]
    async fn read(&self, key: &str) -> StorageResult<Option<Bytes>> {
        self.get(format!("{ENTRY_PREFIX}{key}")).await
    }

    #[tracing::instrument(level = "trace", skip_all)]
    async fn write(&self, key: &str, value: Bytes) -> StorageResult<()> {
        self.put(format!("{ENTRY_PREFIX}{key}"), value).await
    }
}
