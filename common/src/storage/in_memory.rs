//! In-memory store backend.
//!
//! Useful for tests and single-process deployments. Registers and sequential
//! entries live in separate maps so the two capabilities never observe each
//! other's writes.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;

use super::{LinearizableStore, SequentialStore, StorageError, StorageResult};

/// In-memory implementation of both store capabilities.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    registers: Mutex<HashMap<String, Bytes>>,
    entries: Mutex<HashMap<String, Bytes>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> StorageError {
    StorageError::Internal("in-memory store lock poisoned".to_string())
}

#[async_trait]
impl LinearizableStore for InMemoryStorage {
    async fn read(&self, key: &str) -> StorageResult<Option<Bytes>> {
        let registers = self.registers.lock().map_err(poisoned)?;
        Ok(registers.get(key).cloned())
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Bytes,
        new: Bytes,
        create_if_absent: bool,
    ) -> StorageResult<()> {
        let mut registers = self.registers.lock().map_err(poisoned)?;
        match registers.get(key) {
            Some(current) if *current == expected => {
                registers.insert(key.to_string(), new);
                Ok(())
            }
            Some(_) => Err(StorageError::PreconditionFailed {
                key: key.to_string(),
            }),
            None if create_if_absent => {
                registers.insert(key.to_string(), new);
                Ok(())
            }
            None => Err(StorageError::NotFound {
                key: key.to_string(),
            }),
        }
    }
}

#[async_trait]
impl SequentialStore for InMemoryStorage {
    async fn read(&self, key: &str) -> StorageResult<Option<Bytes>> {
        let entries = self.entries.lock().map_err(poisoned)?;
        Ok(entries.get(key).cloned())
    }

    async fn write(&self, key: &str, value: Bytes) -> StorageResult<()> {
        let mut entries = self.entries.lock().map_err(poisoned)?;
        entries.insert(key.to_string(), value);
        Ok(())
    }
}
