//! Key-value store capabilities consumed by the log.
//!
//! [`LinearizableStore`] is a register keyspace with strict consistency and
//! compare-and-swap. [`SequentialStore`] offers per-key read and write with no
//! ordering guarantee across keys. Keys are plain strings; values are opaque
//! bytes.

pub mod config;
pub mod factory;
pub mod in_memory;
pub mod slate;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Errors returned by store backends.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// A compare-and-swap found a value other than the expected one.
    ///
    /// Another writer won the race. Callers re-read and retry.
    #[error("precondition failed for key {key}")]
    PreconditionFailed { key: String },

    /// A compare-and-swap targeted an absent key without `create_if_absent`.
    #[error("key not found: {key}")]
    NotFound { key: String },

    /// Backend failure such as I/O or object store errors.
    #[error("storage error: {0}")]
    Storage(String),

    /// Invariant violation inside a backend.
    #[error("internal error: {0}")]
    Internal(String),
}

impl StorageError {
    /// Wraps an arbitrary backend error as [`StorageError::Storage`].
    pub fn from_storage(e: impl std::fmt::Display) -> Self {
        StorageError::Storage(e.to_string())
    }
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// A linearizable register keyspace.
///
/// Every operation takes effect atomically at a single point between its
/// invocation and completion, which is what makes CAS-retry loops built on
/// top of it correct.
#[async_trait]
pub trait LinearizableStore: Send + Sync {
    /// Reads the current value of `key`, or `None` if it was never written.
    async fn read(&self, key: &str) -> StorageResult<Option<Bytes>>;

    /// Replaces the value of `key` with `new` if it currently equals `expected`.
    ///
    /// When the key is absent and `create_if_absent` is set, `new` is stored
    /// regardless of `expected`. When the key is absent and the flag is not
    /// set, the call fails with [`StorageError::NotFound`]. A present value
    /// that differs from `expected` fails with
    /// [`StorageError::PreconditionFailed`].
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Bytes,
        new: Bytes,
        create_if_absent: bool,
    ) -> StorageResult<()>;
}

/// A sequentially consistent per-key store.
#[async_trait]
pub trait SequentialStore: Send + Sync {
    /// Reads the value of `key`, or `None` if it was never written.
    async fn read(&self, key: &str) -> StorageResult<Option<Bytes>>;

    /// Unconditionally writes `value` under `key`.
    async fn write(&self, key: &str, value: Bytes) -> StorageResult<()>;
}
