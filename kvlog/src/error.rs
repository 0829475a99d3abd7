//! Error types for log operations.
//!
//! This module defines [`Error`], the error type for every operation on the
//! log, along with a convenient [`Result`] type alias.
//!
//! Compare-and-swap conflicts never appear here directly: they are absorbed by
//! the retry loops in the counter service and only surface as
//! [`Error::RetryExhausted`] once the attempt budget is spent. Absent keys are
//! not errors either; they read as zero or as a gap in the log.

use common::StorageError;
use thiserror::Error;

/// Error type for log operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Failure reported by one of the underlying stores.
    #[error("Storage error: {0}")]
    Storage(String),

    /// A stored counter or payload could not be decoded.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// The caller supplied an invalid argument or malformed request.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A compare-and-swap loop lost every race it was allowed to run.
    ///
    /// The single request fails; the log remains usable.
    #[error("Retries exhausted after {attempts} attempts on key {key}")]
    RetryExhausted { key: String, attempts: u32 },

    /// Invariant violations that indicate a bug.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Internal(msg) => Error::Internal(msg),
            other => Error::Storage(other.to_string()),
        }
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::InvalidInput(msg.to_string())
    }
}

/// Result type alias for log operations.
pub type Result<T> = std::result::Result<T, Error>;
