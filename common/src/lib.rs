//! Storage primitives shared by the kvlog crates.
//!
//! The log is built on two weak key-value capabilities rather than a full
//! database: a linearizable register with compare-and-swap and a
//! sequentially consistent per-key store. Both are expressed as traits here,
//! together with the in-memory and SlateDB backends and the configuration
//! used to pick between them.

pub mod storage;

pub use storage::config::StorageConfig;
pub use storage::factory::{Stores, create_storage};
pub use storage::{LinearizableStore, SequentialStore, StorageError, StorageResult};
