//! kvlog - A Kafka-style commit log built on two weak key-value stores.
//!
//! kvlog provides ordered per-topic offsets, append, bounded-range polls and
//! consumer commit watermarks without a database of its own. Everything is
//! expressed over a linearizable register with compare-and-swap and a
//! sequentially consistent per-key store.
//!
//! # Architecture
//!
//! Each topic owns two registers in the linearizable store: an offset counter
//! holding the next offset to hand out, and a committed offset. Both are
//! updated with optimistic compare-and-swap loops that retry with jittered
//! backoff when a concurrent writer wins. Entries are written one per key to
//! the sequential store after their offset is assigned; polls read up to the
//! counter and skip offsets whose entry never arrived.
//!
//! # Key Concepts
//!
//! - **Log**: The engine providing append, poll, commit and list operations.
//! - **Offsets**: Assigned per topic at append time, starting at 0, strictly
//!   increasing and never reused. Gaps are possible and harmless.
//! - **Committed offsets**: Per-topic watermarks that never move backwards.
//! - **Protocol**: Tagged JSON requests dispatched onto the log, see
//!   [`protocol`].
//!
//! # Example
//!
//! ```ignore
//! use std::collections::HashMap;
//! use bytes::Bytes;
//! use kvlog::{Config, Log};
//!
//! let log = Log::open(Config::default()).await?;
//!
//! let offset = log.append("orders", Bytes::from("42")).await?;
//! let polled = log.poll(HashMap::from([("orders".to_string(), 0)])).await?;
//! for entry in &polled["orders"] {
//!     println!("offset={}, value={:?}", entry.offset, entry.value);
//! }
//! log.commit_offsets(HashMap::from([("orders".to_string(), offset)])).await?;
//! ```

mod config;
mod counter;
mod error;
mod log;
mod model;
pub mod protocol;
mod retry;
mod serde;
#[cfg(feature = "http-server")]
pub mod server;
mod storage;

pub use config::{Config, DEFAULT_MAX_POLL_MESSAGES, RetryConfig};
pub use error::{Error, Result};
pub use log::Log;
pub use model::{LogEntry, Offset};
pub use protocol::{Request, Response};
