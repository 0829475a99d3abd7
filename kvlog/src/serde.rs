//! Serde for log storage
//!
//! This module derives the store keys used by the log and encodes the values
//! stored under them.
//!
//! # Key Format
//!
//! Three record kinds live in disjoint namespaces, so no topic name can make
//! two of them collide:
//!
//! ```text
//! offsets/<topic>            next-available offset counter (linearizable store)
//! committed/<topic>          committed offset watermark    (linearizable store)
//! logs/<topic>/<offset>      log entry payload             (sequential store)
//! ```
//!
//! Offsets in entry keys are written in decimal.
//!
//! # Counter Values
//!
//! Counters and committed offsets are stored as decimal ASCII (`b"17"`). An
//! absent register decodes as 0.

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::model::Offset;

const OFFSETS_PREFIX: &str = "offsets/";
const COMMITTED_PREFIX: &str = "committed/";
const LOGS_PREFIX: &str = "logs/";

/// Register key holding the next-available offset for a topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffsetCounterKey<'a> {
    pub topic: &'a str,
}

impl<'a> OffsetCounterKey<'a> {
    pub fn new(topic: &'a str) -> Self {
        Self { topic }
    }

    pub fn serialize(&self) -> String {
        format!("{OFFSETS_PREFIX}{}", self.topic)
    }
}

/// Register key holding the committed offset for a topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedOffsetKey<'a> {
    pub topic: &'a str,
}

impl<'a> CommittedOffsetKey<'a> {
    pub fn new(topic: &'a str) -> Self {
        Self { topic }
    }

    pub fn serialize(&self) -> String {
        format!("{COMMITTED_PREFIX}{}", self.topic)
    }
}

/// Key for a single log entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntryKey<'a> {
    pub topic: &'a str,
    pub offset: Offset,
}

impl<'a> LogEntryKey<'a> {
    pub fn new(topic: &'a str, offset: Offset) -> Self {
        Self { topic, offset }
    }

    pub fn serialize(&self) -> String {
        format!("{LOGS_PREFIX}{}/{}", self.topic, self.offset)
    }
}

/// Encodes a counter value for the linearizable store.
pub fn serialize_counter(value: u64) -> Bytes {
    Bytes::from(value.to_string())
}

/// Decodes a counter value read from the linearizable store.
///
/// `None` (the key was never written) decodes as 0.
pub fn deserialize_counter(key: &str, value: Option<&Bytes>) -> Result<u64> {
    let Some(bytes) = value else {
        return Ok(0);
    };
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or_else(|| {
            Error::Encoding(format!(
                "counter at {} is not a decimal integer: {:?}",
                key, bytes
            ))
        })
}
