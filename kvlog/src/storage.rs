//! Log-specific storage wrapper.
//!
//! [`LogStorage`] maps (topic, offset) pairs onto individual entries in the
//! sequential store and reads bounded offset ranges back, skipping offsets
//! whose entry was never written.

use std::ops::Range;
use std::sync::Arc;

use bytes::Bytes;
use common::SequentialStore;

use crate::error::Result;
use crate::model::{LogEntry, Offset};
use crate::serde::LogEntryKey;

#[derive(Clone)]
pub(crate) struct LogStorage {
    store: Arc<dyn SequentialStore>,
}

impl LogStorage {
    pub(crate) fn new(store: Arc<dyn SequentialStore>) -> Self {
        Self { store }
    }

    /// Writes the payload for `offset` in `topic`.
    pub(crate) async fn write_entry(&self, topic: &str, offset: Offset, value: Bytes) -> Result<()> {
        let key = LogEntryKey::new(topic, offset).serialize();
        self.store.write(&key, value).await?;
        Ok(())
    }

    /// Reads the entry at `offset`, or `None` if nothing was written there.
    pub(crate) async fn read_entry(&self, topic: &str, offset: Offset) -> Result<Option<LogEntry>> {
        let key = LogEntryKey::new(topic, offset).serialize();
        let value = self.store.read(&key).await?;
        Ok(value.map(|value| LogEntry {
            topic: topic.to_string(),
            offset,
            value,
        }))
    }

    /// Reads up to `limit` entries with offsets in `offsets`, oldest first.
    ///
    /// Absent offsets are gaps left by appends that assigned an offset but
    /// never wrote the entry; they are skipped rather than failing the read.
    pub(crate) async fn scan_entries(
        &self,
        topic: &str,
        offsets: Range<Offset>,
        limit: usize,
    ) -> Result<Vec<LogEntry>> {
        let mut entries = Vec::new();
        for offset in offsets {
            if entries.len() >= limit {
                break;
            }
            match self.read_entry(topic, offset).await? {
                Some(entry) => entries.push(entry),
                None => tracing::debug!(topic, offset, "skipping gap in log"),
            }
        }
        Ok(entries)
    }
}
