//! Core data types for the log.

use bytes::Bytes;

/// Position of an entry within a topic's log.
///
/// Offsets are assigned at append time, start at 0, and strictly increase per
/// topic. They are never reused, but a crashed append can leave a permanent
/// gap.
pub type Offset = u64;

/// An entry read from the log.
///
/// # Example
///
/// ```ignore
/// let polled = log.poll(HashMap::from([("orders".to_string(), 0)])).await?;
/// for entry in &polled["orders"] {
///     println!("offset={} value={:?}", entry.offset, entry.value);
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// The topic this entry belongs to.
    pub topic: String,

    /// The offset assigned to this entry when it was appended.
    pub offset: Offset,

    /// The message payload. The log does not interpret its contents.
    pub value: Bytes,
}
