//! Request and reply messages, and their dispatch onto the log.
//!
//! Requests and replies are JSON objects tagged by a `type` field:
//!
//! ```text
//! {"type": "send", "key": "t", "msg": 42}            -> {"type": "send_ok", "offset": 0}
//! {"type": "poll", "offsets": {"t": 0}}              -> {"type": "poll_ok", "msgs": {"t": [[0, 42]]}}
//! {"type": "commit_offsets", "offsets": {"t": 0}}    -> {"type": "commit_offsets_ok"}
//! {"type": "list_committed_offsets", "keys": ["t"]}  -> {"type": "list_committed_offsets_ok", "offsets": {"t": 0}}
//! ```
//!
//! Message payloads are arbitrary JSON values. The log stores their JSON
//! encoding as opaque bytes and decodes it again on poll.

use std::collections::HashMap;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::log::Log;
use crate::model::{LogEntry, Offset};

/// An inbound request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Append `msg` to topic `key`.
    Send { key: String, msg: Value },
    /// Read entries from each topic starting at the given offset.
    Poll { offsets: HashMap<String, Offset> },
    /// Advance committed offsets.
    CommitOffsets { offsets: HashMap<String, Offset> },
    /// Read committed offsets for the listed topics.
    ListCommittedOffsets { keys: Vec<String> },
}

impl Request {
    pub fn kind(&self) -> RequestKind {
        match self {
            Request::Send { .. } => RequestKind::Send,
            Request::Poll { .. } => RequestKind::Poll,
            Request::CommitOffsets { .. } => RequestKind::CommitOffsets,
            Request::ListCommittedOffsets { .. } => RequestKind::ListCommittedOffsets,
        }
    }
}

/// Discriminant of [`Request`], used for logging and metric labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Send,
    Poll,
    CommitOffsets,
    ListCommittedOffsets,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::Send => "send",
            RequestKind::Poll => "poll",
            RequestKind::CommitOffsets => "commit_offsets",
            RequestKind::ListCommittedOffsets => "list_committed_offsets",
        }
    }
}

/// An outbound reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    SendOk {
        offset: Offset,
    },
    PollOk {
        msgs: HashMap<String, Vec<(Offset, Value)>>,
    },
    CommitOffsetsOk,
    ListCommittedOffsetsOk {
        offsets: HashMap<String, Offset>,
    },
    Error {
        code: u32,
        text: String,
    },
}

/// Error codes carried by [`Response::Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// The operation may succeed if retried, e.g. after losing CAS races.
    TemporarilyUnavailable = 11,
    /// The request was malformed or carried invalid arguments.
    MalformedRequest = 12,
    /// The operation failed and its effects are indeterminate.
    Crash = 13,
}

impl ErrorCode {
    pub fn for_error(error: &Error) -> Self {
        match error {
            Error::RetryExhausted { .. } => ErrorCode::TemporarilyUnavailable,
            Error::InvalidInput(_) => ErrorCode::MalformedRequest,
            Error::Storage(_) | Error::Encoding(_) | Error::Internal(_) => ErrorCode::Crash,
        }
    }
}

impl From<&Error> for Response {
    fn from(error: &Error) -> Self {
        Response::Error {
            code: ErrorCode::for_error(error) as u32,
            text: error.to_string(),
        }
    }
}

/// Runs `request` against `log` and builds the reply.
///
/// Each request kind maps to exactly one log operation. A failure anywhere in
/// the operation fails the whole request; no partial reply is produced.
pub async fn dispatch(log: &Log, request: Request) -> Result<Response> {
    match request {
        Request::Send { key, msg } => {
            let offset = log.append(&key, encode_payload(&msg)?).await?;
            Ok(Response::SendOk { offset })
        }
        Request::Poll { offsets } => {
            let polled = log.poll(offsets).await?;
            let mut msgs = HashMap::with_capacity(polled.len());
            for (topic, entries) in polled {
                msgs.insert(topic, decode_entries(&entries)?);
            }
            Ok(Response::PollOk { msgs })
        }
        Request::CommitOffsets { offsets } => {
            log.commit_offsets(offsets).await?;
            Ok(Response::CommitOffsetsOk)
        }
        Request::ListCommittedOffsets { keys } => {
            let offsets = log.list_committed_offsets(keys).await?;
            Ok(Response::ListCommittedOffsetsOk { offsets })
        }
    }
}

fn encode_payload(msg: &Value) -> Result<Bytes> {
    serde_json::to_vec(msg)
        .map(Bytes::from)
        .map_err(|e| Error::Encoding(format!("failed to encode message: {}", e)))
}

fn decode_entries(entries: &[LogEntry]) -> Result<Vec<(Offset, Value)>> {
    entries
        .iter()
        .map(|entry| {
            let value = serde_json::from_slice(&entry.value).map_err(|e| {
                Error::Encoding(format!(
                    "entry {}@{} is not valid JSON: {}",
                    entry.topic, entry.offset, e
                ))
            })?;
            Ok((entry.offset, value))
        })
        .collect()
}
