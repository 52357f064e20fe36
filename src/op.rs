//! Queued write-intent model and durable envelope.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{EntityKey, OpId, OpKind};

/// Version number for serialized [`QueueEnvelope`] payloads.
pub const QUEUE_FORMAT_VERSION: u16 = 1;

/// Retry ceiling applied to queued operations by default.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// A pending write intent.
///
/// Fully data-described (kind plus payload, never a live closure) so that a
/// queue reloaded from durable storage can be replayed through the same
/// dispatch path that issued the original call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    /// Client-generated unique id.
    pub id: OpId,
    /// Target collection/record family.
    pub entity_key: EntityKey,
    /// What to do on replay.
    pub kind: OpKind,
    /// Opaque payload forwarded to the remote store.
    pub payload: Value,
    /// Milliseconds since epoch at first enqueue; not touched by retries.
    pub submitted_at: u64,
    /// Failed replay attempts so far.
    pub retry_count: u32,
    /// Ceiling past which the operation is dropped.
    pub max_retries: u32,
}

/// Versioned wrapper for stable on-disk queue decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEnvelope {
    /// Payload format version.
    pub format_version: u16,
    /// Pending operations in FIFO submission order.
    pub ops: Vec<Operation>,
}

impl QueueEnvelope {
    /// Constructs an envelope using [`QUEUE_FORMAT_VERSION`].
    pub fn new(ops: Vec<Operation>) -> Self {
        Self {
            format_version: QUEUE_FORMAT_VERSION,
            ops,
        }
    }
}
