//! Remote document-store seam and failure taxonomy.

use async_trait::async_trait;
use serde_json::Value;

use crate::types::DocId;

/// Failure classes a remote call may resolve with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// Transport-level failure; the write is retryable and gets queued.
    Network(String),
    /// Server rejected the payload; retrying the same payload is pointless.
    ValidationRejected(String),
    /// The target record no longer exists on the server.
    Conflict(String),
}

impl RemoteError {
    /// True for failures the engine queues for replay.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}

/// Successful result of a dispatched remote call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteOutcome {
    /// Create resolved with the server-issued identifier.
    Created(DocId),
    /// Update (or status change) resolved.
    Updated,
    /// Delete resolved.
    Deleted,
}

/// The remote document store, reached over the network.
///
/// Opaque to the engine. At-least-once delivery with idempotent server-side
/// upsert is assumed; the engine never needs exactly-once.
#[async_trait]
pub trait RemoteStore: Send + Sync + 'static {
    /// Creates a record, returning the server-issued identifier.
    async fn create(&self, entity_key: &str, payload: &Value) -> Result<DocId, RemoteError>;

    /// Updates fields of an existing record.
    async fn update(&self, entity_key: &str, id: &str, payload: &Value)
    -> Result<(), RemoteError>;

    /// Deletes an existing record.
    async fn delete(&self, entity_key: &str, id: &str) -> Result<(), RemoteError>;
}
