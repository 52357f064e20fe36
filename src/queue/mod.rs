//! Durable-store abstraction and the write-through operation queue.

/// Write-through pending-operation queue.
pub mod ops;
/// SQLite-backed durable key-value store.
pub mod sqlite;

use hashbrown::HashMap;

/// Errors from the durable store or the queue codec.
#[derive(Debug)]
pub enum QueueError {
    /// Underlying SQLite failure.
    Sqlite(rusqlite::Error),
    /// Envelope encode/decode failure.
    Serde(serde_json::Error),
    /// Any other failure.
    Message(String),
}

impl From<rusqlite::Error> for QueueError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<serde_json::Error> for QueueError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serde(value)
    }
}

/// Result alias for queue and durable-store operations.
pub type QueueResult<T> = Result<T, QueueError>;

/// Opaque durable byte key-value store.
///
/// Assumed synchronous-enough not to need its own write queue. Every write
/// must be durable before returning; the operation queue's restart
/// guarantee rests on that.
pub trait DurableStore: Send {
    /// Reads a key.
    fn get(&self, key: &str) -> QueueResult<Option<Vec<u8>>>;
    /// Writes a key through to durable storage.
    fn set(&mut self, key: &str, value: &[u8]) -> QueueResult<()>;
    /// Deletes a key. Missing keys are a no-op.
    fn delete(&mut self, key: &str) -> QueueResult<()>;
}

/// In-memory [`DurableStore`] for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    map: HashMap<String, Vec<u8>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl DurableStore for MemoryStore {
    fn get(&self, key: &str) -> QueueResult<Option<Vec<u8>>> {
        Ok(self.map.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &[u8]) -> QueueResult<()> {
        self.map.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&mut self, key: &str) -> QueueResult<()> {
        self.map.remove(key);
        Ok(())
    }
}
