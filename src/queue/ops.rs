//! Write-through FIFO queue of pending operations.

use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;
use uuid::Uuid;

use crate::{
    op::{DEFAULT_MAX_RETRIES, Operation, QUEUE_FORMAT_VERSION, QueueEnvelope},
    types::{EntityKey, OpKind},
};

use super::{DurableStore, QueueError, QueueResult};

/// Durable-store key under which the pending list is persisted.
const QUEUE_KEY: &str = "sync/pending-ops";

/// Result of recording a failed replay attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkFailed {
    /// Still under the ceiling; left queued for the next drain trigger.
    Requeued(Operation),
    /// Ceiling exceeded; removed from the durable store.
    Dropped(Operation),
}

/// Ordered, persisted list of pending write operations.
///
/// Exclusively owns the durable queue content. Every mutation is written
/// through before returning and every read re-reads the durable store, so
/// the queue is fully reconstructible after a process restart; there is no
/// in-memory staging to lose.
pub struct OperationQueue {
    store: Box<dyn DurableStore>,
    max_retries: u32,
}

impl OperationQueue {
    /// Creates a queue over `store` with the default retry ceiling.
    pub fn new(store: Box<dyn DurableStore>) -> Self {
        Self::with_max_retries(store, DEFAULT_MAX_RETRIES)
    }

    /// Creates a queue with an explicit retry ceiling.
    pub fn with_max_retries(store: Box<dyn DurableStore>, max_retries: u32) -> Self {
        Self { store, max_retries }
    }

    /// Persists and returns a new pending operation.
    ///
    /// A persistence failure propagates; the caller must never believe a
    /// write is tracked when it is not.
    pub fn enqueue(
        &mut self,
        kind: OpKind,
        entity_key: impl Into<EntityKey>,
        payload: Value,
    ) -> QueueResult<Operation> {
        let op = Operation {
            id: Uuid::new_v4().to_string(),
            entity_key: entity_key.into(),
            kind,
            payload,
            submitted_at: now_ms(),
            retry_count: 0,
            max_retries: self.max_retries,
        };
        let mut ops = self.load()?;
        ops.push(op.clone());
        self.save(&ops)?;
        Ok(op)
    }

    /// Snapshot of pending operations in FIFO submission order.
    pub fn list_pending(&self) -> QueueResult<Vec<Operation>> {
        self.load()
    }

    /// Records a failed replay attempt for `op_id`.
    pub fn mark_failed(&mut self, op_id: &str) -> QueueResult<MarkFailed> {
        let mut ops = self.load()?;
        let Some(pos) = ops.iter().position(|o| o.id == op_id) else {
            return Err(QueueError::Message(format!("unknown operation: {op_id}")));
        };
        ops[pos].retry_count += 1;
        if ops[pos].retry_count > ops[pos].max_retries {
            let dropped = ops.remove(pos);
            self.save(&ops)?;
            Ok(MarkFailed::Dropped(dropped))
        } else {
            let kept = ops[pos].clone();
            self.save(&ops)?;
            Ok(MarkFailed::Requeued(kept))
        }
    }

    /// Deletes `op_id` after a successful replay. Unknown ids are a no-op.
    pub fn remove(&mut self, op_id: &str) -> QueueResult<()> {
        let mut ops = self.load()?;
        let before = ops.len();
        ops.retain(|o| o.id != op_id);
        if ops.len() != before {
            self.save(&ops)?;
        }
        Ok(())
    }

    /// Number of pending operations, optionally for a single entity key.
    pub fn len(&self, entity_key: Option<&str>) -> QueueResult<usize> {
        let ops = self.load()?;
        Ok(match entity_key {
            Some(key) => ops.iter().filter(|o| o.entity_key == key).count(),
            None => ops.len(),
        })
    }

    fn load(&self) -> QueueResult<Vec<Operation>> {
        let Some(bytes) = self.store.get(QUEUE_KEY)? else {
            return Ok(Vec::new());
        };
        let env: QueueEnvelope = serde_json::from_slice(&bytes)?;
        if env.format_version != QUEUE_FORMAT_VERSION {
            return Err(QueueError::Message(format!(
                "unsupported queue format version: {}",
                env.format_version
            )));
        }
        Ok(env.ops)
    }

    fn save(&mut self, ops: &[Operation]) -> QueueResult<()> {
        if ops.is_empty() {
            return self.store.delete(QUEUE_KEY);
        }
        let payload = serde_json::to_vec(&QueueEnvelope::new(ops.to_vec()))?;
        self.store.set(QUEUE_KEY, &payload)
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
