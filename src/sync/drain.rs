//! Queue drain planning and per-item reconciliation.
//!
//! A drain pass replays pending operations through the same dispatch table
//! as fresh mutations. Within one entity key the replay order is strictly
//! FIFO; distinct keys drain concurrently. Draining is event-triggered
//! (startup, reconnect, manual) — a failed item waits for the next trigger
//! rather than busy-retrying.

use std::sync::Arc;

use hashbrown::HashMap;
use tokio::sync::mpsc;
use tracing::{error, warn};

use crate::{
    op::Operation,
    queue::ops::MarkFailed,
    remote::{RemoteError, RemoteOutcome},
    types::EntityKey,
};

use super::{
    coordinator::{EngineState, Internal, dispatch},
    events::SyncEvent,
};

/// Pending operations grouped per entity key, FIFO within each group,
/// groups ordered by first submission.
pub(crate) fn group_by_entity(ops: Vec<Operation>) -> Vec<(EntityKey, Vec<Operation>)> {
    let mut order: Vec<EntityKey> = Vec::new();
    let mut groups: HashMap<EntityKey, Vec<Operation>> = HashMap::new();
    for op in ops {
        if !groups.contains_key(&op.entity_key) {
            order.push(op.entity_key.clone());
        }
        groups.entry(op.entity_key.clone()).or_default().push(op);
    }
    order
        .into_iter()
        .filter_map(|key| groups.remove(&key).map(|group| (key, group)))
        .collect()
}

impl EngineState {
    /// Kicks off a drain pass: one sequential task per entity key, keys
    /// running concurrently. Keys already draining are skipped; anything
    /// they leave queued is picked up by the next trigger.
    pub(crate) fn start_drain(&mut self, internal_tx: &mpsc::UnboundedSender<Internal>) {
        let pending = match self.queue.list_pending() {
            Ok(pending) => pending,
            Err(err) => {
                error!(error = ?err, "drain skipped: could not read pending operations");
                return;
            }
        };
        if pending.is_empty() {
            return;
        }

        for (entity_key, group) in group_by_entity(pending) {
            if !self.draining.insert(entity_key.clone()) {
                continue;
            }
            let remote = Arc::clone(&self.remote);
            let tx = internal_tx.clone();
            tokio::spawn(async move {
                for op in group {
                    let result = dispatch(remote.as_ref(), op.kind, &op.entity_key, &op.payload).await;
                    if tx.send(Internal::DrainItemDone { op, result }).is_err() {
                        return;
                    }
                }
                let _ = tx.send(Internal::DrainGroupDone { entity_key });
            });
        }
    }

    /// Reconciles one replayed operation against queue and cache.
    pub(crate) fn finish_drain_item(
        &mut self,
        op: Operation,
        result: Result<RemoteOutcome, RemoteError>,
    ) {
        match result {
            Ok(_) => {
                if let Err(err) = self.queue.remove(&op.id) {
                    error!(op_id = %op.id, error = ?err, "replayed operation could not be removed; left for next drain");
                    return;
                }
                self.cache.invalidate(&op.entity_key);
                let _ = self.events.send(SyncEvent::Drained {
                    entity_key: op.entity_key.clone(),
                    op_id: op.id.clone(),
                });
                let _ = self.events.send(SyncEvent::Invalidated {
                    entity_key: op.entity_key,
                });
            }
            Err(error) if error.is_retryable() => match self.queue.mark_failed(&op.id) {
                Ok(MarkFailed::Requeued(kept)) => {
                    warn!(op_id = %kept.id, retries = kept.retry_count, "replay failed; operation stays queued");
                }
                Ok(MarkFailed::Dropped(dropped)) => {
                    self.cache.invalidate(&dropped.entity_key);
                    let _ = self.events.send(SyncEvent::OpDropped {
                        entity_key: dropped.entity_key.clone(),
                        op_id: dropped.id,
                        retries: dropped.retry_count,
                    });
                    let _ = self.events.send(SyncEvent::Invalidated {
                        entity_key: dropped.entity_key,
                    });
                }
                Err(err) => {
                    error!(op_id = %op.id, error = ?err, "retry accounting failed; operation left for next drain");
                }
            },
            Err(error) => {
                // Terminal rejection: replaying the same payload cannot
                // succeed, so the item is dropped without burning retries.
                if let Err(err) = self.queue.remove(&op.id) {
                    error!(op_id = %op.id, error = ?err, "rejected operation could not be removed; left for next drain");
                    return;
                }
                if matches!(error, RemoteError::Conflict(_)) {
                    self.cache.invalidate(&op.entity_key);
                    let _ = self.events.send(SyncEvent::Invalidated {
                        entity_key: op.entity_key.clone(),
                    });
                }
                let _ = self.events.send(SyncEvent::OpDropped {
                    entity_key: op.entity_key,
                    op_id: op.id,
                    retries: op.retry_count,
                });
            }
        }
    }
}
