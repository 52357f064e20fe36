//! Per-mutation orchestration: optimistic apply, remote dispatch, and
//! reconciliation of the completion against cache and queue.

use std::sync::Arc;

use hashbrown::HashSet;
use serde_json::Value;
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, warn};

use crate::{
    cache::store::{CacheStore, OptimisticRecord},
    doc::{Document, merge_fields},
    op::Operation,
    queue::{QueueError, ops::OperationQueue},
    remote::{RemoteError, RemoteOutcome, RemoteStore},
    types::{DocId, EntityKey, OpId, OpKind},
};

use super::events::SyncEvent;

/// Terminal result of a `perform` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PerformOutcome {
    /// The remote store confirmed the write; the cache entry was
    /// invalidated for a background refetch.
    Committed {
        /// Affected entity key.
        entity_key: EntityKey,
        /// Confirmed record identity (server-issued for creates).
        id: DocId,
    },
    /// Offline: the write was persisted for replay; the cache is untouched.
    Queued {
        /// The persisted operation.
        operation: Operation,
    },
}

/// Errors surfaced by the engine.
#[derive(Debug)]
pub enum SyncError {
    /// The remote store failed the call.
    Remote {
        /// Failure reported by the remote store.
        error: RemoteError,
        /// Replay operation id, present when the failure was retryable and
        /// the write is queued for a later drain.
        queued: Option<OpId>,
    },
    /// The durable queue could not persist or read an operation.
    Queue(QueueError),
    /// The engine loop is gone.
    ChannelClosed,
}

impl From<QueueError> for SyncError {
    fn from(value: QueueError) -> Self {
        Self::Queue(value)
    }
}

/// Engine state owned by the single-writer loop.
pub(crate) struct EngineState {
    pub(crate) cache: CacheStore,
    pub(crate) queue: OperationQueue,
    pub(crate) remote: Arc<dyn RemoteStore>,
    pub(crate) events: broadcast::Sender<SyncEvent>,
    pub(crate) online: bool,
    pub(crate) draining: HashSet<EntityKey>,
}

/// In-flight mutation context carried across the remote-call suspension.
pub(crate) struct PerformCtx {
    pub(crate) kind: OpKind,
    pub(crate) entity_key: EntityKey,
    pub(crate) payload: Value,
    pub(crate) target: Option<DocId>,
    pub(crate) record: OptimisticRecord,
    pub(crate) resp: oneshot::Sender<Result<PerformOutcome, SyncError>>,
}

/// What the loop should do next for a `perform` command.
pub(crate) enum PerformStep {
    /// The caller was already answered (offline path or local rejection).
    Done,
    /// Spawn the remote call and feed the completion back into the loop.
    Submit(PerformCtx),
}

/// Completions fed back into the engine loop by spawned tasks.
pub(crate) enum Internal {
    PerformDone {
        ctx: PerformCtx,
        result: Result<RemoteOutcome, RemoteError>,
    },
    DrainItemDone {
        op: Operation,
        result: Result<RemoteOutcome, RemoteError>,
    },
    DrainGroupDone {
        entity_key: EntityKey,
    },
}

impl EngineState {
    /// First half of a mutation: offline short-circuit, local validation,
    /// optimistic apply.
    pub(crate) fn begin_perform(
        &mut self,
        kind: OpKind,
        entity_key: EntityKey,
        payload: Value,
        resp: oneshot::Sender<Result<PerformOutcome, SyncError>>,
    ) -> PerformStep {
        if !self.online {
            // Offline writes are queued without a speculative preview; the
            // drain after reconnect makes them visible.
            let res = self
                .queue
                .enqueue(kind, entity_key.clone(), payload)
                .map(|operation| {
                    debug!(entity_key = %operation.entity_key, op_id = %operation.id, "offline; write queued");
                    let _ = self.events.send(SyncEvent::Queued {
                        entity_key: entity_key.clone(),
                        op_id: operation.id.clone(),
                    });
                    PerformOutcome::Queued { operation }
                })
                .map_err(SyncError::Queue);
            let _ = resp.send(res);
            return PerformStep::Done;
        }

        let target = if kind == OpKind::Create {
            None
        } else {
            match required_target(&payload) {
                Ok(id) => Some(id),
                Err(error) => {
                    let _ = resp.send(Err(SyncError::Remote {
                        error,
                        queued: None,
                    }));
                    return PerformStep::Done;
                }
            }
        };

        let record = match (kind, target.clone()) {
            (OpKind::Create, _) => {
                let body = payload.clone();
                self.cache.apply_optimistic(&entity_key, move |rows, temp_id| {
                    rows.push(Document::new(temp_id.clone(), body));
                })
            }
            (OpKind::Delete, Some(id)) => {
                self.cache.apply_optimistic(&entity_key, move |rows, _| {
                    rows.retain(|d| d.id != id);
                })
            }
            (_, Some(id)) => {
                let patch = payload.clone();
                self.cache.apply_optimistic(&entity_key, move |rows, _| {
                    if let Some(row) = rows.iter_mut().find(|d| d.id == id) {
                        merge_fields(&mut row.body, &patch);
                    }
                })
            }
            // Non-create kinds always carry a target by this point.
            (_, None) => {
                let _ = resp.send(Err(SyncError::Remote {
                    error: RemoteError::ValidationRejected("payload missing id".to_string()),
                    queued: None,
                }));
                return PerformStep::Done;
            }
        };

        let _ = self.events.send(SyncEvent::Applied {
            entity_key: entity_key.clone(),
            temp_id: record.temp_id.clone(),
        });

        PerformStep::Submit(PerformCtx {
            kind,
            entity_key,
            payload,
            target,
            record,
            resp,
        })
    }

    /// Second half of a mutation: reconcile the remote completion.
    pub(crate) fn finish_perform(
        &mut self,
        ctx: PerformCtx,
        result: Result<RemoteOutcome, RemoteError>,
    ) {
        let PerformCtx {
            kind,
            entity_key,
            payload,
            target,
            record,
            resp,
        } = ctx;

        match result {
            Ok(outcome) => {
                let id = match outcome {
                    RemoteOutcome::Created(server_id) => {
                        let temp = record.temp_id.clone();
                        let confirmed = server_id.clone();
                        self.cache.commit(&record, move |rows| {
                            if let Some(row) = rows.iter_mut().find(|d| d.id == temp) {
                                row.id = confirmed;
                            }
                        });
                        server_id
                    }
                    RemoteOutcome::Updated | RemoteOutcome::Deleted => {
                        self.cache.commit(&record, |_| {});
                        target.unwrap_or_else(|| record.temp_id.clone())
                    }
                };
                self.cache.invalidate(&entity_key);
                let _ = self.events.send(SyncEvent::Committed {
                    entity_key: entity_key.clone(),
                    id: id.clone(),
                });
                let _ = self.events.send(SyncEvent::Invalidated {
                    entity_key: entity_key.clone(),
                });
                let _ = resp.send(Ok(PerformOutcome::Committed { entity_key, id }));
            }
            Err(error) => {
                self.cache.rollback(&record);
                let _ = self.events.send(SyncEvent::RolledBack {
                    entity_key: entity_key.clone(),
                    temp_id: record.temp_id.clone(),
                });

                let queued = if error.is_retryable() {
                    match self.queue.enqueue(kind, entity_key.clone(), payload) {
                        Ok(op) => {
                            warn!(entity_key = %op.entity_key, op_id = %op.id, "remote call failed; queued for replay");
                            let _ = self.events.send(SyncEvent::Queued {
                                entity_key: entity_key.clone(),
                                op_id: op.id.clone(),
                            });
                            Some(op.id)
                        }
                        Err(err) => {
                            let _ = resp.send(Err(SyncError::Queue(err)));
                            return;
                        }
                    }
                } else {
                    if matches!(error, RemoteError::Conflict(_)) {
                        self.cache.invalidate(&entity_key);
                        let _ = self.events.send(SyncEvent::Invalidated {
                            entity_key: entity_key.clone(),
                        });
                    }
                    None
                };
                let _ = resp.send(Err(SyncError::Remote { error, queued }));
            }
        }
    }
}

/// Maps a data-described operation onto the matching remote call.
///
/// Used for both fresh mutations and queued replays, so a queue reloaded
/// from durable storage drains through exactly the code path that would
/// have run originally.
pub(crate) async fn dispatch(
    remote: &dyn RemoteStore,
    kind: OpKind,
    entity_key: &str,
    payload: &Value,
) -> Result<RemoteOutcome, RemoteError> {
    match kind {
        OpKind::Create => remote
            .create(entity_key, payload)
            .await
            .map(RemoteOutcome::Created),
        OpKind::Update | OpKind::StatusChange => {
            let id = required_target(payload)?;
            remote
                .update(entity_key, &id, payload)
                .await
                .map(|()| RemoteOutcome::Updated)
        }
        OpKind::Delete => {
            let id = required_target(payload)?;
            remote
                .delete(entity_key, &id)
                .await
                .map(|()| RemoteOutcome::Deleted)
        }
    }
}

fn required_target(payload: &Value) -> Result<DocId, RemoteError> {
    payload
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| RemoteError::ValidationRejected("payload missing id".to_string()))
}
