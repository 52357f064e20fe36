//! Single-writer engine loop and its cloneable handle.

use std::sync::Arc;

use hashbrown::HashSet;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot};

use crate::{
    cache::store::CacheStore,
    doc::Document,
    net::ConnectivityMonitor,
    queue::ops::OperationQueue,
    remote::RemoteStore,
    types::{EntityKey, OpKind},
};

use super::{
    coordinator::{EngineState, Internal, PerformOutcome, PerformStep, SyncError, dispatch},
    events::SyncEvent,
};

/// Engine tuning knobs.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Command channel bound.
    pub cmd_queue_bound: usize,
    /// Broadcast event buffer capacity.
    pub event_capacity: usize,
    /// Replay queued operations as soon as the engine starts.
    pub drain_on_start: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            cmd_queue_bound: 256,
            event_capacity: 1024,
            drain_on_start: true,
        }
    }
}

/// Cloneable handle to a running sync engine.
pub struct SyncHandle {
    cmd_tx: mpsc::Sender<Command>,
    events_tx: broadcast::Sender<SyncEvent>,
}

impl Clone for SyncHandle {
    fn clone(&self) -> Self {
        Self {
            cmd_tx: self.cmd_tx.clone(),
            events_tx: self.events_tx.clone(),
        }
    }
}

enum Command {
    Perform {
        kind: OpKind,
        entity_key: EntityKey,
        payload: Value,
        resp: oneshot::Sender<Result<PerformOutcome, SyncError>>,
    },
    Get {
        entity_key: EntityKey,
        resp: oneshot::Sender<Option<Vec<Document>>>,
    },
    Seed {
        entity_key: EntityKey,
        rows: Vec<Document>,
        resp: oneshot::Sender<()>,
    },
    Merge {
        entity_key: EntityKey,
        rows: Vec<Document>,
        resp: oneshot::Sender<()>,
    },
    QueueLen {
        entity_key: Option<EntityKey>,
        resp: oneshot::Sender<Result<usize, SyncError>>,
    },
    Drain {
        resp: oneshot::Sender<()>,
    },
    Shutdown {
        resp: oneshot::Sender<()>,
    },
}

/// Spawns the engine loop and returns its handle.
///
/// The loop exclusively owns the cache store and the operation queue; all
/// mutation paths are serialized through it. Remote calls and drain groups
/// run as spawned tasks that feed completions back into the loop, so
/// cross-entity work overlaps while every cache/queue mutation stays
/// single-writer. A drain runs at startup (when configured and online) and
/// after every offline→online transition.
pub fn spawn_sync_engine(
    cache: CacheStore,
    queue: OperationQueue,
    remote: Arc<dyn RemoteStore>,
    monitor: &ConnectivityMonitor,
    config: SyncConfig,
) -> SyncHandle {
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<Command>(config.cmd_queue_bound);
    let (events_tx, _) = broadcast::channel::<SyncEvent>(config.event_capacity);
    let mut online_rx = monitor.subscribe();
    let drain_on_start = config.drain_on_start;

    let events_tx_loop = events_tx.clone();
    tokio::spawn(async move {
        let (internal_tx, mut internal_rx) = mpsc::unbounded_channel::<Internal>();
        let mut state = EngineState {
            cache,
            queue,
            remote,
            events: events_tx_loop,
            online: *online_rx.borrow_and_update(),
            draining: HashSet::new(),
        };

        if drain_on_start && state.online {
            state.start_drain(&internal_tx);
        }

        let mut watch_alive = true;
        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    let Some(cmd) = cmd else { break; };
                    if handle_command(cmd, &mut state, &internal_tx) {
                        break;
                    }
                }
                Some(msg) = internal_rx.recv() => {
                    handle_internal(msg, &mut state);
                }
                changed = online_rx.changed(), if watch_alive => {
                    match changed {
                        Ok(()) => {
                            let online = *online_rx.borrow_and_update();
                            state.online = online;
                            let _ = state.events.send(SyncEvent::ConnectivityChanged { online });
                            if online {
                                state.start_drain(&internal_tx);
                            }
                        }
                        // Monitor dropped: keep the last known state.
                        Err(_) => watch_alive = false,
                    }
                }
            }
        }
    });

    SyncHandle { cmd_tx, events_tx }
}

fn handle_command(
    cmd: Command,
    state: &mut EngineState,
    internal_tx: &mpsc::UnboundedSender<Internal>,
) -> bool {
    match cmd {
        Command::Perform {
            kind,
            entity_key,
            payload,
            resp,
        } => match state.begin_perform(kind, entity_key, payload, resp) {
            PerformStep::Done => {}
            PerformStep::Submit(ctx) => {
                let remote = Arc::clone(&state.remote);
                let tx = internal_tx.clone();
                tokio::spawn(async move {
                    let result =
                        dispatch(remote.as_ref(), ctx.kind, &ctx.entity_key, &ctx.payload).await;
                    let _ = tx.send(Internal::PerformDone { ctx, result });
                });
            }
        },
        Command::Get { entity_key, resp } => {
            let _ = resp.send(state.cache.get_cloned(&entity_key));
        }
        Command::Seed {
            entity_key,
            rows,
            resp,
        } => {
            state.cache.merge_snapshot(&entity_key, rows);
            let _ = resp.send(());
        }
        Command::Merge {
            entity_key,
            rows,
            resp,
        } => {
            state.cache.merge_snapshot(&entity_key, rows);
            let _ = state.events.send(SyncEvent::Merged { entity_key });
            let _ = resp.send(());
        }
        Command::QueueLen { entity_key, resp } => {
            let res = state
                .queue
                .len(entity_key.as_deref())
                .map_err(SyncError::Queue);
            let _ = resp.send(res);
        }
        Command::Drain { resp } => {
            state.start_drain(internal_tx);
            let _ = resp.send(());
        }
        Command::Shutdown { resp } => {
            let _ = resp.send(());
            return true;
        }
    }
    false
}

fn handle_internal(msg: Internal, state: &mut EngineState) {
    match msg {
        Internal::PerformDone { ctx, result } => state.finish_perform(ctx, result),
        Internal::DrainItemDone { op, result } => state.finish_drain_item(op, result),
        Internal::DrainGroupDone { entity_key } => {
            state.draining.remove(&entity_key);
        }
    }
}

impl SyncHandle {
    /// Subscribes to the engine event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events_tx.subscribe()
    }

    /// Performs one logical write: optimistic apply, remote call, commit
    /// or rollback — or an immediate enqueue when offline.
    pub async fn perform(
        &self,
        kind: OpKind,
        entity_key: impl Into<EntityKey>,
        payload: Value,
    ) -> Result<PerformOutcome, SyncError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Perform {
                kind,
                entity_key: entity_key.into(),
                payload,
                resp: tx,
            })
            .await
            .map_err(|_| SyncError::ChannelClosed)?;
        rx.await.map_err(|_| SyncError::ChannelClosed)?
    }

    /// Current cached rows for `entity_key`.
    pub async fn get(
        &self,
        entity_key: impl Into<EntityKey>,
    ) -> Result<Option<Vec<Document>>, SyncError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Get {
                entity_key: entity_key.into(),
                resp: tx,
            })
            .await
            .map_err(|_| SyncError::ChannelClosed)?;
        rx.await.map_err(|_| SyncError::ChannelClosed)
    }

    /// Seeds or refreshes a cache entry from a query result. Goes through
    /// the precedence-preserving merge, so in-flight optimistic rows
    /// survive.
    pub async fn seed(
        &self,
        entity_key: impl Into<EntityKey>,
        rows: Vec<Document>,
    ) -> Result<(), SyncError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Seed {
                entity_key: entity_key.into(),
                rows,
                resp: tx,
            })
            .await
            .map_err(|_| SyncError::ChannelClosed)?;
        rx.await.map_err(|_| SyncError::ChannelClosed)
    }

    /// Merges a pushed authoritative snapshot into the cache.
    pub async fn merge_snapshot(
        &self,
        entity_key: impl Into<EntityKey>,
        rows: Vec<Document>,
    ) -> Result<(), SyncError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Merge {
                entity_key: entity_key.into(),
                rows,
                resp: tx,
            })
            .await
            .map_err(|_| SyncError::ChannelClosed)?;
        rx.await.map_err(|_| SyncError::ChannelClosed)
    }

    /// Number of queued operations, optionally for one entity key.
    pub async fn queue_len(&self, entity_key: Option<&str>) -> Result<usize, SyncError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::QueueLen {
                entity_key: entity_key.map(str::to_string),
                resp: tx,
            })
            .await
            .map_err(|_| SyncError::ChannelClosed)?;
        rx.await.map_err(|_| SyncError::ChannelClosed)?
    }

    /// Manually triggers a drain pass.
    pub async fn drain(&self) -> Result<(), SyncError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Drain { resp: tx })
            .await
            .map_err(|_| SyncError::ChannelClosed)?;
        rx.await.map_err(|_| SyncError::ChannelClosed)
    }

    /// Stops the engine loop. In-flight remote calls may still complete
    /// against the network but their results are discarded.
    pub async fn shutdown(&self) -> Result<(), SyncError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Shutdown { resp: tx })
            .await
            .map_err(|_| SyncError::ChannelClosed)?;
        rx.await.map_err(|_| SyncError::ChannelClosed)
    }
}
