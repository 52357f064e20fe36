//! Push-subscription pump feeding authoritative snapshots into the engine.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::{doc::Document, types::EntityKey};

use super::handle::SyncHandle;

/// Consumes a push stream and writes each snapshot into the cache through
/// the engine, in arrival order.
///
/// The precedence rule — outstanding speculative rows win over a push that
/// cannot yet know about them — is enforced by the cache store's merge
/// operation; this type is only the stream glue.
#[derive(Clone)]
pub struct SubscriptionMerger {
    handle: SyncHandle,
}

impl SubscriptionMerger {
    /// Creates a merger feeding `handle`.
    pub fn new(handle: SyncHandle) -> Self {
        Self { handle }
    }

    /// Spawns a pump forwarding snapshots for `entity_key` until the
    /// stream ends. Dropping the sender detaches the subscription.
    pub fn attach(
        &self,
        entity_key: impl Into<EntityKey>,
        mut snapshots: mpsc::Receiver<Vec<Document>>,
    ) -> JoinHandle<()> {
        let handle = self.handle.clone();
        let entity_key = entity_key.into();
        tokio::spawn(async move {
            while let Some(rows) = snapshots.recv().await {
                if handle.merge_snapshot(entity_key.clone(), rows).await.is_err() {
                    break;
                }
            }
        })
    }
}
