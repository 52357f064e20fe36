//! Engine event stream payloads.

use crate::types::{DocId, EntityKey, OpId};

/// Events emitted from the single-writer engine loop.
///
/// UI layers subscribe to render pending counts, rollback indications, and
/// refetch triggers; an optimistic update that fails outside the offline
/// path always pairs with a visible [`SyncEvent::RolledBack`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// A speculative value became visible for an entity key.
    Applied {
        /// Affected entity key.
        entity_key: EntityKey,
        /// Temp id of the speculative write.
        temp_id: DocId,
    },
    /// The remote store confirmed a mutation.
    Committed {
        /// Affected entity key.
        entity_key: EntityKey,
        /// Confirmed record identity (server-issued for creates).
        id: DocId,
    },
    /// A speculative value was rolled back.
    RolledBack {
        /// Affected entity key.
        entity_key: EntityKey,
        /// Temp id of the undone write.
        temp_id: DocId,
    },
    /// A write was persisted for later replay.
    Queued {
        /// Affected entity key.
        entity_key: EntityKey,
        /// Queued operation id.
        op_id: OpId,
    },
    /// A queued operation replayed successfully during a drain.
    Drained {
        /// Affected entity key.
        entity_key: EntityKey,
        /// Replayed operation id.
        op_id: OpId,
    },
    /// A queued operation was dropped; user-visible, non-blocking.
    OpDropped {
        /// Affected entity key.
        entity_key: EntityKey,
        /// Dropped operation id.
        op_id: OpId,
        /// Failed attempts at the time of the drop.
        retries: u32,
    },
    /// The entry is stale; a background refetch should reseed it.
    Invalidated {
        /// Affected entity key.
        entity_key: EntityKey,
    },
    /// A pushed snapshot was merged into the cache.
    Merged {
        /// Affected entity key.
        entity_key: EntityKey,
    },
    /// The connectivity monitor reported a transition.
    ConnectivityChanged {
        /// New state.
        online: bool,
    },
}
