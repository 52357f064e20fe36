use std::time::{SystemTime, UNIX_EPOCH};

use hashbrown::{HashMap, HashSet};
use uuid::Uuid;

use crate::{
    doc::Document,
    types::{DocId, EntityKey, Version},
};

/// Bookkeeping created at the moment a speculative value is applied.
///
/// Returned to the caller so the same mutation can later be committed or
/// rolled back. The store tracks which records are still outstanding, so a
/// record that was already consumed makes both operations a no-op — commit
/// and rollback are each idempotent.
#[derive(Debug, Clone)]
pub struct OptimisticRecord {
    /// Locally generated identifier, disjoint from any id the remote store
    /// could issue.
    pub temp_id: DocId,
    /// Affected cache entry.
    pub entity_key: EntityKey,
    /// Entry version immediately after the speculative apply.
    pub version_at_apply: Version,
    /// Milliseconds since epoch at apply time; diagnostics only.
    pub applied_at: u64,
    snapshot: Vec<Document>,
}

#[derive(Debug, Default)]
struct CacheEntry {
    value: Vec<Document>,
    pending: HashSet<DocId>,
    version: Version,
    stale: bool,
}

/// Keyed collection of cached query results with speculative overlays.
///
/// Exclusively owns every entry and optimistic record; the coordinator and
/// the subscription merger interact with cached values only through the
/// operations here, never by direct mutation. Each independent optimistic
/// write carries its own undo snapshot, so overlapping writes on one entry
/// commit and roll back without disturbing each other's bookkeeping.
#[derive(Debug, Default)]
pub struct CacheStore {
    entries: HashMap<EntityKey, CacheEntry>,
    live: HashSet<DocId>,
}

impl CacheStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current rows for `entity_key`, if the entry exists.
    pub fn get(&self, entity_key: &str) -> Option<&[Document]> {
        self.entries.get(entity_key).map(|e| e.value.as_slice())
    }

    /// Cloned rows for `entity_key`.
    pub fn get_cloned(&self, entity_key: &str) -> Option<Vec<Document>> {
        self.get(entity_key).map(<[Document]>::to_vec)
    }

    /// Monotonic version of the entry; zero when it does not exist.
    pub fn version(&self, entity_key: &str) -> Version {
        self.entries.get(entity_key).map_or(0, |e| e.version)
    }

    /// True when the entry has been invalidated and awaits a refetch.
    pub fn is_stale(&self, entity_key: &str) -> bool {
        self.entries.get(entity_key).is_some_and(|e| e.stale)
    }

    /// Number of speculative rows currently overlaid on the entry.
    pub fn pending_len(&self, entity_key: &str) -> usize {
        self.entries.get(entity_key).map_or(0, |e| e.pending.len())
    }

    /// Snapshots the entry, applies `transform` to produce the new visible
    /// value, and registers the speculative write.
    ///
    /// The transform receives the freshly minted temp id; a create pushes a
    /// row under that id, while updates and deletes ignore it and edit
    /// rows in place. The temp id joins the entry's pending set only when
    /// the transform actually placed a row under it, which is what lets a
    /// pushed snapshot know which rows to step around.
    pub fn apply_optimistic(
        &mut self,
        entity_key: &str,
        transform: impl FnOnce(&mut Vec<Document>, &DocId),
    ) -> OptimisticRecord {
        let temp_id: DocId = format!("temp-{}", Uuid::new_v4());
        let entry = self.entries.entry(entity_key.to_string()).or_default();
        let snapshot = entry.value.clone();

        transform(&mut entry.value, &temp_id);
        if entry.value.iter().any(|d| d.id == temp_id) {
            entry.pending.insert(temp_id.clone());
        }
        entry.version += 1;
        self.live.insert(temp_id.clone());

        OptimisticRecord {
            temp_id,
            entity_key: entity_key.to_string(),
            version_at_apply: entry.version,
            applied_at: now_ms(),
            snapshot,
        }
    }

    /// Replaces the speculative state with the authoritative result and
    /// discards the snapshot.
    ///
    /// `finalize` typically swaps the temp identifier for the server-issued
    /// one. It runs only while the entry still reflects the speculative
    /// apply: either no other write touched the entry since, or a pushed
    /// snapshot merged around the still-pending temp row. A completion that
    /// captured an older version of an entry a newer push has since
    /// replaced only clears bookkeeping — the push is closer to ground
    /// truth than the late local result. Returns false on repeat calls.
    pub fn commit(
        &mut self,
        record: &OptimisticRecord,
        finalize: impl FnOnce(&mut Vec<Document>),
    ) -> bool {
        if !self.live.remove(&record.temp_id) {
            return false;
        }
        let Some(entry) = self.entries.get_mut(&record.entity_key) else {
            return false;
        };
        let temp_row_present = entry.value.iter().any(|d| d.id == record.temp_id);
        if entry.version == record.version_at_apply || temp_row_present {
            finalize(&mut entry.value);
            entry.version += 1;
        }
        entry.pending.remove(&record.temp_id);
        true
    }

    /// Restores the entry to its pre-apply snapshot, verbatim.
    ///
    /// Returns false on repeat calls; overlapping error handlers can both
    /// invoke this safely.
    pub fn rollback(&mut self, record: &OptimisticRecord) -> bool {
        if !self.live.remove(&record.temp_id) {
            return false;
        }
        let Some(entry) = self.entries.get_mut(&record.entity_key) else {
            return false;
        };
        entry.value = record.snapshot.clone();
        entry.pending.remove(&record.temp_id);
        entry.version += 1;
        true
    }

    /// Marks the entry stale so callers refetch authoritative state.
    pub fn invalidate(&mut self, entity_key: &str) {
        if let Some(entry) = self.entries.get_mut(entity_key) {
            entry.stale = true;
        }
    }

    /// Writes an authoritative snapshot into the entry and clears the stale
    /// flag.
    ///
    /// Rows whose identity matches an outstanding temp id are preserved:
    /// the snapshot was computed before the pending write reached the
    /// server, so it cannot yet know about those rows and must not clobber
    /// them. Once the pending write commits, the next snapshot carries the
    /// merged authoritative state and nothing is held back. Query seeding
    /// goes through this same path so a background refetch cannot clobber
    /// in-flight optimistic rows either.
    pub fn merge_snapshot(&mut self, entity_key: &str, rows: Vec<Document>) {
        let entry = self.entries.entry(entity_key.to_string()).or_default();
        let preserved: Vec<Document> = entry
            .value
            .iter()
            .filter(|d| entry.pending.contains(&d.id))
            .cloned()
            .collect();
        entry.value = rows;
        entry.value.extend(preserved);
        entry.version += 1;
        entry.stale = false;
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
