//! Shared identifier aliases and the operation-kind enum.

use serde::{Deserialize, Serialize};

/// Logical collection/record-family key, e.g. `"animals:farm1"`.
pub type EntityKey = String;
/// Client-generated unique operation identifier.
pub type OpId = String;
/// Record identity within an entity family. Server-issued for confirmed
/// rows, `temp-` prefixed for speculative ones.
pub type DocId = String;
/// Monotonic per-entry cache version.
pub type Version = u64;

/// Kind of write intent, data-described so queued items replay after a
/// process restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpKind {
    /// Create a new record.
    Create,
    /// Update fields of an existing record.
    Update,
    /// Delete an existing record.
    Delete,
    /// Update only the status field of an existing record.
    StatusChange,
}
