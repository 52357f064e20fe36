//! Cached row model shared by every entity family.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::DocId;

/// One cached row of an entity-key query result.
///
/// The body stays opaque JSON: the engine serves animals, tasks, calendar
/// events, health records, and production records through the same write
/// paths and never interprets domain fields beyond row identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Row identity. Server-issued, or a temp id while speculative.
    pub id: DocId,
    /// Opaque record fields.
    pub body: Value,
}

impl Document {
    /// Constructs a row from an identity and a body.
    pub fn new(id: impl Into<DocId>, body: Value) -> Self {
        Self {
            id: id.into(),
            body,
        }
    }
}

/// Shallow-merges `patch` object fields into `body`, overwriting per key.
///
/// Non-object bodies are replaced outright.
pub fn merge_fields(body: &mut Value, patch: &Value) {
    match (body.as_object_mut(), patch.as_object()) {
        (Some(dst), Some(src)) => {
            for (k, v) in src {
                dst.insert(k.clone(), v.clone());
            }
        }
        _ => *body = patch.clone(),
    }
}
