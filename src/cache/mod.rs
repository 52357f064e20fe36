//! Optimistic cache entries and reconciliation.

/// Keyed cache store with speculative overlays.
pub mod store;
