//! Single-writer sync engine: mutation coordinator, queue drain loop,
//! subscription merger, and the event stream.

/// Per-mutation orchestration and the kind-based dispatch table.
pub mod coordinator;
/// Queue drain planning and per-item reconciliation.
pub mod drain;
/// Engine event stream payloads.
pub mod events;
/// Engine loop and its cloneable handle.
pub mod handle;
/// Push-subscription pump.
pub mod merger;
