//! Optimistic mutation and offline reconciliation for a farm-dashboard
//! client: a durable operation queue, an optimistic cache with
//! snapshot-exact rollback, and a push-subscription merge that never
//! clobbers in-flight speculative state.
//!
//! # Examples
//!
//! In-memory usage with [`cache::store::CacheStore`]:
//! ```
//! use herdsync::{cache::store::CacheStore, doc::Document};
//! use serde_json::json;
//!
//! let mut cache = CacheStore::new();
//! cache.merge_snapshot(
//!     "animals:farm1",
//!     vec![Document::new("a1", json!({"name": "Bessie"}))],
//! );
//!
//! let record = cache.apply_optimistic("animals:farm1", |rows, temp_id| {
//!     rows.push(Document::new(temp_id.clone(), json!({"name": "Clover"})));
//! });
//! assert_eq!(cache.get("animals:farm1").map(<[_]>::len), Some(2));
//!
//! cache.rollback(&record);
//! assert_eq!(cache.get("animals:farm1").map(<[_]>::len), Some(1));
//! ```
//!
//! Engine usage with a SQLite-backed queue:
//! ```no_run
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use serde_json::{Value, json};
//!
//! use herdsync::{
//!     cache::store::CacheStore,
//!     net::ConnectivityMonitor,
//!     queue::{ops::OperationQueue, sqlite::SqliteStore},
//!     remote::{RemoteError, RemoteStore},
//!     sync::handle::{SyncConfig, spawn_sync_engine},
//!     types::{DocId, OpKind},
//! };
//!
//! struct Backend;
//!
//! #[async_trait]
//! impl RemoteStore for Backend {
//!     async fn create(&self, _entity_key: &str, _payload: &Value) -> Result<DocId, RemoteError> {
//!         Ok("srv-1".to_string())
//!     }
//!     async fn update(
//!         &self,
//!         _entity_key: &str,
//!         _id: &str,
//!         _payload: &Value,
//!     ) -> Result<(), RemoteError> {
//!         Ok(())
//!     }
//!     async fn delete(&self, _entity_key: &str, _id: &str) -> Result<(), RemoteError> {
//!         Ok(())
//!     }
//! }
//!
//! # #[tokio::main]
//! # async fn main() {
//! let store = SqliteStore::open("herdsync.db").expect("open sqlite");
//! let queue = OperationQueue::new(Box::new(store));
//! let monitor = ConnectivityMonitor::new();
//! let handle = spawn_sync_engine(
//!     CacheStore::new(),
//!     queue,
//!     Arc::new(Backend),
//!     &monitor,
//!     SyncConfig::default(),
//! );
//! let _ = handle
//!     .perform(OpKind::Create, "animals:farm1", json!({"name": "Clover"}))
//!     .await
//!     .expect("create");
//! handle.shutdown().await.expect("shutdown");
//! # }
//! ```
#![deny(missing_docs)]

/// Optimistic cache store and reconciliation.
pub mod cache;
/// Cached row model shared by every entity family.
pub mod doc;
/// Connectivity signal relay.
pub mod net;
/// Write-intent model and durable envelope.
pub mod op;
/// Durable-store abstraction and the operation queue.
pub mod queue;
/// Remote document-store seam.
pub mod remote;
/// Engine runtime: coordinator, drain loop, merger, and events.
pub mod sync;
/// Shared primitive aliases and enums.
pub mod types;
