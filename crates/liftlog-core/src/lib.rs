//! liftlog-core - Offline-first sync engine for LiftLog
//!
//! Workouts and body metrics are recorded on the device first, in a local
//! `SQLite` store, and reconciled with the server of record whenever the
//! host app calls [`SyncOrchestrator::sync`]. Conflicts are flagged for the
//! user instead of being overwritten.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod sync;

pub use config::SyncClientConfig;
pub use db::{LocalStore, SqliteLocalStore};
pub use error::{Error, Result};
pub use models::{BodyMetric, EntityId, SyncEntity, SyncState, Syncable, WorkoutSession};
pub use sync::{CancellationSignal, HttpSyncClient, SyncOrchestrator, SyncResult};
