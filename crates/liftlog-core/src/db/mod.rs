//! Local persistence for LiftLog

mod connection;
mod migrations;
mod store;

pub use connection::Database;
pub use store::{ApplyOutcome, ConflictResolution, LocalStore, SqliteLocalStore};
