//! Database migrations

use crate::error::Result;
use rusqlite::Connection;

/// Current schema version
const CURRENT_VERSION: i32 = 2;

/// Run all pending migrations
pub fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn)?;

    if version < 1 {
        migrate(conn, 1, MIGRATION_V1)?;
    }
    if version < 2 {
        migrate(conn, 2, MIGRATION_V2)?;
    }

    Ok(())
}

/// Get the current schema version
fn get_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version = conn
        .query_row("SELECT MAX(version) FROM schema_version", [], |row| {
            row.get::<_, Option<i32>>(0)
        })?
        .unwrap_or(0);

    Ok(version)
}

/// Version 1: entities with sync stamps and per-user checkpoints
const MIGRATION_V1: &str = "
    CREATE TABLE IF NOT EXISTS schema_version (
        version INTEGER PRIMARY KEY
    );
    CREATE TABLE IF NOT EXISTS entities (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        entity_type TEXT NOT NULL,
        payload TEXT NOT NULL,
        sync_state TEXT NOT NULL,
        updated_at INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_entities_user_state ON entities(user_id, sync_state);
    CREATE INDEX IF NOT EXISTS idx_entities_type ON entities(entity_type);
    CREATE TABLE IF NOT EXISTS sync_checkpoints (
        user_id TEXT PRIMARY KEY,
        last_synced_at INTEGER NOT NULL
    );
    INSERT INTO schema_version (version) VALUES (1);
";

/// Version 2: conflict log and stashed server copies for conflicted entities
const MIGRATION_V2: &str = "
    CREATE TABLE IF NOT EXISTS sync_conflicts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        entity_id TEXT NOT NULL,
        user_id TEXT NOT NULL,
        entity_type TEXT NOT NULL,
        resolution TEXT NOT NULL,
        detected_at INTEGER NOT NULL,
        resolved_at INTEGER
    );
    CREATE INDEX IF NOT EXISTS idx_sync_conflicts_entity_id ON sync_conflicts(entity_id);
    CREATE INDEX IF NOT EXISTS idx_sync_conflicts_user ON sync_conflicts(user_id, detected_at DESC);
    ALTER TABLE entities ADD COLUMN server_payload TEXT;
    INSERT INTO schema_version (version) VALUES (2);
";

fn migrate(conn: &Connection, version: i32, statements: &str) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(statements)?;
    tx.commit()?;

    tracing::info!("Migrated database to version {version} (latest {CURRENT_VERSION})");
    Ok(())
}
