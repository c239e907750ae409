//! Local store adapter used by the sync engine

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension};
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::models::{EntityId, EntityRegistry, SyncConflict, SyncEntity, SyncState, Syncable};
use crate::sync::{PushConflict, RemoteEntity};

use super::Database;

/// What [`LocalStore::apply_remote`] did with an incoming server copy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Entity did not exist locally and was inserted as `Synced`
    Inserted,
    /// A `Synced` local copy was overwritten
    Updated,
    /// Local copy has pending writes; left for the next push to surface
    Deferred,
    /// Local copy is in conflict; server copy kept aside for resolution
    Stashed,
}

/// How the user settles a flagged conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictResolution {
    /// Keep the local payload and push it again
    KeepLocal,
    /// Replace the local payload with the server copy received by the last pull
    AcceptServer,
}

/// Storage operations the sync engine needs (async)
#[allow(async_fn_in_trait)]
pub trait LocalStore {
    /// Snapshot of the user's entities in `New` or `Modified`
    async fn list_pending(&self, user_id: &str) -> Result<Vec<SyncEntity>>;

    /// Get an entity by ID
    async fn get(&self, id: &EntityId) -> Result<Option<SyncEntity>>;

    /// Upsert a server copy, stamping it `Synced`, unless local work is pending
    async fn apply_remote(&self, user_id: &str, entity: &RemoteEntity) -> Result<ApplyOutcome>;

    /// Flag an entity as `Conflict` without touching its payload.
    ///
    /// Returns `false` when no local row of `user_id` matched; the conflict is
    /// still logged.
    async fn mark_conflict(&self, user_id: &str, conflict: &PushConflict) -> Result<bool>;

    /// Stamp an entity `Synced` if it was not written since `pushed_updated_at`.
    ///
    /// Returns `false` when the row changed (or vanished) after being pushed.
    async fn mark_synced(&self, id: &EntityId, pushed_updated_at: i64) -> Result<bool>;

    /// Last server timestamp successfully pulled for the user
    async fn checkpoint(&self, user_id: &str) -> Result<Option<DateTime<Utc>>>;

    /// Record a new pull checkpoint
    async fn set_checkpoint(&self, user_id: &str, at: DateTime<Utc>) -> Result<()>;
}

const ENTITY_COLUMNS: &str = "id, user_id, entity_type, payload, sync_state, updated_at";

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// `SQLite` implementation of [`LocalStore`], shareable across tasks
#[derive(Clone)]
pub struct SqliteLocalStore {
    db: Arc<Mutex<Database>>,
    registry: Arc<EntityRegistry>,
}

impl SqliteLocalStore {
    /// Wrap an open database with the given entity registry
    pub fn new(db: Database, registry: EntityRegistry) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            registry: Arc::new(registry),
        }
    }

    /// Open a store at the given filesystem path with the built-in entity types
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(Database::open(path)?, EntityRegistry::default()))
    }

    /// Open an in-memory store (primarily for tests)
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::new(
            Database::open_in_memory()?,
            EntityRegistry::default(),
        ))
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    /// Save a typed entity from a local edit
    pub async fn save<T: Syncable>(&self, entity: &T) -> Result<SyncEntity> {
        let payload = self.registry.encode(entity)?;
        self.save_payload(entity.user_id(), T::ENTITY_TYPE, entity.id(), payload)
            .await
    }

    /// Load a typed entity
    pub async fn load<T: Syncable>(&self, id: &EntityId) -> Result<Option<T>> {
        match self.get(id).await? {
            Some(entity) => Ok(Some(self.registry.decode(&entity)?)),
            None => Ok(None),
        }
    }

    /// Record a local write of an untyped payload.
    ///
    /// New ids are inserted as `New`; existing rows move along
    /// [`SyncState::after_local_write`].
    pub async fn save_payload(
        &self,
        user_id: &str,
        entity_type: &str,
        id: EntityId,
        payload: serde_json::Value,
    ) -> Result<SyncEntity> {
        if user_id.trim().is_empty() {
            return Err(Error::InvalidInput("user id cannot be empty".into()));
        }
        if entity_type.trim().is_empty() {
            return Err(Error::InvalidInput("entity type cannot be empty".into()));
        }

        let db = self.db.lock().await;
        let conn = db.connection();
        let now = now_millis();
        let tx = conn.unchecked_transaction()?;

        let existing = tx
            .query_row(
                "SELECT user_id, entity_type, sync_state FROM entities WHERE id = ?",
                params![id.as_str()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        parse_state(row, 2)?,
                    ))
                },
            )
            .optional()?;

        match existing {
            None => {
                tx.execute(
                    "INSERT INTO entities (id, user_id, entity_type, payload, sync_state, updated_at)
                     VALUES (?, ?, ?, ?, ?, ?)",
                    params![
                        id.as_str(),
                        user_id,
                        entity_type,
                        payload,
                        SyncState::New.as_str(),
                        now
                    ],
                )?;
            }
            Some((owner, stored_type, state)) => {
                if owner != user_id {
                    return Err(Error::InvalidInput(format!(
                        "entity {id} belongs to another user"
                    )));
                }
                if stored_type != entity_type {
                    return Err(Error::InvalidInput(format!(
                        "entity {id} is a '{stored_type}', not a '{entity_type}'"
                    )));
                }
                tx.execute(
                    "UPDATE entities
                     SET payload = ?, sync_state = ?, updated_at = MAX(?, updated_at + 1)
                     WHERE id = ?",
                    params![
                        payload,
                        state.after_local_write().as_str(),
                        now,
                        id.as_str()
                    ],
                )?;
            }
        }

        tx.commit()?;
        Self::fetch(conn, &id)?.ok_or_else(|| Error::NotFound(id.to_string()))
    }

    /// All of a user's entities, oldest write first
    pub async fn list_entities(&self, user_id: &str) -> Result<Vec<SyncEntity>> {
        let db = self.db.lock().await;
        let mut stmt = db.connection().prepare(&format!(
            "SELECT {ENTITY_COLUMNS} FROM entities WHERE user_id = ? ORDER BY updated_at, id"
        ))?;
        let entities = stmt
            .query_map(params![user_id], parse_entity)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entities)
    }

    /// Recently flagged conflicts for a user, newest first
    pub async fn list_conflicts(&self, user_id: &str, limit: usize) -> Result<Vec<SyncConflict>> {
        let db = self.db.lock().await;
        let mut stmt = db.connection().prepare(
            "SELECT id, entity_id, user_id, entity_type, resolution, detected_at, resolved_at
             FROM sync_conflicts
             WHERE user_id = ?
             ORDER BY detected_at DESC, id DESC
             LIMIT ?",
        )?;
        let conflicts = stmt
            .query_map(params![user_id, limit as i64], |row| {
                Ok(SyncConflict {
                    id: row.get(0)?,
                    entity_id: row.get(1)?,
                    user_id: row.get(2)?,
                    entity_type: row.get(3)?,
                    resolution: row.get(4)?,
                    detected_at: row.get(5)?,
                    resolved_at: row.get(6)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(conflicts)
    }

    /// Settle a conflicted entity and close its open conflict log rows
    pub async fn resolve_conflict(
        &self,
        id: &EntityId,
        resolution: ConflictResolution,
    ) -> Result<SyncEntity> {
        let db = self.db.lock().await;
        let conn = db.connection();
        let now = now_millis();
        let tx = conn.unchecked_transaction()?;

        let (state, server_payload) = tx
            .query_row(
                "SELECT sync_state, server_payload FROM entities WHERE id = ?",
                params![id.as_str()],
                |row| {
                    Ok((
                        parse_state(row, 0)?,
                        row.get::<_, Option<serde_json::Value>>(1)?,
                    ))
                },
            )
            .optional()?
            .ok_or_else(|| Error::NotFound(id.to_string()))?;

        if state != SyncState::Conflict {
            return Err(Error::InvalidInput(format!(
                "entity {id} is not in conflict (state {state})"
            )));
        }

        match resolution {
            ConflictResolution::KeepLocal => {
                tx.execute(
                    "UPDATE entities
                     SET sync_state = ?, server_payload = NULL, updated_at = MAX(?, updated_at + 1)
                     WHERE id = ?",
                    params![SyncState::Modified.as_str(), now, id.as_str()],
                )?;
            }
            ConflictResolution::AcceptServer => {
                let server_payload = server_payload.ok_or_else(|| {
                    Error::InvalidInput(format!(
                        "no server copy of entity {id} has been pulled yet"
                    ))
                })?;
                tx.execute(
                    "UPDATE entities
                     SET payload = ?, sync_state = ?, server_payload = NULL, updated_at = ?
                     WHERE id = ?",
                    params![server_payload, SyncState::Synced.as_str(), now, id.as_str()],
                )?;
            }
        }

        tx.execute(
            "UPDATE sync_conflicts SET resolved_at = ? WHERE entity_id = ? AND resolved_at IS NULL",
            params![now, id.as_str()],
        )?;
        tx.commit()?;

        tracing::info!(entity = %id, ?resolution, "Resolved sync conflict");
        Self::fetch(conn, id)?.ok_or_else(|| Error::NotFound(id.to_string()))
    }

    fn fetch(conn: &rusqlite::Connection, id: &EntityId) -> Result<Option<SyncEntity>> {
        let entity = conn
            .query_row(
                &format!("SELECT {ENTITY_COLUMNS} FROM entities WHERE id = ?"),
                params![id.as_str()],
                parse_entity,
            )
            .optional()?;
        Ok(entity)
    }
}

impl LocalStore for SqliteLocalStore {
    async fn list_pending(&self, user_id: &str) -> Result<Vec<SyncEntity>> {
        let db = self.db.lock().await;
        let mut stmt = db.connection().prepare(&format!(
            "SELECT {ENTITY_COLUMNS}
             FROM entities
             WHERE user_id = ? AND sync_state IN (?, ?)
             ORDER BY updated_at, id"
        ))?;
        let entities = stmt
            .query_map(
                params![
                    user_id,
                    SyncState::New.as_str(),
                    SyncState::Modified.as_str()
                ],
                parse_entity,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entities)
    }

    async fn get(&self, id: &EntityId) -> Result<Option<SyncEntity>> {
        let db = self.db.lock().await;
        Self::fetch(db.connection(), id)
    }

    async fn apply_remote(&self, user_id: &str, entity: &RemoteEntity) -> Result<ApplyOutcome> {
        let payload = self.registry.normalize_remote(
            user_id,
            &entity.entity_type,
            entity.id,
            entity.payload.clone(),
        )?;

        let db = self.db.lock().await;
        let conn = db.connection();
        let now = now_millis();
        let tx = conn.unchecked_transaction()?;

        let existing = tx
            .query_row(
                "SELECT user_id, sync_state FROM entities WHERE id = ?",
                params![entity.id.as_str()],
                |row| Ok((row.get::<_, String>(0)?, parse_state(row, 1)?)),
            )
            .optional()?;

        if let Some((owner, _)) = &existing {
            if owner != user_id {
                return Err(Error::InvalidPayload {
                    entity_type: entity.entity_type.clone(),
                    message: format!("entity {} belongs to another user", entity.id),
                });
            }
        }

        let outcome = match existing.map(|(_, state)| state) {
            None => {
                tx.execute(
                    "INSERT INTO entities (id, user_id, entity_type, payload, sync_state, updated_at)
                     VALUES (?, ?, ?, ?, ?, ?)",
                    params![
                        entity.id.as_str(),
                        user_id,
                        entity.entity_type,
                        payload,
                        SyncState::Synced.as_str(),
                        now
                    ],
                )?;
                ApplyOutcome::Inserted
            }
            Some(state) if state.is_pending() => {
                tracing::debug!(entity = %entity.id, %state, "Local write pending; server copy deferred");
                ApplyOutcome::Deferred
            }
            Some(SyncState::Conflict) => {
                tx.execute(
                    "UPDATE entities SET server_payload = ? WHERE id = ?",
                    params![payload, entity.id.as_str()],
                )?;
                ApplyOutcome::Stashed
            }
            Some(_) => {
                tx.execute(
                    "UPDATE entities
                     SET entity_type = ?, payload = ?, sync_state = ?, updated_at = ?, server_payload = NULL
                     WHERE id = ?",
                    params![
                        entity.entity_type,
                        payload,
                        SyncState::Synced.as_str(),
                        now,
                        entity.id.as_str()
                    ],
                )?;
                ApplyOutcome::Updated
            }
        };

        tx.commit()?;
        Ok(outcome)
    }

    async fn mark_conflict(&self, user_id: &str, conflict: &PushConflict) -> Result<bool> {
        let db = self.db.lock().await;
        let conn = db.connection();
        let tx = conn.unchecked_transaction()?;

        let flagged = tx.execute(
            "UPDATE entities SET sync_state = ? WHERE id = ? AND user_id = ?",
            params![
                SyncState::Conflict.as_str(),
                conflict.entity_id.as_str(),
                user_id
            ],
        )?;
        tx.execute(
            "INSERT INTO sync_conflicts (entity_id, user_id, entity_type, resolution, detected_at)
             VALUES (?, ?, ?, ?, ?)",
            params![
                conflict.entity_id.as_str(),
                user_id,
                conflict.entity_type,
                conflict.resolution.as_str(),
                now_millis()
            ],
        )?;

        tx.commit()?;
        Ok(flagged > 0)
    }

    async fn mark_synced(&self, id: &EntityId, pushed_updated_at: i64) -> Result<bool> {
        let db = self.db.lock().await;
        let rows = db.connection().execute(
            "UPDATE entities
             SET sync_state = ?, server_payload = NULL
             WHERE id = ? AND updated_at = ? AND sync_state IN (?, ?)",
            params![
                SyncState::Synced.as_str(),
                id.as_str(),
                pushed_updated_at,
                SyncState::New.as_str(),
                SyncState::Modified.as_str()
            ],
        )?;
        Ok(rows > 0)
    }

    async fn checkpoint(&self, user_id: &str) -> Result<Option<DateTime<Utc>>> {
        let db = self.db.lock().await;
        let millis: Option<i64> = db
            .connection()
            .query_row(
                "SELECT last_synced_at FROM sync_checkpoints WHERE user_id = ?",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;

        millis
            .map(|millis| {
                DateTime::from_timestamp_millis(millis).ok_or_else(|| {
                    Error::InvalidInput(format!("stored checkpoint {millis} is out of range"))
                })
            })
            .transpose()
    }

    async fn set_checkpoint(&self, user_id: &str, at: DateTime<Utc>) -> Result<()> {
        let db = self.db.lock().await;
        db.connection().execute(
            "INSERT INTO sync_checkpoints (user_id, last_synced_at) VALUES (?, ?)
             ON CONFLICT(user_id) DO UPDATE SET last_synced_at = excluded.last_synced_at",
            params![user_id, at.timestamp_millis()],
        )?;
        Ok(())
    }
}

/// Parse an entity from a row selected with `ENTITY_COLUMNS`
fn parse_entity(row: &rusqlite::Row<'_>) -> rusqlite::Result<SyncEntity> {
    let id: String = row.get(0)?;
    Ok(SyncEntity {
        id: id
            .parse()
            .map_err(|error| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(error)))?,
        user_id: row.get(1)?,
        entity_type: row.get(2)?,
        payload: row.get(3)?,
        sync_state: parse_state(row, 4)?,
        updated_at: row.get(5)?,
    })
}

fn parse_state(row: &rusqlite::Row<'_>, index: usize) -> rusqlite::Result<SyncState> {
    let raw: String = row.get(index)?;
    raw.parse().map_err(|error: Error| {
        rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(error))
    })
}
