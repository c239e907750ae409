//! Syncable entity model

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::Result;

use super::SyncState;

/// A unique identifier for a syncable entity, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(Uuid);

impl EntityId {
    /// Create a new unique entity ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EntityId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A record as the sync engine sees it: identity, owner, type tag, stamp, and an opaque payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncEntity {
    /// Unique identifier
    pub id: EntityId,
    /// Owning user
    pub user_id: String,
    /// Type discriminator (e.g. `workout_session`)
    pub entity_type: String,
    /// Domain fields, never interpreted by the engine
    pub payload: serde_json::Value,
    /// Sync stamp
    pub sync_state: SyncState,
    /// Last local write (Unix ms)
    pub updated_at: i64,
}

impl SyncEntity {
    /// Whether this entity still has to be pushed
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.sync_state.is_pending()
    }
}

/// A domain type that can travel through the sync engine.
///
/// Implementors are registered in an [`EntityRegistry`](super::EntityRegistry)
/// under [`Syncable::ENTITY_TYPE`].
pub trait Syncable: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Discriminator sent on the wire as `entityType`
    const ENTITY_TYPE: &'static str;

    /// Stable identifier
    fn id(&self) -> EntityId;

    /// Owning user
    fn user_id(&self) -> &str;

    /// Domain validation run on local saves and on incoming remote copies
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}
