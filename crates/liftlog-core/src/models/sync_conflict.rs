//! Sync conflict model

use serde::{Deserialize, Serialize};

/// Conflict reported by the server on push and flagged locally
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConflict {
    /// Conflict row identifier
    pub id: i64,
    /// Entity involved in the conflict
    pub entity_id: String,
    /// Owning user
    pub user_id: String,
    /// Entity type discriminator as reported by the server
    pub entity_type: String,
    /// Resolution directive sent by the server (recorded, not applied)
    pub resolution: String,
    /// When the conflict was flagged (Unix ms)
    pub detected_at: i64,
    /// When the user resolved it (Unix ms)
    pub resolved_at: Option<i64>,
}

impl SyncConflict {
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.resolved_at.is_none()
    }
}
