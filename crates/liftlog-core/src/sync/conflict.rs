//! Conflict handling for rejected pushes

use crate::db::LocalStore;
use crate::error::Result;

use super::protocol::PushConflict;

/// Flags every conflict reported by the server.
///
/// The server's resolution hint is logged with the conflict, never applied:
/// the local payload is left exactly as the user wrote it.
#[derive(Debug)]
pub struct ConflictResolver<'a, S> {
    store: &'a S,
}

impl<'a, S: LocalStore> ConflictResolver<'a, S> {
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub async fn resolve(&self, user_id: &str, conflict: &PushConflict) -> Result<()> {
        let flagged = self.store.mark_conflict(user_id, conflict).await?;
        if flagged {
            tracing::info!(
                user_id,
                entity = %conflict.entity_id,
                entity_type = %conflict.entity_type,
                resolution = %conflict.resolution,
                "Entity flagged as conflicted"
            );
        } else {
            tracing::warn!(
                user_id,
                entity = %conflict.entity_id,
                entity_type = %conflict.entity_type,
                "Server reported a conflict for an entity missing locally"
            );
        }
        Ok(())
    }
}
