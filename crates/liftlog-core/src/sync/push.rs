//! Push phase: send pending local writes to the server

use std::collections::HashSet;

use crate::db::LocalStore;
use crate::error::Result;
use crate::models::{EntityId, SyncEntity};

use super::cancel::CancellationSignal;
use super::conflict::ConflictResolver;
use super::protocol::{PushEntity, PushOutcome};
use super::remote::RemoteSyncClient;

/// Counters reported by a push
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PushSummary {
    /// Entities the server accepted
    pub pushed: usize,
    /// Entities the server rejected as conflicting
    pub conflicts: usize,
}

#[derive(Debug)]
pub struct PushCoordinator<'a, S, R> {
    store: &'a S,
    remote: &'a R,
}

impl<'a, S: LocalStore, R: RemoteSyncClient> PushCoordinator<'a, S, R> {
    pub const fn new(store: &'a S, remote: &'a R) -> Self {
        Self { store, remote }
    }

    /// Push every pending entity of `user_id` in one batch.
    ///
    /// Nothing local changes if the push fails or is cancelled before the
    /// response is processed. A cancel while the response is applied stops
    /// before the next entity; rows not yet stamped stay pending.
    pub async fn push(&self, user_id: &str, cancel: &CancellationSignal) -> Result<PushSummary> {
        let pending = self.store.list_pending(user_id).await?;
        if pending.is_empty() {
            tracing::debug!(user_id, "Nothing to push");
            return Ok(PushSummary::default());
        }

        let batch: Vec<PushEntity> = pending.iter().map(PushEntity::from).collect();
        let outcome = cancel.guard(self.remote.push(user_id, batch)).await?;
        cancel.check()?;

        let conflicted: HashSet<EntityId> = outcome
            .conflicts
            .iter()
            .map(|conflict| conflict.entity_id)
            .collect();

        let mut marked = 0;
        for entity in synced_candidates(&pending, &conflicted, &outcome) {
            cancel.check()?;
            if self.store.mark_synced(&entity.id, entity.updated_at).await? {
                marked += 1;
            } else {
                tracing::debug!(entity = %entity.id, "Entity changed during push; left pending");
            }
        }

        let resolver = ConflictResolver::new(self.store);
        for conflict in &outcome.conflicts {
            cancel.check()?;
            resolver.resolve(user_id, conflict).await?;
        }

        tracing::info!(
            user_id,
            submitted = pending.len(),
            accepted = outcome.accepted,
            marked,
            conflicts = outcome.conflicts.len(),
            "Push complete"
        );

        Ok(PushSummary {
            pushed: outcome.accepted,
            conflicts: outcome.conflicts.len(),
        })
    }
}

/// Submitted entities the server's response lets us stamp `Synced`
fn synced_candidates<'p>(
    pending: &'p [SyncEntity],
    conflicted: &HashSet<EntityId>,
    outcome: &PushOutcome,
) -> Vec<&'p SyncEntity> {
    let not_conflicted = pending
        .iter()
        .filter(|entity| !conflicted.contains(&entity.id));

    if let Some(accepted_ids) = &outcome.accepted_ids {
        let accepted: HashSet<&EntityId> = accepted_ids.iter().collect();
        return not_conflicted
            .filter(|entity| accepted.contains(&entity.id))
            .collect();
    }

    if outcome.accepted + outcome.conflicts.len() < pending.len() {
        tracing::warn!(
            submitted = pending.len(),
            accepted = outcome.accepted,
            conflicts = outcome.conflicts.len(),
            "Server did not account for every pushed entity; leaving them pending"
        );
        return Vec::new();
    }

    not_conflicted.collect()
}
