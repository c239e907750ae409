//! Pull phase: apply server changes since the last checkpoint

use chrono::{DateTime, Utc};

use crate::db::{ApplyOutcome, LocalStore};
use crate::error::Result;

use super::cancel::CancellationSignal;
use super::remote::RemoteSyncClient;

/// Counters reported by a pull
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PullSummary {
    /// Entities received from the server
    pub pulled: usize,
}

#[derive(Debug)]
pub struct PullCoordinator<'a, S, R> {
    store: &'a S,
    remote: &'a R,
}

impl<'a, S: LocalStore, R: RemoteSyncClient> PullCoordinator<'a, S, R> {
    pub const fn new(store: &'a S, remote: &'a R) -> Self {
        Self { store, remote }
    }

    /// Pull and apply the server's changes for `user_id`.
    ///
    /// The checkpoint moves only after the whole batch applied, so an
    /// interrupted pull is repeated from the same point next time.
    pub async fn pull(&self, user_id: &str, cancel: &CancellationSignal) -> Result<PullSummary> {
        let since = self
            .store
            .checkpoint(user_id)
            .await?
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

        let outcome = cancel.guard(self.remote.pull(user_id, since)).await?;

        let mut deferred = 0;
        let mut stashed = 0;
        for entity in &outcome.entities {
            cancel.check()?;
            match self.store.apply_remote(user_id, entity).await? {
                ApplyOutcome::Inserted | ApplyOutcome::Updated => {}
                ApplyOutcome::Deferred => deferred += 1,
                ApplyOutcome::Stashed => stashed += 1,
            }
        }
        cancel.check()?;

        self.store
            .set_checkpoint(user_id, outcome.server_timestamp)
            .await?;

        tracing::info!(
            user_id,
            %since,
            pulled = outcome.entities.len(),
            deferred,
            stashed,
            checkpoint = %outcome.server_timestamp,
            "Pull complete"
        );

        Ok(PullSummary {
            pulled: outcome.entities.len(),
        })
    }
}
