//! Public sync entry point.
//!
//! A sync runs `CheckingPending → Pushing → Pulling → Completed`. Any error
//! ends it early and is folded into a [`SyncResult`]: an unreachable server
//! while pushing or pulling counts as offline mode (success with zero
//! counters), cancellation and everything else as failure.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;

use crate::db::LocalStore;
use crate::error::{Error, Result};

use super::cancel::CancellationSignal;
use super::pull::{PullCoordinator, PullSummary};
use super::push::{PushCoordinator, PushSummary};
use super::remote::RemoteSyncClient;

/// Where a sync run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncPhase {
    Idle,
    CheckingPending,
    Pushing,
    Pulling,
    Completed,
    Cancelled,
    Failed,
    OfflineFallback,
}

impl SyncPhase {
    /// Phases that talk to the server, where being offline is tolerated
    pub const fn allows_offline_fallback(self) -> bool {
        matches!(self, Self::Pushing | Self::Pulling)
    }
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::CheckingPending => "checking_pending",
            Self::Pushing => "pushing",
            Self::Pulling => "pulling",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
            Self::OfflineFallback => "offline_fallback",
        };
        f.write_str(name)
    }
}

/// Outcome of one [`SyncOrchestrator::sync`] call.
///
/// `success == false` always carries an `error_message`. A successful
/// result may still report conflicts, or an offline-mode note.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    pub success: bool,
    pub entities_pushed: usize,
    pub entities_pulled: usize,
    pub conflicts_detected: usize,
    pub error_message: Option<String>,
}

impl SyncResult {
    pub fn completed(push: PushSummary, pull: PullSummary) -> Self {
        Self {
            success: true,
            entities_pushed: push.pushed,
            entities_pulled: pull.pulled,
            conflicts_detected: push.conflicts,
            error_message: None,
        }
    }

    pub fn offline(reason: &str) -> Self {
        Self {
            success: true,
            error_message: Some(format!(
                "Offline mode: changes are kept locally until the server is reachable ({reason})"
            )),
            ..Self::default()
        }
    }

    pub fn cancelled() -> Self {
        Self::failed("Sync cancelled before it completed")
    }

    pub fn failed(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            success: false,
            error_message: Some(if message.trim().is_empty() {
                "Sync failed".to_string()
            } else {
                message
            }),
            ..Self::default()
        }
    }

    /// Whether the run degraded to local-only operation
    pub fn is_offline(&self) -> bool {
        self.success
            && self
                .error_message
                .as_deref()
                .is_some_and(|message| message.starts_with("Offline mode"))
    }
}

type UserLocks = Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>;

/// Sequences push and pull for a user against a local store and a server.
///
/// Syncs for the same user are serialized; different users run in parallel.
pub struct SyncOrchestrator<S, R> {
    store: S,
    remote: R,
    user_locks: UserLocks,
}

impl<S: LocalStore, R: RemoteSyncClient> SyncOrchestrator<S, R> {
    pub fn new(store: S, remote: R) -> Self {
        Self {
            store,
            remote,
            user_locks: Mutex::new(HashMap::new()),
        }
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    pub const fn remote(&self) -> &R {
        &self.remote
    }

    /// Whether `user_id` has local writes waiting to be pushed
    pub async fn has_pending_changes(&self, user_id: &str) -> Result<bool> {
        validate_user_id(user_id)?;
        Ok(!self.store.list_pending(user_id).await?.is_empty())
    }

    /// Push pending changes, then pull server changes, for `user_id`.
    ///
    /// Never returns an error; every failure is reported in the result.
    pub async fn sync(&self, user_id: &str, cancel: &CancellationSignal) -> SyncResult {
        if cancel.is_cancelled() {
            tracing::info!(user_id, "Sync cancelled before start");
            return SyncResult::cancelled();
        }

        let mut phase = SyncPhase::Idle;
        let (exit, result) = match self.run(user_id, cancel, &mut phase).await {
            Ok(result) => {
                tracing::info!(
                    user_id,
                    pushed = result.entities_pushed,
                    pulled = result.entities_pulled,
                    conflicts = result.conflicts_detected,
                    "Sync completed"
                );
                (SyncPhase::Completed, result)
            }
            Err(Error::NetworkUnavailable(reason)) if phase.allows_offline_fallback() => {
                tracing::warn!(user_id, %phase, %reason, "Server unreachable, staying in offline mode");
                (SyncPhase::OfflineFallback, SyncResult::offline(&reason))
            }
            Err(Error::Cancelled) => {
                tracing::info!(user_id, %phase, "Sync cancelled");
                (SyncPhase::Cancelled, SyncResult::cancelled())
            }
            Err(error) => {
                tracing::error!(user_id, %phase, %error, "Sync failed");
                (SyncPhase::Failed, SyncResult::failed(error.to_string()))
            }
        };
        if phase != exit {
            enter(&mut phase, exit, user_id);
        }
        result
    }

    async fn run(
        &self,
        user_id: &str,
        cancel: &CancellationSignal,
        phase: &mut SyncPhase,
    ) -> Result<SyncResult> {
        validate_user_id(user_id)?;

        let lease = self.user_lock(user_id);
        let _guard = cancel.guard(async { Ok(lease.lock.lock().await) }).await?;

        enter(phase, SyncPhase::CheckingPending, user_id);
        cancel.check()?;
        let has_pending = self.has_pending_changes(user_id).await?;

        enter(phase, SyncPhase::Pushing, user_id);
        let push = if has_pending {
            PushCoordinator::new(&self.store, &self.remote)
                .push(user_id, cancel)
                .await?
        } else {
            tracing::debug!(user_id, "No pending changes, skipping push");
            PushSummary::default()
        };

        enter(phase, SyncPhase::Pulling, user_id);
        cancel.check()?;
        let pull = PullCoordinator::new(&self.store, &self.remote)
            .pull(user_id, cancel)
            .await?;

        enter(phase, SyncPhase::Completed, user_id);
        Ok(SyncResult::completed(push, pull))
    }

    fn user_lock(&self, user_id: &str) -> UserLockLease<'_> {
        let mut locks = self
            .user_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let lock = Arc::clone(locks.entry(user_id.to_string()).or_default());
        UserLockLease {
            locks: &self.user_locks,
            user_id: user_id.to_string(),
            lock,
        }
    }

    /// Users with a sync running or waiting
    #[cfg(test)]
    pub fn tracked_users(&self) -> usize {
        self.user_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Handle on a user's sync lock; the map entry goes away with the last handle.
struct UserLockLease<'a> {
    locks: &'a UserLocks,
    user_id: String,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl Drop for UserLockLease<'_> {
    fn drop(&mut self) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // Clones are only handed out under the map lock, so this count is stable
        if Arc::strong_count(&self.lock) == 2 {
            locks.remove(&self.user_id);
        }
    }
}

impl<S, R> fmt::Debug for SyncOrchestrator<S, R> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SyncOrchestrator")
            .finish_non_exhaustive()
    }
}

fn enter(phase: &mut SyncPhase, next: SyncPhase, user_id: &str) {
    tracing::debug!(user_id, from = %phase, to = %next, "Sync phase");
    *phase = next;
}

fn validate_user_id(user_id: &str) -> Result<()> {
    if user_id.trim().is_empty() {
        return Err(Error::InvalidInput("user id cannot be empty".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offline_result_is_success_with_zero_counters() {
        let result = SyncResult::offline("connection refused");
        assert!(result.success);
        assert!(result.is_offline());
        assert_eq!(result.entities_pushed, 0);
        assert_eq!(result.entities_pulled, 0);
        assert_eq!(result.conflicts_detected, 0);
        assert!(result
            .error_message
            .as_deref()
            .is_some_and(|message| message.contains("connection refused")));
    }

    #[test]
    fn failed_result_always_has_message() {
        let result = SyncResult::failed("");
        assert!(!result.success);
        assert_eq!(result.error_message.as_deref(), Some("Sync failed"));
        assert!(SyncResult::cancelled()
            .error_message
            .is_some_and(|message| message.contains("cancelled")));
    }

    #[test]
    fn offline_fallback_only_while_talking_to_server() {
        assert!(SyncPhase::Pushing.allows_offline_fallback());
        assert!(SyncPhase::Pulling.allows_offline_fallback());
        assert!(!SyncPhase::CheckingPending.allows_offline_fallback());
        assert!(!SyncPhase::Idle.allows_offline_fallback());
    }

    #[test]
    fn sync_result_serializes_camel_case() {
        let json = serde_json::to_value(SyncResult::failed("boom")).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["entitiesPushed"], 0);
        assert_eq!(json["errorMessage"], "boom");
    }
}
