//! Server-facing half of the sync engine

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::Result;

use super::protocol::{PullOutcome, PushEntity, PushOutcome};

/// Talks to the server of record.
///
/// Implementations must report an unreachable server as
/// [`Error::NetworkUnavailable`](crate::Error::NetworkUnavailable) and every
/// other failure as something else, so the orchestrator can tell offline
/// from broken.
#[allow(async_fn_in_trait)]
pub trait RemoteSyncClient {
    /// Submit a batch of pending entities
    async fn push(&self, user_id: &str, entities: Vec<PushEntity>) -> Result<PushOutcome>;

    /// Fetch everything changed on the server since `since`
    async fn pull(&self, user_id: &str, since: DateTime<Utc>) -> Result<PullOutcome>;
}

impl<T: RemoteSyncClient> RemoteSyncClient for Arc<T> {
    async fn push(&self, user_id: &str, entities: Vec<PushEntity>) -> Result<PushOutcome> {
        (**self).push(user_id, entities).await
    }

    async fn pull(&self, user_id: &str, since: DateTime<Utc>) -> Result<PullOutcome> {
        (**self).pull(user_id, since).await
    }
}
