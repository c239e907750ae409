//! HTTP client for the sync endpoints

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::SyncClientConfig;
use crate::error::{Error, Result};

use super::protocol::{
    PullOutcome, PullRequest, PullResponse, PushEntity, PushOutcome, PushRequest, PushResponse,
};
use super::remote::RemoteSyncClient;

/// Longest slice of a non-JSON error body kept in the message
const MAX_ERROR_BODY_CHARS: usize = 180;

/// [`RemoteSyncClient`] over `POST {base}/api/sync/push|pull`
#[derive(Clone)]
pub struct HttpSyncClient {
    config: SyncClientConfig,
    client: reqwest::Client,
}

impl HttpSyncClient {
    pub fn new(config: &SyncClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|error| Error::Config(format!("failed to build HTTP client: {error}")))?;
        Ok(Self {
            config: config.clone(),
            client,
        })
    }

    pub const fn config(&self) -> &SyncClientConfig {
        &self.config
    }

    async fn post_json<B, R>(&self, action: &str, body: &B) -> Result<R>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = self.config.endpoint(action);
        let mut request = self
            .client
            .post(&url)
            .header("Accept", "application/json")
            .json(body);
        if let Some(token) = &self.config.access_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(classify_transport_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(%url, status = status.as_u16(), "Sync request rejected");
            return Err(Error::Remote(parse_api_error(status, &body)));
        }

        response.json::<R>().await.map_err(|error| {
            if error.is_timeout() {
                classify_transport_error(error)
            } else {
                Error::Remote(format!("invalid {action} response: {error}"))
            }
        })
    }
}

impl RemoteSyncClient for HttpSyncClient {
    async fn push(&self, user_id: &str, entities: Vec<PushEntity>) -> Result<PushOutcome> {
        let count = entities.len();
        let request = PushRequest {
            user_id: user_id.to_string(),
            entities,
        };
        tracing::debug!(user_id, count, "Pushing entities");
        let response: PushResponse = self.post_json("push", &request).await?;
        response.try_into()
    }

    async fn pull(&self, user_id: &str, since: DateTime<Utc>) -> Result<PullOutcome> {
        let request = PullRequest {
            user_id: user_id.to_string(),
            since,
        };
        tracing::debug!(user_id, %since, "Pulling changes");
        let response: PullResponse = self.post_json("pull", &request).await?;
        response.try_into()
    }
}

impl std::fmt::Debug for HttpSyncClient {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("HttpSyncClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Unreachable server → offline; anything else reqwest reports → remote failure
fn classify_transport_error(error: reqwest::Error) -> Error {
    if error.is_connect() || error.is_timeout() {
        Error::NetworkUnavailable(error.to_string())
    } else {
        Error::Remote(error.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed: String = body.trim().chars().take(MAX_ERROR_BODY_CHARS).collect();
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}
