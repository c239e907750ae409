//! JSON messages exchanged with the sync endpoints.
//!
//! Field names are camelCase on the wire.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{EntityId, SyncEntity, SyncState};

/// Body of `POST /api/sync/push`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushRequest {
    pub user_id: String,
    pub entities: Vec<PushEntity>,
}

/// One locally pending entity as submitted to the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushEntity {
    pub id: EntityId,
    pub entity_type: String,
    pub payload: serde_json::Value,
    pub client_state: SyncState,
}

impl From<&SyncEntity> for PushEntity {
    fn from(entity: &SyncEntity) -> Self {
        Self {
            id: entity.id,
            entity_type: entity.entity_type.clone(),
            payload: entity.payload.clone(),
            client_state: entity.sync_state,
        }
    }
}

/// Response of `POST /api/sync/push`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushResponse {
    pub success: bool,
    #[serde(default)]
    pub entities_processed: usize,
    #[serde(default)]
    pub conflicts_detected: usize,
    #[serde(default)]
    pub conflicts: Vec<PushConflict>,
    /// Ids the server stored, when it reports them individually
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted_ids: Option<Vec<EntityId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// A pushed entity the server refused because its own copy diverged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushConflict {
    pub entity_id: EntityId,
    pub entity_type: String,
    #[serde(default)]
    pub resolution: ResolutionDirective,
}

/// Server hint on how a conflict should be settled.
///
/// Recorded with the conflict; never applied automatically. Unrecognized
/// values are kept verbatim in [`ResolutionDirective::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ResolutionDirective {
    ServerWins,
    ClientWins,
    #[default]
    Manual,
    Other(String),
}

impl ResolutionDirective {
    pub fn as_str(&self) -> &str {
        match self {
            Self::ServerWins => "ServerWins",
            Self::ClientWins => "ClientWins",
            Self::Manual => "Manual",
            Self::Other(raw) => raw,
        }
    }
}

impl From<String> for ResolutionDirective {
    fn from(raw: String) -> Self {
        let key: String = raw
            .trim()
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "serverwins" => Self::ServerWins,
            "clientwins" => Self::ClientWins,
            "manual" => Self::Manual,
            _ => Self::Other(raw),
        }
    }
}

impl From<ResolutionDirective> for String {
    fn from(directive: ResolutionDirective) -> Self {
        match directive {
            ResolutionDirective::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for ResolutionDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of `POST /api/sync/pull`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequest {
    pub user_id: String,
    pub since: DateTime<Utc>,
}

/// Response of `POST /api/sync/pull`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullResponse {
    pub success: bool,
    #[serde(default)]
    pub entities: Vec<RemoteEntity>,
    pub server_timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Server copy of an entity changed since the requested checkpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteEntity {
    pub id: EntityId,
    pub entity_type: String,
    pub payload: serde_json::Value,
    /// Informational; local copies are always stamped `Synced` on apply
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_state: Option<String>,
}

/// What the server did with a push batch
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PushOutcome {
    pub accepted: usize,
    pub conflicts: Vec<PushConflict>,
    pub accepted_ids: Option<Vec<EntityId>>,
}

impl TryFrom<PushResponse> for PushOutcome {
    type Error = Error;

    fn try_from(response: PushResponse) -> Result<Self> {
        if !response.success {
            return Err(Error::Remote(
                response
                    .message
                    .unwrap_or_else(|| "server reported push failure".to_string()),
            ));
        }
        if response.conflicts_detected != response.conflicts.len() {
            tracing::warn!(
                reported = response.conflicts_detected,
                listed = response.conflicts.len(),
                "Push response conflict count disagrees with conflict list"
            );
        }
        Ok(Self {
            accepted: response.entities_processed,
            conflicts: response.conflicts,
            accepted_ids: response.accepted_ids,
        })
    }
}

/// Server changes since a checkpoint
#[derive(Debug, Clone, PartialEq)]
pub struct PullOutcome {
    pub entities: Vec<RemoteEntity>,
    pub server_timestamp: DateTime<Utc>,
}

impl TryFrom<PullResponse> for PullOutcome {
    type Error = Error;

    fn try_from(response: PullResponse) -> Result<Self> {
        if !response.success {
            return Err(Error::Remote(
                response
                    .message
                    .unwrap_or_else(|| "server reported pull failure".to_string()),
            ));
        }
        Ok(Self {
            entities: response.entities,
            server_timestamp: response.server_timestamp,
        })
    }
}
