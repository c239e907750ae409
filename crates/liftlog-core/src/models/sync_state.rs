//! Per-entity sync stamp

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Where a local record stands relative to the server of record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyncState {
    /// Created locally, never pushed
    New,
    /// Pushed before, changed locally since
    Modified,
    /// Local copy matches the last known server copy
    Synced,
    /// Server rejected the push because its copy diverged
    Conflict,
}

impl SyncState {
    /// `New` and `Modified` both need a push.
    #[must_use]
    pub const fn is_pending(self) -> bool {
        matches!(self, Self::New | Self::Modified)
    }

    /// State after a local write to an entity currently in `self`.
    #[must_use]
    pub const fn after_local_write(self) -> Self {
        match self {
            Self::New => Self::New,
            Self::Modified | Self::Synced => Self::Modified,
            Self::Conflict => Self::Conflict,
        }
    }

    /// Stable name used in the database and on the wire
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "New",
            Self::Modified => "Modified",
            Self::Synced => "Synced",
            Self::Conflict => "Conflict",
        }
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "New" => Ok(Self::New),
            "Modified" => Ok(Self::Modified),
            "Synced" => Ok(Self::Synced),
            "Conflict" => Ok(Self::Conflict),
            other => Err(Error::InvalidInput(format!("unknown sync state '{other}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_covers_new_and_modified() {
        assert!(SyncState::New.is_pending());
        assert!(SyncState::Modified.is_pending());
        assert!(!SyncState::Synced.is_pending());
        assert!(!SyncState::Conflict.is_pending());
    }

    #[test]
    fn local_write_transitions() {
        assert_eq!(SyncState::New.after_local_write(), SyncState::New);
        assert_eq!(SyncState::Synced.after_local_write(), SyncState::Modified);
        assert_eq!(SyncState::Modified.after_local_write(), SyncState::Modified);
        assert_eq!(SyncState::Conflict.after_local_write(), SyncState::Conflict);
    }

    #[test]
    fn parse_matches_display() {
        for state in [
            SyncState::New,
            SyncState::Modified,
            SyncState::Synced,
            SyncState::Conflict,
        ] {
            assert_eq!(state.to_string().parse::<SyncState>().unwrap(), state);
        }
        assert!("Deleted".parse::<SyncState>().is_err());
    }

    #[test]
    fn wire_name_is_pascal_case() {
        assert_eq!(
            serde_json::to_string(&SyncState::Modified).unwrap(),
            "\"Modified\""
        );
    }
}
