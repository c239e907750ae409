//! Error types for liftlog-core

use thiserror::Error;

/// Result type alias using liftlog-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in liftlog-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// `SQLite` error from the local store
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Entity not found
    #[error("Entity not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A payload could not be decoded as its declared entity type
    #[error("Invalid {entity_type} payload: {message}")]
    InvalidPayload {
        entity_type: String,
        message: String,
    },

    /// The sync server could not be reached (connection refused, DNS, timeout)
    #[error("Network unavailable: {0}")]
    NetworkUnavailable(String),

    /// The sync server answered, but not with a usable success response
    #[error("Remote sync error: {0}")]
    Remote(String),

    /// The caller withdrew the operation
    #[error("Sync cancelled")]
    Cancelled,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether this error means the device is offline rather than the sync having failed.
    pub const fn is_network_unavailable(&self) -> bool {
        matches!(self, Self::NetworkUnavailable(_))
    }
}
