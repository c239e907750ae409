//! Sync client configuration.
//!
//! Values come from the host app or from `LIFTLOG_*` environment variables.

use std::time::Duration;

use crate::error::{Error, Result};

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const URL_SCHEMES: [&str; 2] = ["http://", "https://"];

/// Where and how the HTTP sync client talks to the server
#[derive(Clone, PartialEq, Eq)]
pub struct SyncClientConfig {
    /// Server root, without trailing slash (e.g. `https://api.liftlog.app`)
    pub base_url: String,
    /// Bearer token sent with every sync request
    pub access_token: Option<String>,
    pub request_timeout: Duration,
}

impl SyncClientConfig {
    /// Config for `base_url` with no token and the default timeout
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            base_url: normalize_base_url(base_url.into())?,
            access_token: None,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        })
    }

    #[must_use]
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = non_blank(Some(token.into()));
        self
    }

    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Read `LIFTLOG_API_BASE_URL`, `LIFTLOG_ACCESS_TOKEN` and
    /// `LIFTLOG_SYNC_TIMEOUT_SECS` from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = non_blank(lookup("LIFTLOG_API_BASE_URL"))
            .ok_or_else(|| Error::Config("LIFTLOG_API_BASE_URL is required".to_string()))?;
        let mut config = Self::new(base_url)?;

        if let Some(token) = non_blank(lookup("LIFTLOG_ACCESS_TOKEN")) {
            config.access_token = Some(token);
        }

        if let Some(raw) = non_blank(lookup("LIFTLOG_SYNC_TIMEOUT_SECS")) {
            let secs = raw.parse::<u64>().map_err(|_| {
                Error::Config(format!("LIFTLOG_SYNC_TIMEOUT_SECS must be a number, got '{raw}'"))
            })?;
            if secs == 0 {
                return Err(Error::Config(
                    "LIFTLOG_SYNC_TIMEOUT_SECS must be greater than zero".to_string(),
                ));
            }
            config.request_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    /// Full URL of a sync endpoint, e.g. `endpoint("push")`
    pub fn endpoint(&self, action: &str) -> String {
        format!("{}/api/sync/{action}", self.base_url)
    }
}

impl std::fmt::Debug for SyncClientConfig {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SyncClientConfig")
            .field("base_url", &self.base_url)
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

fn normalize_base_url(raw: String) -> Result<String> {
    let url = non_blank(Some(raw))
        .ok_or_else(|| Error::Config("sync base URL must not be empty".to_string()))?;
    if !URL_SCHEMES.iter().any(|scheme| url.starts_with(scheme)) {
        return Err(Error::Config(
            "sync base URL must include http:// or https://".to_string(),
        ));
    }
    Ok(url.trim_end_matches('/').to_string())
}

/// Trimmed value, or `None` when missing or blank
fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
