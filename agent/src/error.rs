//! Error types for the sync agent.

use std::time::Duration;

/// Errors raised by the agent and its collaborators.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    // Fetch and push-back errors
    #[error("network error: {0}")]
    Network(String),

    #[error("malformed server payload: {0}")]
    MalformedPayload(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    // Persistence errors
    #[error("storage error: {0}")]
    Storage(String),

    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),

    // Core errors
    #[error("engine error: {0}")]
    Engine(#[from] quotesync_engine::Error),

    #[error("sync agent has stopped")]
    AgentStopped,
}

impl SyncError {
    /// Whether this error means the server snapshot never arrived.
    ///
    /// These degrade to a `fetch-failed` outcome instead of surfacing.
    pub fn is_fetch_failure(&self) -> bool {
        matches!(
            self,
            SyncError::Network(_) | SyncError::MalformedPayload(_) | SyncError::Timeout(_)
        )
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            SyncError::MalformedPayload(err.to_string())
        } else {
            SyncError::Network(err.to_string())
        }
    }
}

/// Result type for agent operations.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Configuration errors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid {name} value: {value}")]
    InvalidValue { name: &'static str, value: String },

    #[error("Invalid QUOTESYNC_SERVER_URL: {0}")]
    InvalidServerUrl(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_failures_are_classified() {
        assert!(SyncError::Network("refused".into()).is_fetch_failure());
        assert!(SyncError::MalformedPayload("bad".into()).is_fetch_failure());
        assert!(SyncError::Timeout(Duration::from_secs(1)).is_fetch_failure());
        assert!(!SyncError::Storage("disk full".into()).is_fetch_failure());
        assert!(!SyncError::AgentStopped.is_fetch_failure());
    }

    #[test]
    fn engine_errors_convert() {
        let err: SyncError = quotesync_engine::Error::NoBackupAvailable.into();
        assert_eq!(
            err.to_string(),
            "engine error: no backup available to revert to"
        );
    }
}
