//! Configuration management for the agent.

use crate::error::ConfigError;
use crate::http::PayloadFormat;
use quotesync_engine::MergePolicy;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Agent configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Base URL of the quote server, without trailing slash
    pub server_url: String,
    /// Shape of the server's list endpoint
    pub payload: PayloadFormat,
    /// How many posts to request in `posts` mode
    pub posts_limit: usize,
    /// Time between periodic sync attempts
    pub sync_interval: Duration,
    /// Upper bound for a single fetch or push
    pub fetch_timeout: Duration,
    /// Where the book snapshot is stored
    pub store_path: PathBuf,
    /// Merge policy for server snapshots
    pub policy: MergePolicy,
    /// Send local-only quotes back to the server after a merge
    pub push_local_only: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:3000".to_string(),
            payload: PayloadFormat::Quotes,
            posts_limit: 5,
            sync_interval: Duration::from_secs(30),
            fetch_timeout: Duration::from_millis(10_000),
            store_path: PathBuf::from("quotes.json"),
            policy: MergePolicy::ServerWins,
            push_local_only: true,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|name| env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable lookup.
    pub fn from_vars<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let server_url = lookup("QUOTESYNC_SERVER_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or(defaults.server_url);
        if !(server_url.starts_with("http://") || server_url.starts_with("https://")) {
            return Err(ConfigError::InvalidServerUrl(server_url));
        }

        let payload = parse_var(&lookup, "QUOTESYNC_PAYLOAD", defaults.payload)?;
        let posts_limit = parse_var(&lookup, "QUOTESYNC_POSTS_LIMIT", defaults.posts_limit)?;

        let interval_secs: u64 = parse_var(&lookup, "QUOTESYNC_SYNC_INTERVAL_SECS", 30)?;
        if interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                name: "QUOTESYNC_SYNC_INTERVAL_SECS",
                value: "0".to_string(),
            });
        }

        let timeout_ms: u64 = parse_var(&lookup, "QUOTESYNC_FETCH_TIMEOUT_MS", 10_000)?;

        let store_path = lookup("QUOTESYNC_STORE_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.store_path);

        let policy = parse_var(&lookup, "QUOTESYNC_POLICY", defaults.policy)?;
        let push_local_only =
            parse_var(&lookup, "QUOTESYNC_PUSH_LOCAL_ONLY", defaults.push_local_only)?;

        Ok(Self {
            server_url,
            payload,
            posts_limit,
            sync_interval: Duration::from_secs(interval_secs),
            fetch_timeout: Duration::from_millis(timeout_ms),
            store_path,
            policy,
            push_local_only,
        })
    }
}

fn parse_var<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value }),
    }
}
