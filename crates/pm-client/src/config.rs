//! Client configuration, from code or from `PUPPET_MASTER_*` environment variables.

use crate::TransientRetry;
use pm_types::ApiError;
use std::time::Duration;

/// Pause between two polls of a running job.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the API, e.g. `https://puppet.example.com/api/v1`.
    pub endpoint: String,
    pub api_token: String,
    /// Team slug; when set, paths are scoped under `/teams/<slug>`.
    pub team: Option<String>,
    /// Dump every request and response through `tracing` at debug level.
    pub debug: bool,
    pub poll_interval: Duration,
    pub transient_retry: TransientRetry,
    /// Per-request timeout for the underlying HTTP client.
    pub timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn new(endpoint: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_token: api_token.into(),
            team: None,
            debug: false,
            poll_interval: DEFAULT_POLL_INTERVAL,
            transient_retry: TransientRetry::default(),
            timeout: None,
        }
    }

    pub fn with_team(mut self, team: impl Into<String>) -> Self {
        self.team = Some(team.into());
        self
    }

    /// Reads `PUPPET_MASTER_ENDPOINT`, `PUPPET_MASTER_API_TOKEN`, `PUPPET_MASTER_TEAM`,
    /// `PUPPET_MASTER_DEBUG` and `PUPPET_MASTER_POLL_INTERVAL_MS`.
    pub fn from_env() -> Result<Self, ApiError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ApiError> {
        let endpoint = lookup("PUPPET_MASTER_ENDPOINT")
            .ok_or_else(|| ApiError::InvalidEndpoint("PUPPET_MASTER_ENDPOINT is not set".into()))?;
        let api_token = lookup("PUPPET_MASTER_API_TOKEN").ok_or(ApiError::EmptyCredential)?;
        let mut config = Self::new(endpoint, api_token);
        config.team = lookup("PUPPET_MASTER_TEAM").filter(|t| !t.trim().is_empty());
        config.debug = lookup("PUPPET_MASTER_DEBUG")
            .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        if let Some(raw) = lookup("PUPPET_MASTER_POLL_INTERVAL_MS") {
            let ms: u64 = raw.trim().parse().map_err(|_| {
                ApiError::InvalidConfig(format!(
                    "PUPPET_MASTER_POLL_INTERVAL_MS must be a whole number of milliseconds, got {:?}",
                    raw
                ))
            })?;
            config.poll_interval = Duration::from_millis(ms);
        }
        Ok(config)
    }
}
