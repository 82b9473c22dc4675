//! Client Configuration
//!
//! One read-only configuration value shared by the link index client and
//! the repository client. Built once (defaults, environment, or a JSON
//! file) and handed around behind an `Arc`.

use std::path::Path;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::error::ConfigError;

pub const DEFAULT_INSTANCE_URL: &str = "https://constellation.microcosm.blue/";
pub const DEFAULT_REPO_SERVICE_URL: &str = "https://public.api.bsky.app/";
pub const DEFAULT_USER_AGENT: &str = concat!("rust_constellation/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LinkIndexConfig {
    /// When false, link index requests fail with `LinkIndexError::Disabled`.
    pub enabled: bool,
    /// Base url of the link index instance.
    pub instance_url: String,
    /// XRPC service used for handle resolution, profiles and records.
    pub repo_service_url: String,
    pub user_agent: String,
    pub timeout_secs: u64,
    /// Initial delay before retrying a record fetch. Zero disables backoff.
    pub retry_backoff_ms: u64,
}

impl Default for LinkIndexConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            instance_url: DEFAULT_INSTANCE_URL.to_string(),
            repo_service_url: DEFAULT_REPO_SERVICE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_secs: 30,
            retry_backoff_ms: 250,
        }
    }
}

impl LinkIndexConfig {
    /// Defaults overridden by process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each known key.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup("LINK_INDEX_ENABLED") {
            config.enabled = parse_bool("LINK_INDEX_ENABLED", &value)?;
        }
        if let Some(value) = lookup("LINK_INDEX_URL") {
            config.instance_url = value;
        }
        if let Some(value) = lookup("REPO_SERVICE_URL") {
            config.repo_service_url = value;
        }
        if let Some(value) = lookup("LINK_INDEX_USER_AGENT") {
            config.user_agent = value;
        }
        if let Some(value) = lookup("LINK_INDEX_TIMEOUT_SECS") {
            config.timeout_secs = value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "LINK_INDEX_TIMEOUT_SECS",
                value: value.clone(),
            })?;
        }
        if let Some(value) = lookup("RECORD_RETRY_BACKOFF_MS") {
            config.retry_backoff_ms = value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "RECORD_RETRY_BACKOFF_MS",
                value: value.clone(),
            })?;
        }

        Ok(config)
    }

    /// Load from a JSON file. Missing keys fall back to defaults.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&content)?)
    }

    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).await?;
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// HTTP client carrying the fixed `Accept` and `User-Agent` headers.
    pub fn http_client(&self) -> Result<Client, ConfigError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .user_agent(self.user_agent.clone())
            .default_headers(headers)
            .timeout(self.timeout())
            .build()?;
        Ok(client)
    }
}

/// Parse a base url so that `join` appends routes instead of replacing the
/// last path segment.
pub(crate) fn parse_base(raw: &str) -> Result<Url, ConfigError> {
    let mut normalized = raw.trim().to_string();
    if !normalized.ends_with('/') {
        normalized.push('/');
    }
    Url::parse(&normalized).map_err(|_| ConfigError::InvalidValue {
        key: "url",
        value: raw.to_string(),
    })
}

/// Resolve `path` against a base from [`parse_base`].
pub(crate) fn endpoint(base: &Url, path: &str) -> Result<Url, ConfigError> {
    base.join(path).map_err(|_| ConfigError::InvalidValue {
        key: "url",
        value: format!("{}{}", base, path),
    })
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: value.to_string(),
        }),
    }
}
