//! Configuration management for the session client.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Default identity service URL (can be overridden at compile time via
/// IAM_SESSION_DEFAULT_BASE_URL, or at runtime via IAM_SESSION_BASE_URL).
pub const DEFAULT_IDENTITY_BASE_URL: &str = match option_env!("IAM_SESSION_DEFAULT_BASE_URL") {
    Some(url) => url,
    None => "http://127.0.0.1:8000",
};

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Fixed access token lifetime, counted from issuance or refresh.
pub const DEFAULT_TOKEN_LIFETIME_MINUTES: u64 = 30;

const ENV_LOG_LEVEL: &str = "IAM_SESSION_LOG_LEVEL";
const ENV_BASE_URL: &str = "IAM_SESSION_BASE_URL";

/// Session client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// Identity service base URL (login, signup, refresh, profile).
    #[serde(default = "default_identity_base_url")]
    pub identity_base_url: String,
    /// Access token lifetime in minutes.
    #[serde(default = "default_token_lifetime_minutes")]
    pub token_lifetime_minutes: u64,
    /// Storage origin. Derived from the identity base URL when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
}

fn default_identity_base_url() -> String {
    DEFAULT_IDENTITY_BASE_URL.to_string()
}

fn default_token_lifetime_minutes() -> u64 {
    DEFAULT_TOKEN_LIFETIME_MINUTES
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            identity_base_url: DEFAULT_IDENTITY_BASE_URL.to_string(),
            token_lifetime_minutes: DEFAULT_TOKEN_LIFETIME_MINUTES,
            origin: None,
        }
    }
}

impl Config {
    /// Create a new Config with default values, then override from environment.
    pub fn new() -> Self {
        let mut config = Self::default();
        config.load_from_env();
        config
    }

    /// Load configuration from the config file, falling back to defaults.
    /// Environment variables win over the file.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        if !config_path.exists() {
            return Ok(Self::new());
        }

        let mut config = Self::load_from_file(&config_path)?;
        config.load_from_env();
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let config_path = paths.config_file();
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    fn load_from_env(&mut self) {
        if let Some(log_level) = env_override(ENV_LOG_LEVEL) {
            self.log_level = log_level;
        }
        if let Some(base_url) = env_override(ENV_BASE_URL) {
            self.identity_base_url = base_url;
        }
    }

    /// Get the identity service URL as a parsed URL.
    pub fn identity_base_url(&self) -> CoreResult<Url> {
        Url::parse(&self.identity_base_url).map_err(CoreError::from)
    }

    /// The storage origin tokens are scoped to (`scheme://host[:port]`).
    pub fn origin(&self) -> CoreResult<String> {
        if let Some(origin) = self.origin.as_deref().filter(|o| !o.trim().is_empty()) {
            return Ok(origin.trim().to_string());
        }

        let url = self.identity_base_url()?;
        let origin = url.origin();
        if !origin.is_tuple() {
            return Err(CoreError::Config(format!(
                "Cannot derive a storage origin from {}",
                self.identity_base_url
            )));
        }
        Ok(origin.ascii_serialization())
    }

    /// Access token lifetime.
    pub fn token_lifetime(&self) -> Duration {
        Duration::from_secs(self.token_lifetime_minutes.saturating_mul(60))
    }
}

fn env_override(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|value| !value.is_empty())
}
