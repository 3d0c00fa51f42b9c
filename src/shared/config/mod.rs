//! Sync configuration module
//!
//! Tunables for the sync core: where the API lives, where the pending queue
//! is persisted, and the timing constants of drains, retries and cooldowns.
//!
//! # Configuration Sources
//!
//! Values are layered, later sources winning:
//!
//! 1. Built-in defaults
//! 2. An optional TOML file (durations in seconds)
//! 3. Environment variables `PLANNER_API_URL` and `PLANNER_QUEUE_PATH`
//!
//! ```toml
//! api_url = "https://api.planner.example"
//! drain_interval_secs = 30
//! max_attempts = 5
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default API base URL
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:3000";

const DEFAULT_DRAIN_INTERVAL: Duration = Duration::from_secs(30);
const DEFAULT_MAX_ATTEMPTS: u32 = 5;
const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(24 * 60 * 60);
const DEFAULT_DRAFT_COOLDOWN: Duration = Duration::from_secs(3);
const DEFAULT_MAX_DRAFT_COOLDOWN: Duration = Duration::from_secs(60);
const DEFAULT_DRAFT_DEBOUNCE: Duration = Duration::from_secs(2);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const DEFAULT_AUTH_COOKIE: &str = "token";

/// Sync core configuration
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    /// Base URL of the trip API
    pub api_url: String,
    /// File holding the persisted pending actions
    pub queue_path: PathBuf,
    /// Period of the background drain timer
    pub drain_interval: Duration,
    /// Failed attempts after which an action is abandoned
    pub max_attempts: u32,
    /// Actions older than this are dropped when the queue is loaded
    pub stale_after: Duration,
    /// Minimum gap between two direct draft saves for one trip
    pub draft_cooldown: Duration,
    /// Ceiling for the cooldown after repeated 409/429 answers
    pub max_draft_cooldown: Duration,
    /// Quiet period before an autosaved draft is sent
    pub draft_debounce: Duration,
    /// Per-request timeout of the HTTP client
    pub request_timeout: Duration,
    /// Name of the cookie carrying the JWT
    pub auth_cookie: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            queue_path: default_queue_path(),
            drain_interval: DEFAULT_DRAIN_INTERVAL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            stale_after: DEFAULT_STALE_AFTER,
            draft_cooldown: DEFAULT_DRAFT_COOLDOWN,
            max_draft_cooldown: DEFAULT_MAX_DRAFT_COOLDOWN,
            draft_debounce: DEFAULT_DRAFT_DEBOUNCE,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            auth_cookie: DEFAULT_AUTH_COOKIE.to_string(),
        }
    }
}

impl SyncConfig {
    /// Create a new SyncConfigBuilder
    pub fn builder() -> SyncConfigBuilder {
        SyncConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.api_url.trim();
        if url.is_empty() {
            return Err(ConfigError::MissingValue("api_url"));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::InvalidUrl(self.api_url.clone()));
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::invalid("max_attempts", "must be at least 1"));
        }
        if self.drain_interval.is_zero() {
            return Err(ConfigError::invalid("drain_interval", "must be positive"));
        }
        if self.max_draft_cooldown < self.draft_cooldown {
            return Err(ConfigError::invalid(
                "max_draft_cooldown",
                "must not be shorter than draft_cooldown",
            ));
        }
        if self.auth_cookie.trim().is_empty() {
            return Err(ConfigError::MissingValue("auth_cookie"));
        }
        Ok(())
    }
}

/// Platform data directory location of the queue file.
pub fn default_queue_path() -> PathBuf {
    let mut path = dirs::data_local_dir().unwrap_or_else(std::env::temp_dir);
    path.push("planner");
    path.push("pending_actions.json");
    path
}

/// On-disk shape of the TOML file
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    api_url: Option<String>,
    queue_path: Option<PathBuf>,
    drain_interval_secs: Option<u64>,
    max_attempts: Option<u32>,
    stale_after_secs: Option<u64>,
    draft_cooldown_secs: Option<u64>,
    max_draft_cooldown_secs: Option<u64>,
    draft_debounce_ms: Option<u64>,
    request_timeout_secs: Option<u64>,
    auth_cookie: Option<String>,
}

/// Builder for SyncConfig
#[derive(Debug, Default)]
pub struct SyncConfigBuilder {
    api_url: Option<String>,
    queue_path: Option<PathBuf>,
    drain_interval: Option<Duration>,
    max_attempts: Option<u32>,
    stale_after: Option<Duration>,
    draft_cooldown: Option<Duration>,
    max_draft_cooldown: Option<Duration>,
    draft_debounce: Option<Duration>,
    request_timeout: Option<Duration>,
    auth_cookie: Option<String>,
}

impl SyncConfigBuilder {
    /// Set the API base URL
    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = Some(url.into());
        self
    }

    /// Set the queue file location
    pub fn queue_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.queue_path = Some(path.into());
        self
    }

    pub fn drain_interval(mut self, interval: Duration) -> Self {
        self.drain_interval = Some(interval);
        self
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    pub fn stale_after(mut self, age: Duration) -> Self {
        self.stale_after = Some(age);
        self
    }

    pub fn draft_cooldown(mut self, cooldown: Duration) -> Self {
        self.draft_cooldown = Some(cooldown);
        self
    }

    pub fn max_draft_cooldown(mut self, cooldown: Duration) -> Self {
        self.max_draft_cooldown = Some(cooldown);
        self
    }

    pub fn draft_debounce(mut self, debounce: Duration) -> Self {
        self.draft_debounce = Some(debounce);
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn auth_cookie(mut self, name: impl Into<String>) -> Self {
        self.auth_cookie = Some(name.into());
        self
    }

    /// Layer values from a TOML document over the ones already set
    pub fn toml_str(mut self, contents: &str) -> Result<Self, ConfigError> {
        let file: FileConfig = toml::from_str(contents)?;
        let secs = Duration::from_secs;

        self.api_url = file.api_url.or(self.api_url);
        self.queue_path = file.queue_path.or(self.queue_path);
        self.drain_interval = file.drain_interval_secs.map(secs).or(self.drain_interval);
        self.max_attempts = file.max_attempts.or(self.max_attempts);
        self.stale_after = file.stale_after_secs.map(secs).or(self.stale_after);
        self.draft_cooldown = file.draft_cooldown_secs.map(secs).or(self.draft_cooldown);
        self.max_draft_cooldown = file
            .max_draft_cooldown_secs
            .map(secs)
            .or(self.max_draft_cooldown);
        self.draft_debounce = file
            .draft_debounce_ms
            .map(Duration::from_millis)
            .or(self.draft_debounce);
        self.request_timeout = file.request_timeout_secs.map(secs).or(self.request_timeout);
        self.auth_cookie = file.auth_cookie.or(self.auth_cookie);
        Ok(self)
    }

    /// Layer values from a TOML file
    pub fn toml_file(self, path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        self.toml_str(&contents)
    }

    /// Apply `PLANNER_API_URL` / `PLANNER_QUEUE_PATH` overrides
    pub fn env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("PLANNER_API_URL") {
            if !url.trim().is_empty() {
                self.api_url = Some(url);
            }
        }
        if let Ok(path) = std::env::var("PLANNER_QUEUE_PATH") {
            if !path.trim().is_empty() {
                self.queue_path = Some(PathBuf::from(path));
            }
        }
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<SyncConfig, ConfigError> {
        let defaults = SyncConfig::default();
        let config = SyncConfig {
            api_url: self
                .api_url
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_url),
            queue_path: self.queue_path.unwrap_or(defaults.queue_path),
            drain_interval: self.drain_interval.unwrap_or(defaults.drain_interval),
            max_attempts: self.max_attempts.unwrap_or(defaults.max_attempts),
            stale_after: self.stale_after.unwrap_or(defaults.stale_after),
            draft_cooldown: self.draft_cooldown.unwrap_or(defaults.draft_cooldown),
            max_draft_cooldown: self
                .max_draft_cooldown
                .unwrap_or(defaults.max_draft_cooldown),
            draft_debounce: self.draft_debounce.unwrap_or(defaults.draft_debounce),
            request_timeout: self.request_timeout.unwrap_or(defaults.request_timeout),
            auth_cookie: self.auth_cookie.unwrap_or(defaults.auth_cookie),
        };
        config.validate()?;
        Ok(config)
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("missing value: {0}")]
    MissingValue(&'static str),
    #[error("invalid value for {field}: {message}")]
    InvalidValue {
        field: &'static str,
        message: String,
    },
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

impl ConfigError {
    fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            message: message.into(),
        }
    }
}
