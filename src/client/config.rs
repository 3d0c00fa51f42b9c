use crate::shared::config::{ConfigError, SyncConfig, SyncConfigBuilder};
use std::path::Path;

/// Client configuration: sync tunables plus the session JWT.
#[derive(Debug, Clone, Default)]
pub struct Config {
    sync: SyncConfig,
    token: Option<String>,
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builder(builder: SyncConfigBuilder) -> Result<Self, ConfigError> {
        Ok(Self {
            sync: builder.build()?,
            token: None,
        })
    }

    /// Defaults, then `path` if given, then `PLANNER_*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = SyncConfig::builder();
        if let Some(path) = path {
            builder = builder.toml_file(path)?;
        }
        let mut config = Self::with_builder(builder.env_overrides())?;
        config.token = std::env::var("PLANNER_TOKEN")
            .ok()
            .filter(|token| !token.trim().is_empty());
        Ok(config)
    }

    pub fn sync(&self) -> &SyncConfig {
        &self.sync
    }

    /// Set the JWT token
    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    /// Get the JWT token
    pub fn get_token(&self) -> Option<&String> {
        self.token.as_ref()
    }

    /// Clear the token (logout)
    pub fn clear_token(&mut self) {
        self.token = None;
    }

    /// Get the full URL for an API endpoint
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.server_url(), path)
    }

    pub fn server_url(&self) -> &str {
        &self.sync.api_url
    }

    /// `Cookie` header value carrying the JWT, if logged in
    pub fn cookie_header(&self) -> Option<String> {
        self.token
            .as_ref()
            .map(|token| format!("{}={}", self.sync.auth_cookie, token))
    }
}
