//! Client configuration module
//!
//! Configuration of a client session: where the server lives, how the
//! session identifies itself, and how the relay reconnects.

use std::time::Duration;
use thiserror::Error;

use crate::shared::messaging::{DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};

/// Header carrying a bare user id when the server runs without token auth
pub const USER_ID_HEADER: &str = "x-user-id";

/// How a client proves its identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// Bearer token issued by the identity service
    Token(String),
    /// Bare user id, accepted only by servers running without token auth
    UserId(i64),
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Server base URL, e.g. `http://localhost:3001`
    pub server_url: String,
    pub credential: Credential,
    /// Page size used when opening a chat
    pub page_limit: i64,
    /// First reconnect delay of the relay stream
    pub reconnect_initial: Duration,
    /// Reconnect delay cap
    pub reconnect_max: Duration,
}

impl AppConfig {
    /// Create a new AppConfigBuilder
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.server_url.starts_with("http://") || self.server_url.starts_with("https://")) {
            return Err(ConfigError::InvalidUrl(self.server_url.clone()));
        }
        if !(1..=MAX_PAGE_LIMIT).contains(&self.page_limit) {
            return Err(ConfigError::OutOfRange("page_limit"));
        }
        if self.reconnect_initial.is_zero() || self.reconnect_initial > self.reconnect_max {
            return Err(ConfigError::OutOfRange("reconnect_initial"));
        }
        if let Credential::Token(token) = &self.credential {
            if token.trim().is_empty() {
                return Err(ConfigError::MissingValue("token"));
            }
        }
        Ok(())
    }

    /// Join a path onto the server URL
    pub fn api_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.server_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Builder for AppConfig
#[derive(Debug, Default)]
pub struct AppConfigBuilder {
    server_url: Option<String>,
    credential: Option<Credential>,
    page_limit: Option<i64>,
    reconnect_initial: Option<Duration>,
    reconnect_max: Option<Duration>,
}

impl AppConfigBuilder {
    /// Set the server URL
    pub fn server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = Some(url.into());
        self
    }

    /// Authenticate with a bearer token
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.credential = Some(Credential::Token(token.into()));
        self
    }

    /// Authenticate with a bare user id
    pub fn user_id(mut self, user_id: i64) -> Self {
        self.credential = Some(Credential::UserId(user_id));
        self
    }

    pub fn page_limit(mut self, limit: i64) -> Self {
        self.page_limit = Some(limit);
        self
    }

    pub fn reconnect_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.reconnect_initial = Some(initial);
        self.reconnect_max = Some(max);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<AppConfig, ConfigError> {
        let config = AppConfig {
            server_url: self
                .server_url
                .ok_or(ConfigError::MissingValue("server_url"))?,
            credential: self
                .credential
                .ok_or(ConfigError::MissingValue("credential"))?,
            page_limit: self.page_limit.unwrap_or(DEFAULT_PAGE_LIMIT),
            reconnect_initial: self.reconnect_initial.unwrap_or(Duration::from_secs(1)),
            reconnect_max: self.reconnect_max.unwrap_or(Duration::from_secs(30)),
        };
        config.validate()?;
        Ok(config)
    }
}

/// Configuration errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("missing value: {0}")]
    MissingValue(&'static str),
    #[error("value out of range: {0}")]
    OutOfRange(&'static str),
}
