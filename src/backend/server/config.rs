/**
 * Server Configuration
 *
 * This module handles loading and validation of server configuration and
 * the optional PostgreSQL database connection.
 *
 * # Configuration Sources
 *
 * Later sources override earlier ones:
 *
 * 1. Built-in defaults (port 3001, 5 s store timeout, 5 s typing timeout)
 * 2. A TOML file named by `SPACE_POINT_CONFIG`, if set
 * 3. Environment variables: `DATABASE_URL`, `SERVER_PORT`, `BIND_ADDR`,
 *    `JWT_SECRET`, `STORE_TIMEOUT_MS`, `TYPING_TIMEOUT_MS`,
 *    `DATABASE_MAX_CONNECTIONS`, `CORS_ORIGINS` (comma separated)
 *
 * # Error Handling
 *
 * A malformed value is a startup error. An unreachable database is not:
 * the server logs it and runs on the in-memory store instead.
 *
 * # Example
 *
 * ```toml
 * port = 3001
 * database_url = "postgres://localhost/space_point"
 * store_timeout_ms = 2000
 * cors_origins = ["http://localhost:5173"]
 * ```
 */

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use sqlx::{postgres::PgPoolOptions, PgPool};
use thiserror::Error;

/// Environment variable naming the TOML config file
pub const CONFIG_PATH_ENV: &str = "SPACE_POINT_CONFIG";

/// Database configuration result
///
/// Contains the database connection pool if successfully configured,
/// or `None` if the database is not available.
pub type DatabaseConfig = Option<PgPool>;

/// Server settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub port: u16,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    /// Token mode when set, trusted mode otherwise
    pub jwt_secret: Option<String>,
    pub store_timeout_ms: u64,
    pub typing_timeout_ms: u64,
    /// Empty means any origin
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_string(),
            port: 3001,
            database_url: None,
            database_max_connections: 10,
            jwt_secret: None,
            store_timeout_ms: 5_000,
            typing_timeout_ms: 5_000,
            cors_origins: Vec::new(),
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ServerConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

fn parse_var<T: std::str::FromStr>(key: &'static str, value: String) -> Result<T, ServerConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ServerConfigError::InvalidValue { key, value })
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

impl ServerConfig {
    /// Load defaults, the optional config file, then the process environment
    pub fn load() -> Result<Self, ServerConfigError> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::from_file(Path::new(path.trim()))?,
            _ => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML config file; missing keys keep their defaults
    pub fn from_file(path: &Path) -> Result<Self, ServerConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ServerConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&raw)?)
    }

    /// Apply overrides from a variable lookup
    pub fn apply_overrides<F>(&mut self, var: F) -> Result<(), ServerConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = var("DATABASE_URL").and_then(non_empty) {
            self.database_url = Some(url);
        }
        if let Some(port) = var("SERVER_PORT") {
            self.port = parse_var("SERVER_PORT", port)?;
        }
        if let Some(addr) = var("BIND_ADDR").and_then(non_empty) {
            self.bind_addr = addr;
        }
        if let Some(secret) = var("JWT_SECRET").and_then(non_empty) {
            self.jwt_secret = Some(secret);
        }
        if let Some(ms) = var("STORE_TIMEOUT_MS") {
            self.store_timeout_ms = parse_var("STORE_TIMEOUT_MS", ms)?;
        }
        if let Some(ms) = var("TYPING_TIMEOUT_MS") {
            self.typing_timeout_ms = parse_var("TYPING_TIMEOUT_MS", ms)?;
        }
        if let Some(n) = var("DATABASE_MAX_CONNECTIONS") {
            self.database_max_connections = parse_var("DATABASE_MAX_CONNECTIONS", n)?;
        }
        if let Some(origins) = var("CORS_ORIGINS") {
            self.cors_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(String::from)
                .collect();
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ServerConfigError> {
        if self.store_timeout_ms == 0 {
            return Err(ServerConfigError::InvalidValue {
                key: "store_timeout_ms",
                value: "0".to_string(),
            });
        }
        if self.typing_timeout_ms == 0 {
            return Err(ServerConfigError::InvalidValue {
                key: "typing_timeout_ms",
                value: "0".to_string(),
            });
        }
        if self.database_max_connections == 0 {
            return Err(ServerConfigError::InvalidValue {
                key: "database_max_connections",
                value: "0".to_string(),
            });
        }
        self.socket_addr().map(|_| ())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ServerConfigError> {
        let raw = format!("{}:{}", self.bind_addr, self.port);
        raw.parse()
            .map_err(|_| ServerConfigError::InvalidValue { key: "bind_addr", value: raw })
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn typing_timeout(&self) -> Duration {
        Duration::from_millis(self.typing_timeout_ms)
    }
}

/// Load and initialize database connection pool
///
/// This function:
/// 1. Takes the database URL from the configuration
/// 2. Creates a PostgreSQL connection pool
/// 3. Runs database migrations
///
/// # Returns
///
/// - `Some(PgPool)` if database is successfully configured
/// - `None` if no URL is configured or connection fails
pub async fn load_database(config: &ServerConfig) -> DatabaseConfig {
    let database_url = match &config.database_url {
        Some(url) => url,
        None => {
            tracing::warn!("DATABASE_URL not set. Using the in-memory store.");
            return None;
        }
    };

    tracing::info!("Connecting to database...");

    let pool = match PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .acquire_timeout(config.store_timeout())
        .connect(database_url)
        .await
    {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("Failed to create database connection pool: {:?}", e);
            tracing::warn!("Database features will be disabled. Using the in-memory store.");
            return None;
        }
    };

    tracing::info!("Database connection pool created successfully");

    tracing::info!("Running database migrations...");
    match sqlx::migrate!().run(&pool).await {
        Ok(_) => {
            tracing::info!("Database migrations completed successfully");
        }
        Err(e) => {
            tracing::error!("Failed to run database migrations: {}", e);
            // The schema may already be in place
            tracing::warn!("Continuing without migrations - database might not be up to date");
        }
    }

    Some(pool)
}
