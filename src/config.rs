//! Application configuration management.
//!
//! This module handles loading configuration from environment variables.
//! It uses the `envy` crate to automatically deserialize environment variables into a type-safe struct.
//! The resulting value is built once in `main` and handed to every component that needs it.

use std::{fmt, time::Duration};

use serde::Deserialize;

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `DATABASE_URL` (required): PostgreSQL connection string
/// - `MASTER_API_KEY` (required): master admin credential, also used to bootstrap the first key
/// - `RATE_LIMIT_PER_MIN` (optional): default quota for newly created keys, defaults to 30
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 3000
/// - `STORAGE_TIMEOUT_MS` (optional): deadline for a single storage round trip, defaults to 5000
/// - `DB_MAX_CONNECTIONS` (optional): pool size, defaults to 5
/// - `PRUNE_INTERVAL_SECS` (optional): period of the rate-log sweep, defaults to 60
#[derive(Clone, Deserialize)]
pub struct Config {
    pub database_url: String,

    pub master_api_key: String,

    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_min: i32,

    #[serde(default = "default_port")]
    pub server_port: u16,

    #[serde(default = "default_storage_timeout_ms")]
    pub storage_timeout_ms: u64,

    #[serde(default = "default_max_connections")]
    pub db_max_connections: u32,

    #[serde(default = "default_prune_interval_secs")]
    pub prune_interval_secs: u64,
}

fn default_rate_limit() -> i32 {
    30
}

/// Default port if SERVER_PORT environment variable is not set.
fn default_port() -> u16 {
    3000
}

fn default_storage_timeout_ms() -> u64 {
    5_000
}

fn default_max_connections() -> u32 {
    5
}

fn default_prune_interval_secs() -> u64 {
    60
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This method first attempts to load a `.env` file (which is optional),
    /// then reads environment variables and deserializes them into a Config struct.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing (e.g., DATABASE_URL, MASTER_API_KEY)
    /// - Environment variable values cannot be parsed into expected types
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();

        // Field names are automatically converted: master_api_key -> MASTER_API_KEY
        envy::from_env::<Config>()
    }

    /// Build a configuration directly, with defaults for everything but the
    /// connection target and the master credential.
    pub fn new(database_url: impl Into<String>, master_api_key: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            master_api_key: master_api_key.into(),
            rate_limit_per_min: default_rate_limit(),
            server_port: default_port(),
            storage_timeout_ms: default_storage_timeout_ms(),
            db_max_connections: default_max_connections(),
            prune_interval_secs: default_prune_interval_secs(),
        }
    }

    pub fn storage_timeout(&self) -> Duration {
        Duration::from_millis(self.storage_timeout_ms)
    }

    pub fn prune_interval(&self) -> Duration {
        Duration::from_secs(self.prune_interval_secs)
    }

    /// Storage target suitable for logs: `host:port/database`, no credentials.
    pub fn storage_target(&self) -> String {
        match url::Url::parse(&self.database_url) {
            Ok(url) => format!(
                "{}:{}{}",
                url.host_str().unwrap_or("localhost"),
                url.port().unwrap_or(5432),
                url.path()
            ),
            Err(_) => "<unparseable DATABASE_URL>".to_string(),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("storage_target", &self.storage_target())
            .field("master_api_key", &"<redacted>")
            .field("rate_limit_per_min", &self.rate_limit_per_min)
            .field("server_port", &self.server_port)
            .field("storage_timeout_ms", &self.storage_timeout_ms)
            .field("db_max_connections", &self.db_max_connections)
            .field("prune_interval_secs", &self.prune_interval_secs)
            .finish()
    }
}
