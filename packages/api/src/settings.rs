//! Layered service settings: built-in defaults, then an optional
//! `pinpoint.toml`, then `PINPOINT_*` environment variables
//! (`PINPOINT_SERVER__PORT=8080`, `PINPOINT_POLICY__CHECKIN__MAX_REWARD=20`).
//! `DATABASE_URL` is honoured when no database url is configured otherwise.

use std::time::Duration;

use config::{builder::DefaultState, Config, ConfigBuilder, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::policy::Policy;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Mark the session cookie `Secure`. Enable behind HTTPS.
    pub secure_cookies: bool,
    /// Sessions expire after this many days of inactivity.
    pub session_days: u64,
}

impl ServerSettings {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Session inactivity timeout. `None` when `session_days` overflows.
    pub fn session_ttl(&self) -> Option<Duration> {
        self.session_days
            .checked_mul(60 * 60 * 24)
            .map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// PostgreSQL url. `None` runs the service on the in-memory store.
    #[serde(default)]
    pub url: Option<String>,
    pub max_connections: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    #[serde(default)]
    pub policy: Policy,
}

impl Settings {
    /// Load from `pinpoint.toml` (if present) and the environment.
    pub fn new() -> Result<Self, ConfigError> {
        Self::load("pinpoint.toml")
    }

    pub fn load(path: &str) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = Self::defaults()?
            .add_source(File::with_name(path).format(FileFormat::Toml).required(false))
            .add_source(
                Environment::with_prefix("PINPOINT")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Self::finish(config)
    }

    /// Defaults overlaid with a TOML document; the environment is not read.
    pub fn from_toml(s: &str) -> Result<Self, ConfigError> {
        let config = Self::defaults()?
            .add_source(File::from_str(s, FileFormat::Toml))
            .build()?;
        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 5050)?
            .set_default("server.secure_cookies", false)?
            .set_default("server.session_days", 7)?
            .set_default("database.max_connections", 5)
    }

    fn finish(config: Config) -> Result<Self, ConfigError> {
        let mut settings: Settings = config.try_deserialize()?;
        if settings.database.url.is_none() {
            settings.database.url = std::env::var("DATABASE_URL").ok();
        }
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.session_ttl().is_none() {
            return Err(ConfigError::Message(format!(
                "server.session_days is too large: {}",
                self.server.session_days
            )));
        }
        self.policy.validate().map_err(ConfigError::Message)
    }
}
