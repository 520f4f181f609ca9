//! Handles settings for the application.
//!
//! Values come from `settings.toml` (optional) and are overridden by
//! environment variables such as `DOMPET__SERVER__PORT=8080`.

use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use engine::SeedTemplates;
use serde::Deserialize;

const DEFAULT_SETTINGS_FILE: &str = "settings";

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct App {
    pub level: String,
}

impl Default for App {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Database {
    #[default]
    Memory,
    Sqlite(String),
}

impl Database {
    pub fn url(&self) -> String {
        match self {
            Database::Memory => String::from("sqlite::memory:"),
            Database::Sqlite(path) => format!("sqlite:{path}?mode=rwc"),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Server {
    pub bind: String,
    pub port: u16,
    pub database: Database,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 3000,
            database: Database::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Identity {
    /// Trusted header carrying the authenticated user id.
    pub header: String,
}

impl Default for Identity {
    fn default() -> Self {
        Self {
            header: "x-user-id".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RateLimit {
    pub max_requests: u32,
    pub interval_secs: u64,
    /// How often idle buckets are dropped.
    pub sweep_secs: u64,
    pub idle_secs: u64,
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            max_requests: 20,
            interval_secs: 60,
            sweep_secs: 600,
            idle_secs: 3600,
        }
    }
}

impl RateLimit {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn sweep_every(&self) -> Duration {
        Duration::from_secs(self.sweep_secs.max(1))
    }

    pub fn idle(&self) -> Duration {
        Duration::from_secs(self.idle_secs)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub app: App,
    pub server: Server,
    pub identity: Identity,
    pub rate_limit: RateLimit,
    pub templates: SeedTemplates,
}

impl Settings {
    /// Loads `path` (or `settings.toml` when it exists) and the `DOMPET__*`
    /// environment on top of it.
    pub fn new(path: Option<&str>) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(
                File::with_name(path.unwrap_or(DEFAULT_SETTINGS_FILE)).required(path.is_some()),
            )
            .add_source(
                Environment::with_prefix("DOMPET")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }
}
