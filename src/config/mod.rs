//! # Persistence Configuration
//!
//! Environment-derived settings for every document-store database and every
//! cache instance a service may open, plus the global query timeout.
//!
//! ## Sources
//!
//! Values are layered with the `config` crate, lowest precedence first:
//!
//! 1. Built-in defaults
//! 2. Optional TOML file at `PERSISTENCE_CONFIG_PATH`
//! 3. Environment variables (a `.env` file is read when present)
//!
//! ## Usage
//!
//! ```rust,no_run
//! use persistence_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let timeout = manager.config().database.default_timeout();
//! let app_db = &manager.config().database.app;
//! println!("{} / {:?}", app_db.database_name, timeout);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::constants;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct PersistenceConfig {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub environment: AppEnvironment,
}

/// Deployment environment of the running service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
pub enum AppEnvironment {
    #[default]
    #[serde(rename = "local")]
    Local,
    #[serde(rename = "dev")]
    Development,
    #[serde(rename = "staging")]
    Staging,
    #[serde(rename = "pre_release")]
    PreRelease,
    #[serde(rename = "production")]
    Production,
}

impl AppEnvironment {
    /// Parse the `APP_ENV` spelling; unknown values fall back to `Local`
    pub fn from_env_value(value: &str) -> Self {
        match value {
            "dev" => Self::Development,
            "staging" => Self::Staging,
            "pre_release" => Self::PreRelease,
            "production" => Self::Production,
            _ => Self::Local,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Development => "dev",
            Self::Staging => "staging",
            Self::PreRelease => "pre_release",
            Self::Production => "production",
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::PreRelease | Self::Production)
    }
}

impl fmt::Display for AppEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Document-store settings for every named database
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Server-side time limit applied to façade operations, in milliseconds
    pub default_timeout_ms: u64,
    pub app: DatabaseInstanceConfig,
    pub cms: DatabaseInstanceConfig,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: constants::query::DEFAULT_TIMEOUT_MS,
            app: DatabaseInstanceConfig::default(),
            cms: DatabaseInstanceConfig::default(),
        }
    }
}

impl DatabaseConfig {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseInstanceConfig {
    pub connection_string: String,
    pub database_name: String,
}

/// Cache settings for every named cache instance
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    pub global: CacheInstanceConfig,
    pub app: CacheInstanceConfig,
    pub cms: CacheInstanceConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            global: CacheInstanceConfig::named("default"),
            app: CacheInstanceConfig::named("app"),
            cms: CacheInstanceConfig::named("cms"),
        }
    }
}

/// Which store implementation backs a cache instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheBackendKind {
    /// RedisJSON over a managed, auto-reconnecting connection
    #[default]
    Redis,
    /// In-process store (single instance deployments, tests)
    Memory,
}

/// Connection settings of one cache instance
#[derive(Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheInstanceConfig {
    /// Instance name used in log lines
    pub name: String,
    pub enabled: bool,
    pub backend: CacheBackendKind,
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl CacheInstanceConfig {
    pub fn named<N: Into<String>>(name: N) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

impl Default for CacheInstanceConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            enabled: false,
            backend: CacheBackendKind::Redis,
            host: String::new(),
            port: constants::cache::DEFAULT_PORT,
            username: None,
            password: None,
        }
    }
}

impl fmt::Debug for CacheInstanceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheInstanceConfig")
            .field("name", &self.name)
            .field("enabled", &self.enabled)
            .field("backend", &self.backend)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}
