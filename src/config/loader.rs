//! Layered configuration loader
//!
//! Builds a [`PersistenceConfig`] from built-in defaults, an optional TOML file
//! and the process environment. The environment variable names are the ones
//! the services are deployed with; [`ConfigManager::from_sources`] takes an
//! explicit variable map so tests never mutate the process environment.

use super::error::{ConfigResult, ConfigurationError};
use super::{AppEnvironment, PersistenceConfig};
use crate::constants;
use config::{builder::DefaultState, Config, ConfigBuilder, File, FileFormat};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Points at an optional TOML file layered under the environment
pub const CONFIG_PATH_VAR: &str = "PERSISTENCE_CONFIG_PATH";

/// Environment prefixes of the named cache instances
const CACHE_INSTANCES: [(&str, &str); 3] = [("global", "REDIS"), ("app", "APP_REDIS"), ("cms", "CMS_REDIS")];

/// Environment prefixes of the named databases
const DATABASE_INSTANCES: [(&str, &str); 2] = [("app", "APP_DATABASE"), ("cms", "CMS_DATABASE")];

/// Loaded, validated configuration
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: PersistenceConfig,
    source_file: Option<PathBuf>,
}

impl ConfigManager {
    /// Load configuration from `.env`, `PERSISTENCE_CONFIG_PATH` and the environment
    pub fn load() -> ConfigResult<Self> {
        match dotenvy::dotenv() {
            Ok(path) => debug!(path = %path.display(), "Loaded .env file"),
            Err(e) if e.not_found() => {}
            Err(e) => warn!(error = %e, "Ignoring unreadable .env file"),
        }

        let env: HashMap<String, String> = std::env::vars().collect();
        let file = env
            .get(CONFIG_PATH_VAR)
            .filter(|path| !path.is_empty())
            .map(PathBuf::from);

        Self::from_sources(file.as_deref(), &env)
    }

    /// Build configuration from an optional file and an explicit variable map
    pub fn from_sources(file: Option<&Path>, env: &HashMap<String, String>) -> ConfigResult<Self> {
        let mut builder = Self::defaults()?;

        if let Some(path) = file {
            debug!(path = %path.display(), "Layering configuration file");
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }

        builder = Self::apply_environment(builder, env)?;

        let mut config: PersistenceConfig = builder.build()?.try_deserialize()?;

        if config.database.default_timeout_ms == 0 {
            config.database.default_timeout_ms = constants::query::DEFAULT_TIMEOUT_MS;
        }

        info!(
            environment = %config.app.environment,
            default_timeout_ms = config.database.default_timeout_ms,
            global_cache_enabled = config.cache.global.enabled,
            "Configuration loaded"
        );

        Ok(Self {
            config,
            source_file: file.map(Path::to_path_buf),
        })
    }

    /// Wrap an already built configuration
    pub fn from_config(config: PersistenceConfig) -> Self {
        Self {
            config,
            source_file: None,
        }
    }

    pub fn config(&self) -> &PersistenceConfig {
        &self.config
    }

    pub fn into_config(self) -> PersistenceConfig {
        self.config
    }

    pub fn environment(&self) -> AppEnvironment {
        self.config.app.environment
    }

    pub fn source_file(&self) -> Option<&Path> {
        self.source_file.as_deref()
    }

    fn defaults() -> ConfigResult<ConfigBuilder<DefaultState>> {
        let builder = Config::builder()
            .set_default("app.environment", AppEnvironment::Local.as_str())?
            .set_default(
                "database.default_timeout_ms",
                constants::query::DEFAULT_TIMEOUT_MS as i64,
            )?
            .set_default("cache.global.name", "default")?
            .set_default("cache.app.name", "app")?
            .set_default("cache.cms.name", "cms")?;
        Ok(builder)
    }

    fn apply_environment(
        mut builder: ConfigBuilder<DefaultState>,
        env: &HashMap<String, String>,
    ) -> ConfigResult<ConfigBuilder<DefaultState>> {
        let non_empty = |name: &str| env.get(name).map(String::as_str).filter(|v| !v.is_empty());

        if let Some(value) = non_empty("APP_ENV") {
            let environment = AppEnvironment::from_env_value(value);
            builder = builder.set_override("app.environment", environment.as_str())?;
        }

        if let Some(value) = non_empty("DATABASE_DEFAULT_TIMEOUT_MS") {
            match value.parse::<u64>() {
                Ok(ms) if ms > 0 => {
                    builder = builder.set_override("database.default_timeout_ms", ms as i64)?;
                }
                _ => warn!(
                    value = value,
                    fallback_ms = constants::query::DEFAULT_TIMEOUT_MS,
                    "Ignoring invalid DATABASE_DEFAULT_TIMEOUT_MS"
                ),
            }
        }

        for (instance, prefix) in DATABASE_INSTANCES {
            builder = builder
                .set_override_option(
                    format!("database.{instance}.connection_string"),
                    non_empty(&format!("{prefix}_CONNECTION_STRING")),
                )?
                .set_override_option(
                    format!("database.{instance}.database_name"),
                    non_empty(&format!("{prefix}_NAME")),
                )?;
        }

        for (instance, prefix) in CACHE_INSTANCES {
            let key = |field: &str| format!("cache.{instance}.{field}");

            if let Some(enabled) = env.get(&format!("{prefix}_ENABLED")) {
                // Only the exact string "true" enables a cache
                builder = builder.set_override(key("enabled"), enabled == "true")?;
            }

            let port_var = format!("{prefix}_PORT");
            if let Some(port) = non_empty(&port_var) {
                let port: u16 = port.parse().map_err(|_| {
                    ConfigurationError::invalid_value(&port_var, port, "expected a TCP port number")
                })?;
                builder = builder.set_override(key("port"), port as i64)?;
            }

            builder = builder
                .set_override_option(key("host"), non_empty(&format!("{prefix}_HOST")))?
                .set_override_option(key("username"), non_empty(&format!("{prefix}_USERNAME")))?
                .set_override_option(key("password"), non_empty(&format!("{prefix}_PASSWORD")))?
                .set_override_option(key("backend"), non_empty(&format!("{prefix}_BACKEND")))?;
        }

        Ok(builder)
    }
}
