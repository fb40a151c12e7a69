//! Configuration Error Types
//!
//! Faults that are not recoverable at runtime: missing connection settings,
//! components requested before their store is open, and mutually exclusive
//! caller options. Each variant carries a stable machine-readable code.

use thiserror::Error;

/// Configuration-related errors with detailed context
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// A document-store factory was built with an empty connection string
    #[error("Missing connection string.")]
    MissingConnectionString,

    /// A collection was requested before the owning connection was opened
    #[error("Database connection required")]
    ConnectionRequired,

    /// A cache instance is enabled but has no host configured
    #[error("Missing redis host for cache '{name}'.")]
    MissingCacheHost { name: String },

    /// Both `expire` and `expire_at` were supplied for one key
    #[error("Please set the expire or expireAt parameter only.")]
    InvalidExpireParameter,

    /// A configuration value could not be interpreted
    #[error("Invalid value '{value}' for field '{field}': {context}")]
    InvalidValue {
        field: String,
        value: String,
        context: String,
    },

    /// The layered configuration sources could not be read or deserialized
    #[error("Failed to load configuration: {error}")]
    LoadError { error: String },

    /// A named store handle was requested but never initialized
    #[error("{kind} instance '{name}' is not registered")]
    InstanceNotRegistered { kind: &'static str, name: String },
}

impl ConfigurationError {
    /// Stable code for logs and error envelopes
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingConnectionString => "MISSING_CONNECTION_STRING",
            Self::ConnectionRequired => "DATABASE_CONNECTION_REQUIRED",
            Self::MissingCacheHost { .. } => "MISSING_CACHE_HOST",
            Self::InvalidExpireParameter => "INVALID_EXPIRE_PARAMETER",
            Self::InvalidValue { .. } => "INVALID_CONFIGURATION_VALUE",
            Self::LoadError { .. } => "CONFIGURATION_LOAD_FAILED",
            Self::InstanceNotRegistered { .. } => "INSTANCE_NOT_REGISTERED",
        }
    }

    /// Create an invalid value error
    pub fn invalid_value<F: Into<String>, V: Into<String>, C: Into<String>>(
        field: F,
        value: V,
        context: C,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.into(),
            context: context.into(),
        }
    }

    /// Create a load error
    pub fn load_error<E: std::fmt::Display>(error: E) -> Self {
        Self::LoadError {
            error: error.to_string(),
        }
    }

    pub fn missing_cache_host<N: Into<String>>(name: N) -> Self {
        Self::MissingCacheHost { name: name.into() }
    }
}

impl From<config::ConfigError> for ConfigurationError {
    fn from(error: config::ConfigError) -> Self {
        Self::load_error(error)
    }
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigurationError>;
