//! Error types for the persistence layer.
//!
//! Three classes of failure exist. Configuration faults stop startup or reject a
//! caller bug. Document-store driver failures propagate to the caller
//! unmodified. Cache failures never leave the cache layer; see
//! [`crate::cache::CacheAside`].

use crate::cache::CacheError;
use crate::config::ConfigurationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// Driver-reported failure (timeout, constraint violation, connection loss)
    #[error("Database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Entity failed schema validation before reaching the store
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Timeout error: {0}")]
    Timeout(String),

    /// Failure reported by a non-MongoDB document driver
    #[error("Backend error: {0}")]
    Backend(String),
}

impl PersistenceError {
    /// Configuration faults are not recoverable at runtime
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    pub fn configuration(&self) -> Option<&ConfigurationError> {
        match self {
            Self::Configuration(e) => Some(e),
            _ => None,
        }
    }
}

impl From<bson::ser::Error> for PersistenceError {
    fn from(error: bson::ser::Error) -> Self {
        PersistenceError::Serialization(format!("BSON serialization error: {error}"))
    }
}

impl From<bson::de::Error> for PersistenceError {
    fn from(error: bson::de::Error) -> Self {
        PersistenceError::Serialization(format!("BSON deserialization error: {error}"))
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(error: serde_json::Error) -> Self {
        PersistenceError::Serialization(format!("JSON serialization error: {error}"))
    }
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_errors_are_identified() {
        let error: PersistenceError = ConfigurationError::ConnectionRequired.into();
        assert!(error.is_configuration());
        assert_eq!(
            error.configuration().map(ConfigurationError::code),
            Some("DATABASE_CONNECTION_REQUIRED")
        );
        assert_eq!(
            error.to_string(),
            "Configuration error: Database connection required"
        );
    }

    #[test]
    fn test_serde_json_errors_become_serialization_errors() {
        let parse_error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let error: PersistenceError = parse_error.into();
        assert!(matches!(error, PersistenceError::Serialization(_)));
        assert!(!error.is_configuration());
    }
}
