//! Cache error types
//!
//! These never reach callers of the cache-aside API; they are logged and
//! turned into a fallback there.

use thiserror::Error;

/// Errors that can occur during cache operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    /// Failed to connect to, or lost the connection to, the cache backend
    #[error("Cache connection error: {0}")]
    ConnectionError(String),

    /// Failed to serialize or deserialize a cached value
    #[error("Cache serialization error: {0}")]
    SerializationError(String),

    /// A JSON path could not be parsed or does not address a container
    #[error("Invalid JSON path '{0}'")]
    InvalidPath(String),

    /// Generic backend error
    #[error("Cache backend error: {0}")]
    BackendError(String),
}

impl CacheError {
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::ConnectionError(_))
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(error: serde_json::Error) -> Self {
        Self::SerializationError(error.to_string())
    }
}

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;
