//! JSON store providers
//!
//! - [`redis`] - RedisJSON over a managed connection (default)
//! - [`memory`] - in-process store

pub mod memory;
pub mod redis;

pub use memory::{MemoryConnector, MemoryJsonStore};
pub use self::redis::{RedisConnector, RedisJsonStore};

use crate::cache::store::CacheConnector;
use crate::config::CacheBackendKind;
use std::sync::Arc;

/// Connector for the configured backend
pub fn connector_for(backend: CacheBackendKind) -> Arc<dyn CacheConnector> {
    match backend {
        CacheBackendKind::Redis => Arc::new(RedisConnector),
        CacheBackendKind::Memory => Arc::new(MemoryConnector),
    }
}
