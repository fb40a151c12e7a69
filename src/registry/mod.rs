//! # Persistence Registry
//!
//! Process-wide store handles, opened once at startup and injected into
//! dependents.
//!
//! ## Architecture
//!
//! ```text
//! PersistenceRegistry
//! ├── databases   app, cms            (DatabaseFactory, open connections)
//! └── caches      global, app, cms    (CacheClient, connected when enabled)
//! ```
//!
//! `shutdown` closes every handle concurrently within a grace period and
//! reports what closed, what failed and whether the grace period ran out.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use persistence_core::config::ConfigManager;
//! use persistence_core::registry::{CacheId, PersistenceRegistry, RegistryOptions};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigManager::load()?.into_config();
//! let registry = PersistenceRegistry::initialize(&config, RegistryOptions::default()).await?;
//!
//! let users = registry.app_collections()?.users;
//! let cache = registry.cache_aside(CacheId::Global)?;
//!
//! let report = registry.shutdown(Duration::from_secs(10)).await;
//! assert!(report.is_clean());
//! # Ok(())
//! # }
//! ```

pub mod persistence_registry;
pub mod shutdown;

// Re-export main types for easy access
pub use persistence_registry::{CacheId, DatabaseId, PersistenceRegistry, RegistryOptions};
pub use shutdown::ShutdownReport;
