#![allow(clippy::doc_markdown)] // Allow technical terms like MongoDB, RedisJSON in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Persistence Core
//!
//! Shared persistence layer for services backed by a MongoDB-compatible
//! document store and RedisJSON caches.
//!
//! ## Overview
//!
//! Four pieces, each usable on its own:
//!
//! - **Connection factory**: [`database::DatabaseFactory`] opens one shared
//!   connection per connection string with connection-level defaults applied
//! - **Collection façade**: [`database::Collection`] wraps a typed collection
//!   with the default query policy (secondary-preferred reads, lean results,
//!   a server-side time limit) and boolean write outcomes
//! - **Cache client factory**: [`cache::CacheClient`] builds a JSON cache
//!   client from configuration; a disabled instance yields an inert client
//! - **Cache-aside orchestrator**: [`cache::CacheAside`] provides
//!   `json_set` / `json_get` / `set_key_expiry` that degrade to pass-through
//!   whenever the cache is unavailable
//!
//! [`registry::PersistenceRegistry`] opens the configured instances at
//! startup and closes them on shutdown.
//!
//! ## Module Organization
//!
//! - [`config`] - Layered configuration and configuration errors
//! - [`database`] - Connection factory, collection façade, driver seam
//! - [`cache`] - Cache clients, store backends, cache-aside operations
//! - [`models`] - Entities and the collection sets of each database
//! - [`registry`] - Startup and shutdown of the named handles
//! - [`error`] - Crate-wide error type
//! - [`logging`] - Tracing setup and structured log helpers
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use persistence_core::config::ConfigManager;
//! use persistence_core::registry::{CacheId, PersistenceRegistry, RegistryOptions};
//! use bson::doc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! persistence_core::logging::init_tracing();
//! let manager = ConfigManager::load()?;
//! let registry = PersistenceRegistry::initialize(manager.config(), RegistryOptions::default()).await?;
//!
//! let users = registry.app_collections()?.users;
//! let cache = registry.cache_aside(CacheId::App)?;
//! let active: u64 = cache
//!     .json_get(
//!         "users:active",
//!         || users.count(doc! { "active": true }, Default::default()),
//!         Default::default(),
//!     )
//!     .await?;
//! println!("{active}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test                          # Unit and integration tests, in-process backends
//! cargo test --features test-services # Also run against live MongoDB / Redis Stack
//! ```

pub mod cache;
pub mod config;
pub mod constants;
pub mod database;
pub mod error;
pub mod logging;
pub mod models;
pub mod registry;

pub use cache::{CacheAside, CacheClient, CacheError, JsonGetOptions, JsonSetOptions, KeyExpiry};
pub use config::{ConfigManager, ConfigurationError, PersistenceConfig};
pub use database::{Collection, ConnectOptions, DatabaseFactory, Entity, FindOptions};
pub use error::{PersistenceError, PersistenceResult};
pub use registry::{CacheId, DatabaseId, PersistenceRegistry, RegistryOptions, ShutdownReport};
