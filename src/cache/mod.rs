//! # JSON Cache
//!
//! Cache clients for JSON-capable key-value stores and the cache-aside
//! operations request handlers call.
//!
//! ## Architecture
//!
//! ```text
//! CacheAside ──> CacheClient ──> Arc<dyn JsonStore>
//!                    │              ├── RedisJsonStore  (RedisJSON, ConnectionManager)
//!                    │              └── MemoryJsonStore (in-process, DashMap)
//!                    └── CacheEvents (ready / reconnecting / end / error)
//! ```
//!
//! A disabled cache instance produces a client that never connects; every
//! cache-aside call then behaves as a cache bypass.

pub mod aside;
pub mod client;
pub mod coerce;
pub mod errors;
pub mod events;
pub mod providers;
pub mod store;

pub use aside::{CacheAside, Expiry, JsonGetOptions, JsonSetOptions, KeyExpiry};
pub use client::CacheClient;
pub use errors::{CacheError, CacheResult};
pub use events::{CacheEvent, CacheEventListener, CacheEvents};
pub use providers::{connector_for, MemoryConnector, MemoryJsonStore, RedisConnector, RedisJsonStore};
pub use store::{CacheConnector, JsonPath, JsonStore, SetCondition};
