//! # Cache-Aside Orchestrator
//!
//! `json_set` / `json_get` / `set_key_expiry` over a [`CacheClient`]. Callers
//! use them without knowing whether caching is enabled:
//!
//! - No cache (disabled or not connected): writes return `false`, reads
//!   return the fallback's value
//! - Cache failures are logged and absorbed the same way
//! - Supplying both `expire` and `expire_at` is a caller bug and fails with
//!   [`ConfigurationError::InvalidExpireParameter`]
//! - A read hit re-applies the requested TTL, so reads extend freshness
//! - Concurrent misses on one key each run the fallback; there is no
//!   in-flight de-duplication
//!
//! Every value passes through [`coerce`](super::coerce) so the type a read
//! decodes into matches what was stored.
//!
//! ```rust,no_run
//! use persistence_core::cache::{CacheAside, CacheClient, JsonGetOptions};
//! use persistence_core::config::CacheInstanceConfig;
//! use persistence_core::PersistenceError;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), PersistenceError> {
//! let client = Arc::new(CacheClient::new(CacheInstanceConfig::named("app"))?);
//! let cache = CacheAside::new(client);
//!
//! let total: u64 = cache
//!     .json_get(
//!         "stats:total",
//!         || async { Ok::<_, PersistenceError>(42u64) },
//!         JsonGetOptions::new().expire(Duration::from_secs(60)),
//!     )
//!     .await?;
//! # Ok(())
//! # }
//! ```

use super::client::CacheClient;
use super::coerce::{from_cache_json, to_cache_json};
use super::store::{JsonStore, SetCondition};
use crate::config::ConfigurationError;
use crate::constants;
use crate::error::{PersistenceError, PersistenceResult};
use crate::logging::censor_sensitive;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

const CACHE_DISABLED: &str = "Redis is not enabled. Please check configuration to enable.";

/// Resolved expiry policy of a key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    After(Duration),
    At(DateTime<Utc>),
}

/// Relative and absolute TTL; at most one may be set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyExpiry {
    pub expire: Option<Duration>,
    pub expire_at: Option<DateTime<Utc>>,
}

impl KeyExpiry {
    pub fn after(ttl: Duration) -> Self {
        Self {
            expire: Some(ttl),
            expire_at: None,
        }
    }

    pub fn at(at: DateTime<Utc>) -> Self {
        Self {
            expire: None,
            expire_at: Some(at),
        }
    }

    pub fn resolve(&self) -> Result<Option<Expiry>, ConfigurationError> {
        match (self.expire, self.expire_at) {
            (Some(_), Some(_)) => Err(ConfigurationError::InvalidExpireParameter),
            (Some(ttl), None) => Ok(Some(Expiry::After(ttl))),
            (None, Some(at)) => Ok(Some(Expiry::At(at))),
            (None, None) => Ok(None),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JsonSetOptions {
    /// Defaults to the document root
    pub path: Option<String>,
    pub expiry: KeyExpiry,
    pub condition: SetCondition,
}

impl JsonSetOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path<P: Into<String>>(mut self, path: P) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn expire(mut self, ttl: Duration) -> Self {
        self.expiry.expire = Some(ttl);
        self
    }

    pub fn expire_at(mut self, at: DateTime<Utc>) -> Self {
        self.expiry.expire_at = Some(at);
        self
    }

    /// `NX`: write only when absent
    pub fn if_absent(mut self) -> Self {
        self.condition = SetCondition::IfAbsent;
        self
    }

    /// `XX`: write only when present
    pub fn if_present(mut self) -> Self {
        self.condition = SetCondition::IfPresent;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonGetOptions {
    pub path: Option<String>,
    pub expiry: KeyExpiry,
    /// Write the fallback's value back on a miss (default `true`)
    pub set_if_not_found: bool,
}

impl Default for JsonGetOptions {
    fn default() -> Self {
        Self {
            path: None,
            expiry: KeyExpiry::default(),
            set_if_not_found: true,
        }
    }
}

impl JsonGetOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path<P: Into<String>>(mut self, path: P) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn expire(mut self, ttl: Duration) -> Self {
        self.expiry.expire = Some(ttl);
        self
    }

    pub fn expire_at(mut self, at: DateTime<Utc>) -> Self {
        self.expiry.expire_at = Some(at);
        self
    }

    pub fn set_if_not_found(mut self, enabled: bool) -> Self {
        self.set_if_not_found = enabled;
        self
    }
}

/// Cache-aside operations over one cache client
#[derive(Debug, Clone)]
pub struct CacheAside {
    client: Arc<CacheClient>,
}

impl CacheAside {
    pub fn new(client: Arc<CacheClient>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Arc<CacheClient> {
        &self.client
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_connected()
    }

    /// Write `value` at the options' path; `false` when nothing was written
    pub async fn json_set<V: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &V,
        options: JsonSetOptions,
    ) -> PersistenceResult<bool> {
        let expiry = options.expiry.resolve()?;

        let Some(store) = self.client.store() else {
            warn!(cache = %self.client.name(), key = key, "{}", CACHE_DISABLED);
            return Ok(false);
        };

        let value = match to_cache_json(value) {
            Ok(value) => value,
            Err(e) => {
                error!(key = key, error = %e, "Error setting redis json");
                return Ok(false);
            }
        };

        let path = options.path.as_deref().unwrap_or(constants::cache::ROOT_PATH);
        Ok(self
            .write(store.as_ref(), key, path, &value, options.condition, expiry)
            .await)
    }

    /// Cached value of `key`, or the fallback's value
    ///
    /// On a miss the fallback runs once; with `set_if_not_found` its value
    /// is written back before the TTL is applied. Fallback errors propagate.
    pub async fn json_get<T, V, E, F, Fut>(
        &self,
        key: &str,
        fallback: F,
        options: JsonGetOptions,
    ) -> PersistenceResult<T>
    where
        T: DeserializeOwned,
        V: Serialize,
        PersistenceError: From<E>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let expiry = options.expiry.resolve()?;

        let Some(store) = self.client.store() else {
            warn!(cache = %self.client.name(), key = key, "{}", CACHE_DISABLED);
            return bypass(fallback).await;
        };

        let cached = match store.json_get(key, options.path.as_deref()).await {
            Ok(cached) => cached.filter(|value| !value.is_null()),
            Err(e) => {
                error!(key = key, error = %e, "Error retrieving redis json key");
                return bypass(fallback).await;
            }
        };

        if let Some(value) = cached {
            debug!(key = key, "Cache HIT");
            self.apply_expiry(store.as_ref(), key, expiry).await;
            match from_cache_json::<T>(value) {
                Ok(decoded) => return Ok(decoded),
                Err(e) => warn!(
                    key = key,
                    error = %e,
                    "Cached value does not match the requested type, using fallback"
                ),
            }
        } else {
            debug!(key = key, "Cache MISS");
        }

        let fresh = to_cache_json(&fallback().await?)?;

        if options.set_if_not_found {
            self.write(
                store.as_ref(),
                key,
                constants::cache::ROOT_PATH,
                &fresh,
                SetCondition::Always,
                None,
            )
            .await;
        }
        self.apply_expiry(store.as_ref(), key, expiry).await;

        Ok(from_cache_json(fresh)?)
    }

    /// Apply a TTL to an existing key
    ///
    /// `false` when not connected, when no TTL is given, when the key does
    /// not exist or when the store call fails.
    pub async fn set_key_expiry(&self, key: &str, expiry: KeyExpiry) -> PersistenceResult<bool> {
        let Some(store) = self.client.store() else {
            warn!(cache = %self.client.name(), key = key, "{}", CACHE_DISABLED);
            return Ok(false);
        };

        let expiry = expiry.resolve()?;
        Ok(self.apply_expiry(store.as_ref(), key, expiry).await)
    }

    async fn write(
        &self,
        store: &dyn JsonStore,
        key: &str,
        path: &str,
        value: &Value,
        condition: SetCondition,
        expiry: Option<Expiry>,
    ) -> bool {
        debug!(
            key = key,
            path = path,
            value = %censor_sensitive(value),
            condition = ?condition,
            "Cache write"
        );

        match store.json_set(key, path, value, condition).await {
            Ok(true) => {
                self.apply_expiry(store, key, expiry).await;
                true
            }
            Ok(false) => {
                debug!(key = key, condition = ?condition, "Cache write condition not met");
                false
            }
            Err(e) => {
                error!(key = key, error = %e, "Error setting redis json");
                false
            }
        }
    }

    async fn apply_expiry(&self, store: &dyn JsonStore, key: &str, expiry: Option<Expiry>) -> bool {
        let result = match expiry {
            None => return false,
            Some(Expiry::After(ttl)) => store.expire(key, ttl).await,
            Some(Expiry::At(at)) => store.expire_at(key, at).await,
        };

        result.unwrap_or_else(|e| {
            warn!(key = key, error = %e, "Failed to set cache key expiry");
            false
        })
    }
}

/// Run the fallback without touching the cache
async fn bypass<T, V, E, F, Fut>(fallback: F) -> PersistenceResult<T>
where
    T: DeserializeOwned,
    V: Serialize,
    PersistenceError: From<E>,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<V, E>>,
{
    let value = fallback().await?;
    Ok(from_cache_json(to_cache_json(&value)?)?)
}
