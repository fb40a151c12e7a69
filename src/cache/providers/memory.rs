//! In-process JSON store
//!
//! Keeps documents in a `DashMap` with per-key expiry. Suitable for single
//! instance deployments and for exercising cache-aside flows without a
//! server. Expired keys are dropped lazily on access.

use crate::cache::errors::{CacheError, CacheResult};
use crate::cache::events::CacheEvents;
use crate::cache::store::{CacheConnector, JsonPath, JsonStore, SetCondition};
use crate::config::CacheInstanceConfig;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Opens a fresh [`MemoryJsonStore`] per connection
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryConnector;

#[async_trait]
impl CacheConnector for MemoryConnector {
    async fn connect(
        &self,
        config: &CacheInstanceConfig,
        _events: CacheEvents,
    ) -> CacheResult<Arc<dyn JsonStore>> {
        debug!(cache = %config.name, "In-memory JSON store opened");
        Ok(Arc::new(MemoryJsonStore::new()))
    }
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

#[derive(Debug, Default)]
pub struct MemoryJsonStore {
    entries: DashMap<String, Entry>,
    closed: AtomicBool,
}

impl MemoryJsonStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live keys
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.iter().filter(|e| !e.is_expired(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remaining time-to-live of a key, `None` when absent or persistent
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        self.entries
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .and_then(|entry| entry.expires_at)
            .map(|at| at.saturating_duration_since(now))
    }

    fn ensure_open(&self) -> CacheResult<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(CacheError::ConnectionError("store is closed".to_string()))
        } else {
            Ok(())
        }
    }

    fn purge_if_expired(&self, key: &str) {
        let now = Instant::now();
        self.entries.remove_if(key, |_, entry| entry.is_expired(now));
    }

    /// A deadline past what `Instant` can represent leaves the key persistent
    fn set_expiry(&self, key: &str, ttl: Duration) -> bool {
        self.purge_if_expired(key);
        match self.entries.get_mut(key) {
            Some(mut entry) => {
                entry.expires_at = Instant::now().checked_add(ttl);
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl JsonStore for MemoryJsonStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn json_set(
        &self,
        key: &str,
        path: &str,
        value: &Value,
        condition: SetCondition,
    ) -> CacheResult<bool> {
        self.ensure_open()?;
        let path = JsonPath::parse(path)?;
        self.purge_if_expired(key);

        if path.is_root() {
            let exists = self.entries.contains_key(key);
            let allowed = match condition {
                SetCondition::Always => true,
                SetCondition::IfAbsent => !exists,
                SetCondition::IfPresent => exists,
            };
            if allowed {
                // A root write replaces the document and clears its TTL
                self.entries.insert(
                    key.to_string(),
                    Entry {
                        value: value.clone(),
                        expires_at: None,
                    },
                );
            }
            return Ok(allowed);
        }

        let Some(mut entry) = self.entries.get_mut(key) else {
            return Err(CacheError::BackendError(
                "new objects must be created at the root".to_string(),
            ));
        };
        let exists = path.lookup(&entry.value).is_some();
        let allowed = match condition {
            SetCondition::Always => true,
            SetCondition::IfAbsent => !exists,
            SetCondition::IfPresent => exists,
        };
        if !allowed {
            return Ok(false);
        }

        match path.parent_mut(&mut entry.value) {
            Some((Value::Object(map), field)) => {
                map.insert(field.to_string(), value.clone());
                Ok(true)
            }
            Some((Value::Array(items), field)) => {
                let slot = field
                    .parse::<usize>()
                    .ok()
                    .and_then(|index| items.get_mut(index));
                match slot {
                    Some(slot) => {
                        *slot = value.clone();
                        Ok(true)
                    }
                    None => Ok(false),
                }
            }
            _ => Ok(false),
        }
    }

    async fn json_get(&self, key: &str, path: Option<&str>) -> CacheResult<Option<Value>> {
        self.ensure_open()?;
        let path = path.map(JsonPath::parse).transpose()?;
        self.purge_if_expired(key);

        let Some(entry) = self.entries.get(key) else {
            return Ok(None);
        };
        Ok(match path {
            Some(path) => path.lookup(&entry.value).cloned(),
            None => Some(entry.value.clone()),
        })
    }

    async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<bool> {
        self.ensure_open()?;
        Ok(self.set_expiry(key, ttl))
    }

    async fn expire_at(&self, key: &str, at: DateTime<Utc>) -> CacheResult<bool> {
        self.ensure_open()?;
        let remaining = (at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        Ok(self.set_expiry(key, remaining))
    }

    async fn ping(&self) -> CacheResult<()> {
        self.ensure_open()
    }

    async fn close(&self) -> CacheResult<()> {
        self.closed.store(true, Ordering::Release);
        self.entries.clear();
        Ok(())
    }
}
