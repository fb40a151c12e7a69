//! JSON key-value store seam
//!
//! [`JsonStore`] is one open connection to a JSON-capable key-value store.
//! Values are `serde_json::Value`s already narrowed by
//! [`coerce`](super::coerce); paths use the JSONPath subset RedisJSON
//! accepts for writes (`$`, `$.a.b`, legacy `.a.b`).

use super::errors::{CacheError, CacheResult};
use super::events::CacheEvents;
use crate::config::CacheInstanceConfig;
use crate::constants;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Conditional-write flag of a JSON write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SetCondition {
    #[default]
    Always,
    /// `NX`: only when the path does not exist yet
    IfAbsent,
    /// `XX`: only when the path already exists
    IfPresent,
}

impl SetCondition {
    /// Wire flag, if any
    pub fn flag(&self) -> Option<&'static str> {
        match self {
            Self::Always => None,
            Self::IfAbsent => Some("NX"),
            Self::IfPresent => Some("XX"),
        }
    }
}

#[async_trait]
pub trait JsonStore: Send + Sync + fmt::Debug {
    fn backend_name(&self) -> &'static str;

    /// `false` when the set condition was not met
    async fn json_set(
        &self,
        key: &str,
        path: &str,
        value: &Value,
        condition: SetCondition,
    ) -> CacheResult<bool>;

    /// Value at `path` (the whole document when `None`); `None` when absent
    async fn json_get(&self, key: &str, path: Option<&str>) -> CacheResult<Option<Value>>;

    /// `false` when the key does not exist
    async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<bool>;

    async fn expire_at(&self, key: &str, at: DateTime<Utc>) -> CacheResult<bool>;

    async fn ping(&self) -> CacheResult<()>;

    async fn close(&self) -> CacheResult<()>;
}

/// Opens a [`JsonStore`] for a cache instance
#[async_trait]
pub trait CacheConnector: Send + Sync + fmt::Debug {
    async fn connect(
        &self,
        config: &CacheInstanceConfig,
        events: CacheEvents,
    ) -> CacheResult<Arc<dyn JsonStore>>;
}

/// Parsed JSON path; no segments addresses the root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonPath {
    segments: Vec<String>,
}

impl JsonPath {
    pub fn root() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    /// Accepts `$`, `.`, `$.a.b`, `.a.b` and `a.b`
    pub fn parse(path: &str) -> CacheResult<Self> {
        let trimmed = path.trim();
        let rest = trimmed
            .strip_prefix(constants::cache::ROOT_PATH)
            .unwrap_or(trimmed);
        let rest = rest.strip_prefix('.').unwrap_or(rest);

        if rest.is_empty() {
            return if trimmed.is_empty() {
                Err(CacheError::InvalidPath(path.to_string()))
            } else {
                Ok(Self::root())
            };
        }

        let segments: Vec<String> = rest.split('.').map(str::to_string).collect();
        if segments.iter().any(|segment| segment.is_empty()) {
            return Err(CacheError::InvalidPath(path.to_string()));
        }
        Ok(Self { segments })
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Value addressed by this path inside `document`
    pub fn lookup<'a>(&self, document: &'a Value) -> Option<&'a Value> {
        self.segments
            .iter()
            .try_fold(document, |current, segment| match current {
                Value::Object(map) => map.get(segment),
                Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            })
    }

    /// Mutable parent container and the final segment
    pub fn parent_mut<'a>(&self, document: &'a mut Value) -> Option<(&'a mut Value, &str)> {
        let (last, parents) = self.segments.split_last()?;
        let mut current = document;
        for segment in parents {
            current = match current {
                Value::Object(map) => map.get_mut(segment)?,
                Value::Array(items) => items.get_mut(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some((current, last.as_str()))
    }
}
