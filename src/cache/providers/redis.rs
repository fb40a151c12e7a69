//! RedisJSON cache provider
//!
//! Uses `redis::aio::ConnectionManager` for async multiplexed connections
//! with automatic reconnection. JSON commands are issued as raw `JSON.*`
//! commands, so any server with the RedisJSON module loaded works.

use crate::cache::errors::{CacheError, CacheResult};
use crate::cache::events::{CacheEvent, CacheEvents};
use crate::cache::store::{CacheConnector, JsonStore, SetCondition};
use crate::config::CacheInstanceConfig;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::{ConnectionAddr, ConnectionInfo, RedisConnectionInfo, RedisError};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Opens [`RedisJsonStore`]s
#[derive(Debug, Default, Clone, Copy)]
pub struct RedisConnector;

#[async_trait]
impl CacheConnector for RedisConnector {
    async fn connect(
        &self,
        config: &CacheInstanceConfig,
        events: CacheEvents,
    ) -> CacheResult<Arc<dyn JsonStore>> {
        let store = RedisJsonStore::connect(config, events).await?;
        Ok(Arc::new(store))
    }
}

/// RedisJSON-backed store over a managed connection
#[derive(Clone)]
pub struct RedisJsonStore {
    connection_manager: redis::aio::ConnectionManager,
    events: CacheEvents,
}

impl std::fmt::Debug for RedisJsonStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisJsonStore")
            .field("connection_manager", &"ConnectionManager")
            .field("cache", &self.events.cache())
            .finish()
    }
}

impl RedisJsonStore {
    pub async fn connect(config: &CacheInstanceConfig, events: CacheEvents) -> CacheResult<Self> {
        let info = ConnectionInfo {
            addr: ConnectionAddr::Tcp(config.host.clone(), config.port),
            redis: RedisConnectionInfo {
                username: config.username.clone(),
                password: config.password.clone(),
                ..Default::default()
            },
        };

        let client = redis::Client::open(info).map_err(|e| {
            CacheError::ConnectionError(format!("Failed to create Redis client: {}", e))
        })?;

        let connection_manager = redis::aio::ConnectionManager::new(client)
            .await
            .map_err(|e| {
                CacheError::ConnectionError(format!("Failed to connect to Redis: {}", e))
            })?;

        debug!(
            cache = %config.name,
            host = %config.host,
            port = config.port,
            "Redis JSON store connected"
        );

        Ok(Self {
            connection_manager,
            events,
        })
    }

    /// Classify a command failure; dropped connections are re-established
    /// by the connection manager on the next command
    fn command_error(&self, command: &str, error: RedisError) -> CacheError {
        if error.is_connection_dropped() || error.is_io_error() || error.is_connection_refusal() {
            self.events.emit(CacheEvent::Reconnecting);
            CacheError::ConnectionError(format!("Redis {} failed: {}", command, error))
        } else {
            CacheError::BackendError(format!("Redis {} failed: {}", command, error))
        }
    }
}

#[async_trait]
impl JsonStore for RedisJsonStore {
    fn backend_name(&self) -> &'static str {
        "redis"
    }

    async fn json_set(
        &self,
        key: &str,
        path: &str,
        value: &Value,
        condition: SetCondition,
    ) -> CacheResult<bool> {
        let mut conn = self.connection_manager.clone();
        let payload = serde_json::to_string(value)?;

        let mut cmd = redis::cmd("JSON.SET");
        cmd.arg(key).arg(path).arg(payload);
        if let Some(flag) = condition.flag() {
            cmd.arg(flag);
        }

        // Nil reply when the NX/XX condition was not met
        let reply: Option<String> = cmd
            .query_async(&mut conn)
            .await
            .map_err(|e| self.command_error("JSON.SET", e))?;

        debug!(key = key, path = path, written = reply.is_some(), "Cache JSON.SET");
        Ok(reply.is_some())
    }

    async fn json_get(&self, key: &str, path: Option<&str>) -> CacheResult<Option<Value>> {
        let mut conn = self.connection_manager.clone();

        let mut cmd = redis::cmd("JSON.GET");
        cmd.arg(key);
        if let Some(path) = path {
            cmd.arg(path);
        }

        let reply: Option<String> = cmd
            .query_async(&mut conn)
            .await
            .map_err(|e| self.command_error("JSON.GET", e))?;

        let Some(raw) = reply else {
            debug!(key = key, "Cache MISS");
            return Ok(None);
        };

        let value: Value = serde_json::from_str(&raw)?;
        // JSONPath queries (`$...`) reply with an array of matches
        let value = match (path, value) {
            (Some(p), Value::Array(mut matches)) if p.starts_with('$') => {
                if matches.is_empty() {
                    None
                } else {
                    Some(matches.swap_remove(0))
                }
            }
            (_, value) => Some(value),
        };

        debug!(key = key, hit = value.is_some(), "Cache JSON.GET");
        Ok(value)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<bool> {
        let mut conn = self.connection_manager.clone();
        // A zero TTL expires the key at once, as in the memory backend
        let ttl_millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);

        let updated: i64 = redis::cmd("PEXPIRE")
            .arg(key)
            .arg(ttl_millis)
            .query_async(&mut conn)
            .await
            .map_err(|e| self.command_error("PEXPIRE", e))?;

        debug!(key = key, ttl_millis = ttl_millis, "Cache PEXPIRE");
        Ok(updated == 1)
    }

    async fn expire_at(&self, key: &str, at: DateTime<Utc>) -> CacheResult<bool> {
        let mut conn = self.connection_manager.clone();

        let updated: i64 = redis::cmd("EXPIREAT")
            .arg(key)
            .arg(at.timestamp())
            .query_async(&mut conn)
            .await
            .map_err(|e| self.command_error("EXPIREAT", e))?;

        debug!(key = key, expire_at = %at, "Cache EXPIREAT");
        Ok(updated == 1)
    }

    async fn ping(&self) -> CacheResult<()> {
        let mut conn = self.connection_manager.clone();
        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| self.command_error("PING", e))?;

        if pong == "PONG" {
            Ok(())
        } else {
            Err(CacheError::BackendError(format!("Unexpected PING reply: {}", pong)))
        }
    }

    async fn close(&self) -> CacheResult<()> {
        // The manager's connection closes once the last clone is dropped
        debug!(cache = %self.events.cache(), "Redis JSON store released");
        Ok(())
    }
}
