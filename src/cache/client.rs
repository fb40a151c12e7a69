//! Cache client factory
//!
//! A [`CacheClient`] is built from one cache instance's configuration. A
//! disabled instance yields an inert client that never connects; an enabled
//! instance without a host is rejected at construction.

use super::errors::CacheError;
use super::events::{CacheEvent, CacheEventListener, CacheEvents};
use super::providers::connector_for;
use super::store::{CacheConnector, JsonStore};
use crate::config::{CacheInstanceConfig, ConfigResult, ConfigurationError};
use crate::error::PersistenceResult;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

pub struct CacheClient {
    config: CacheInstanceConfig,
    connector: Arc<dyn CacheConnector>,
    store: RwLock<Option<Arc<dyn JsonStore>>>,
    events: CacheEvents,
}

impl CacheClient {
    /// Client for the configured backend
    pub fn new(config: CacheInstanceConfig) -> ConfigResult<Self> {
        let connector = connector_for(config.backend);
        Self::with_connector(config, connector)
    }

    pub fn with_connector(
        config: CacheInstanceConfig,
        connector: Arc<dyn CacheConnector>,
    ) -> ConfigResult<Self> {
        if config.enabled && config.host.trim().is_empty() {
            return Err(ConfigurationError::missing_cache_host(&config.name));
        }

        let events = CacheEvents::new(&config.name);
        Ok(Self {
            config,
            connector,
            store: RwLock::new(None),
            events,
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn config(&self) -> &CacheInstanceConfig {
        &self.config
    }

    /// Observe ready / reconnecting / end / error events
    pub fn on_event<F>(&self, listener: F)
    where
        F: Fn(&CacheEvent) + Send + Sync + 'static,
    {
        let listener: CacheEventListener = Arc::new(listener);
        self.events.subscribe(listener);
    }

    /// Open the store; a disabled client stays disconnected
    pub async fn connect(&self) -> PersistenceResult<()> {
        if !self.config.enabled {
            debug!(cache = %self.config.name, "Cache disabled, skipping connection");
            return Ok(());
        }
        if self.is_connected() {
            return Ok(());
        }

        info!(
            cache = %self.config.name,
            backend = ?self.config.backend,
            "Connecting to {} redis...",
            self.config.name
        );

        let opened = async {
            let store = self
                .connector
                .connect(&self.config, self.events.clone())
                .await?;
            store.ping().await?;
            Ok::<_, CacheError>(store)
        }
        .await;

        match opened {
            Ok(store) => {
                *self.store.write() = Some(store);
                self.events.emit(CacheEvent::Ready);
                Ok(())
            }
            Err(e) => {
                self.events.emit(CacheEvent::Error(e.to_string()));
                Err(e.into())
            }
        }
    }

    /// Close the store; safe when never connected
    pub async fn disconnect(&self) -> PersistenceResult<()> {
        let Some(store) = self.store.write().take() else {
            return Ok(());
        };

        info!(cache = %self.config.name, "Disconnecting from redis...");
        let closed = store.close().await;
        self.events.emit(CacheEvent::End);
        closed.map_err(Into::into)
    }

    pub fn is_connected(&self) -> bool {
        self.store.read().is_some()
    }

    /// The open store, when connected
    pub fn store(&self) -> Option<Arc<dyn JsonStore>> {
        self.store.read().clone()
    }
}

impl fmt::Debug for CacheClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheClient")
            .field("config", &self.config)
            .field("connected", &self.is_connected())
            .finish()
    }
}
