use super::shutdown::ShutdownReport;
use crate::cache::{CacheAside, CacheClient, CacheConnector};
use crate::config::{
    CacheInstanceConfig, ConfigResult, ConfigurationError, DatabaseInstanceConfig,
    PersistenceConfig,
};
use crate::database::{ConnectOptions, Connector, DatabaseFactory, MongoConnector};
use crate::error::PersistenceResult;
use crate::models::{AppCollections, CmsCollections};
use futures::future::join_all;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Named document-store databases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatabaseId {
    App,
    Cms,
}

impl DatabaseId {
    pub const ALL: [DatabaseId; 2] = [DatabaseId::App, DatabaseId::Cms];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::App => "app",
            Self::Cms => "cms",
        }
    }

    fn config<'a>(&self, config: &'a PersistenceConfig) -> &'a DatabaseInstanceConfig {
        match self {
            Self::App => &config.database.app,
            Self::Cms => &config.database.cms,
        }
    }
}

impl fmt::Display for DatabaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatabaseId {
    type Err = ConfigurationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "app" => Ok(Self::App),
            "cms" => Ok(Self::Cms),
            other => Err(ConfigurationError::invalid_value(
                "database",
                other,
                "expected one of: app, cms",
            )),
        }
    }
}

/// Named cache instances
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheId {
    Global,
    App,
    Cms,
}

impl CacheId {
    pub const ALL: [CacheId; 3] = [CacheId::Global, CacheId::App, CacheId::Cms];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::App => "app",
            Self::Cms => "cms",
        }
    }

    fn config<'a>(&self, config: &'a PersistenceConfig) -> &'a CacheInstanceConfig {
        match self {
            Self::Global => &config.cache.global,
            Self::App => &config.cache.app,
            Self::Cms => &config.cache.cms,
        }
    }
}

impl fmt::Display for CacheId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CacheId {
    type Err = ConfigurationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "global" | "default" => Ok(Self::Global),
            "app" => Ok(Self::App),
            "cms" => Ok(Self::Cms),
            other => Err(ConfigurationError::invalid_value(
                "cache",
                other,
                "expected one of: global, app, cms",
            )),
        }
    }
}

/// Which handles to open, and with which connectors
#[derive(Clone)]
pub struct RegistryOptions {
    pub databases: Vec<DatabaseId>,
    pub caches: Vec<CacheId>,
    pub connector: Arc<dyn Connector>,
    /// Overrides the connector chosen from each cache's configured backend
    pub cache_connector: Option<Arc<dyn CacheConnector>>,
    pub app_name: Option<String>,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            databases: DatabaseId::ALL.to_vec(),
            caches: CacheId::ALL.to_vec(),
            connector: Arc::new(MongoConnector),
            cache_connector: None,
            app_name: None,
        }
    }
}

impl RegistryOptions {
    pub fn databases<I: IntoIterator<Item = DatabaseId>>(mut self, ids: I) -> Self {
        self.databases = ids.into_iter().collect();
        self
    }

    pub fn caches<I: IntoIterator<Item = CacheId>>(mut self, ids: I) -> Self {
        self.caches = ids.into_iter().collect();
        self
    }

    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = connector;
        self
    }

    pub fn with_cache_connector(mut self, connector: Arc<dyn CacheConnector>) -> Self {
        self.cache_connector = Some(connector);
        self
    }

    pub fn app_name<N: Into<String>>(mut self, name: N) -> Self {
        self.app_name = Some(name.into());
        self
    }
}

impl fmt::Debug for RegistryOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryOptions")
            .field("databases", &self.databases)
            .field("caches", &self.caches)
            .field("connector", &self.connector)
            .field("cache_connector", &self.cache_connector)
            .field("app_name", &self.app_name)
            .finish()
    }
}

/// Open store handles of the process
#[derive(Debug, Default)]
pub struct PersistenceRegistry {
    databases: HashMap<DatabaseId, Arc<DatabaseFactory>>,
    caches: HashMap<CacheId, Arc<CacheClient>>,
}

impl PersistenceRegistry {
    /// Open every requested handle; any failure closes what was opened
    pub async fn initialize(
        config: &PersistenceConfig,
        options: RegistryOptions,
    ) -> PersistenceResult<Self> {
        let mut registry = Self::default();

        if let Err(e) = registry.open_all(config, &options).await {
            error!(error = %e, "Persistence initialization failed, closing opened handles");
            let report = registry.shutdown(Duration::from_secs(5)).await;
            if !report.is_clean() {
                warn!(report = %report, "Partial shutdown after failed initialization");
            }
            return Err(e);
        }

        info!(
            databases = ?registry.databases.keys().collect::<Vec<_>>(),
            caches = ?registry.caches.keys().collect::<Vec<_>>(),
            "✅ Persistence registry initialized"
        );
        Ok(registry)
    }

    async fn open_all(
        &mut self,
        config: &PersistenceConfig,
        options: &RegistryOptions,
    ) -> PersistenceResult<()> {
        for id in &options.databases {
            let instance = id.config(config);
            let factory = DatabaseFactory::from_config(
                instance,
                config.database.default_timeout(),
                Arc::clone(&options.connector),
            )?;

            let mut connect = ConnectOptions::new();
            if !instance.database_name.is_empty() {
                connect = connect.db_name(instance.database_name.clone());
            }
            if let Some(app_name) = &options.app_name {
                connect = connect.app_name(app_name.clone());
            }
            factory.connect(connect).await?;
            self.databases.insert(*id, Arc::new(factory));
        }

        for id in &options.caches {
            let instance = id.config(config).clone();
            let client = match &options.cache_connector {
                Some(connector) => CacheClient::with_connector(instance, Arc::clone(connector))?,
                None => CacheClient::new(instance)?,
            };

            // An enabled cache that cannot connect is a deployment fault
            client.connect().await?;
            self.caches.insert(*id, Arc::new(client));
        }

        Ok(())
    }

    pub fn database(&self, id: DatabaseId) -> ConfigResult<Arc<DatabaseFactory>> {
        self.databases
            .get(&id)
            .cloned()
            .ok_or_else(|| ConfigurationError::InstanceNotRegistered {
                kind: "database",
                name: id.to_string(),
            })
    }

    pub fn cache(&self, id: CacheId) -> ConfigResult<Arc<CacheClient>> {
        self.caches
            .get(&id)
            .cloned()
            .ok_or_else(|| ConfigurationError::InstanceNotRegistered {
                kind: "cache",
                name: id.to_string(),
            })
    }

    pub fn cache_aside(&self, id: CacheId) -> ConfigResult<CacheAside> {
        self.cache(id).map(CacheAside::new)
    }

    pub fn app_collections(&self) -> ConfigResult<AppCollections> {
        let factory = self.database(DatabaseId::App)?;
        AppCollections::new(&factory)
    }

    pub fn cms_collections(&self) -> ConfigResult<CmsCollections> {
        let factory = self.database(DatabaseId::Cms)?;
        CmsCollections::new(&factory)
    }

    /// Close every handle concurrently, waiting at most `grace`
    ///
    /// Close failures are logged and skipped.
    pub async fn shutdown(&self, grace: Duration) -> ShutdownReport {
        let report = Arc::new(Mutex::new(ShutdownReport::default()));

        let databases = self.databases.iter().map(|(id, factory)| {
            let report = Arc::clone(&report);
            async move {
                let handle = format!("database:{id}");
                let outcome = factory.disconnect().await.map_err(|e| e.to_string());
                if let Err(e) = &outcome {
                    warn!(handle = %handle, error = %e, "Failed to close database");
                }
                report.lock().record(handle, outcome);
            }
        });
        let caches = self.caches.iter().map(|(id, client)| {
            let report = Arc::clone(&report);
            async move {
                let handle = format!("cache:{id}");
                let outcome = client.disconnect().await.map_err(|e| e.to_string());
                if let Err(e) = &outcome {
                    warn!(handle = %handle, error = %e, "Failed to close cache");
                }
                report.lock().record(handle, outcome);
            }
        });

        let closes = async {
            futures::join!(join_all(databases), join_all(caches));
        };
        let timed_out = tokio::time::timeout(grace, closes).await.is_err();

        let mut report = report.lock().clone();
        report.timed_out = timed_out;
        if timed_out {
            warn!(grace_ms = grace.as_millis() as u64, "Shutdown grace period elapsed");
        }
        info!(report = %report, "Persistence registry shut down");
        report
    }
}
