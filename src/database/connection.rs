//! Connection factory
//!
//! A [`DatabaseFactory`] owns one connection string. `connect` opens the
//! connection with the operational defaults overlaid by caller overrides;
//! `create_collection` binds typed façades to the open [`Connection`];
//! `disconnect` closes it and is safe to repeat.

use super::collection::Collection;
use super::driver::{Connector, DocumentDriver};
use super::mongo::MongoConnector;
use super::schema::Entity;
use crate::config::{ConfigurationError, DatabaseInstanceConfig};
use crate::constants;
use crate::error::PersistenceResult;
use crate::logging::{log_database_operation, redact_url};
use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Read isolation requested from the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadConcernLevel {
    #[default]
    Local,
    Available,
    Majority,
    Linearizable,
    Snapshot,
}

/// Caller overrides for `connect`; unset fields take the defaults
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectOptions {
    pub retry_writes: Option<bool>,
    pub socket_timeout: Option<Duration>,
    pub connect_timeout: Option<Duration>,
    pub read_concern: Option<ReadConcernLevel>,
    /// Database name; the connection string's default database otherwise
    pub db_name: Option<String>,
    pub app_name: Option<String>,
    pub max_pool_size: Option<u32>,
}

impl ConnectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn db_name<N: Into<String>>(mut self, name: N) -> Self {
        self.db_name = Some(name.into());
        self
    }

    pub fn retry_writes(mut self, retry: bool) -> Self {
        self.retry_writes = Some(retry);
        self
    }

    pub fn socket_timeout(mut self, timeout: Duration) -> Self {
        self.socket_timeout = Some(timeout);
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn read_concern(mut self, level: ReadConcernLevel) -> Self {
        self.read_concern = Some(level);
        self
    }

    pub fn app_name<N: Into<String>>(mut self, name: N) -> Self {
        self.app_name = Some(name.into());
        self
    }

    pub fn max_pool_size(mut self, size: u32) -> Self {
        self.max_pool_size = Some(size);
        self
    }

    pub fn resolve(&self) -> ConnectionSettings {
        ConnectionSettings {
            retry_writes: self
                .retry_writes
                .unwrap_or(constants::connection::RETRY_WRITES),
            socket_timeout: self
                .socket_timeout
                .unwrap_or(Duration::from_millis(constants::connection::SOCKET_TIMEOUT_MS)),
            connect_timeout: self
                .connect_timeout
                .unwrap_or(Duration::from_millis(constants::connection::CONNECT_TIMEOUT_MS)),
            read_concern: self.read_concern.unwrap_or_default(),
            db_name: self.db_name.clone().filter(|name| !name.is_empty()),
            app_name: self.app_name.clone(),
            max_pool_size: self.max_pool_size,
        }
    }
}

/// Effective connection settings handed to the [`Connector`]
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionSettings {
    pub retry_writes: bool,
    pub socket_timeout: Duration,
    pub connect_timeout: Duration,
    pub read_concern: ReadConcernLevel,
    pub db_name: Option<String>,
    pub app_name: Option<String>,
    pub max_pool_size: Option<u32>,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        ConnectOptions::default().resolve()
    }
}

/// An open database connection shared by every collection bound to it
pub struct Connection {
    driver: Arc<dyn DocumentDriver>,
    settings: ConnectionSettings,
    default_timeout: Duration,
    open: AtomicBool,
}

impl Connection {
    fn new(
        driver: Arc<dyn DocumentDriver>,
        settings: ConnectionSettings,
        default_timeout: Duration,
    ) -> Self {
        Self {
            driver,
            settings,
            default_timeout,
            open: AtomicBool::new(true),
        }
    }

    pub fn database_name(&self) -> &str {
        self.driver.database_name()
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    /// Time limit applied when an operation does not set its own
    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Driver of an open connection
    pub(crate) fn driver(&self) -> PersistenceResult<&Arc<dyn DocumentDriver>> {
        if self.is_open() {
            Ok(&self.driver)
        } else {
            Err(ConfigurationError::ConnectionRequired.into())
        }
    }

    pub async fn ping(&self) -> PersistenceResult<()> {
        self.driver()?.ping().await
    }

    /// Close once; later calls return immediately
    pub async fn close(&self) -> PersistenceResult<()> {
        if self.open.swap(false, Ordering::AcqRel) {
            self.driver.close().await
        } else {
            Ok(())
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("database", &self.database_name())
            .field("open", &self.is_open())
            .field("default_timeout", &self.default_timeout)
            .finish()
    }
}

/// Produces connections and typed collection façades for one connection string
pub struct DatabaseFactory {
    connection_string: String,
    connector: Arc<dyn Connector>,
    default_timeout: Duration,
    connection: RwLock<Option<Arc<Connection>>>,
}

impl DatabaseFactory {
    /// Factory backed by the MongoDB driver
    pub fn new<S: Into<String>>(connection_string: S) -> Result<Self, ConfigurationError> {
        Self::with_connector(connection_string, Arc::new(MongoConnector))
    }

    pub fn with_connector<S: Into<String>>(
        connection_string: S,
        connector: Arc<dyn Connector>,
    ) -> Result<Self, ConfigurationError> {
        let connection_string = connection_string.into();
        if connection_string.trim().is_empty() {
            return Err(ConfigurationError::MissingConnectionString);
        }

        Ok(Self {
            connection_string,
            connector,
            default_timeout: constants::query::default_timeout(),
            connection: RwLock::new(None),
        })
    }

    /// Factory for a configured database instance
    pub fn from_config(
        config: &DatabaseInstanceConfig,
        default_timeout: Duration,
        connector: Arc<dyn Connector>,
    ) -> Result<Self, ConfigurationError> {
        Ok(Self::with_connector(&config.connection_string, connector)?
            .with_default_timeout(default_timeout))
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        if !timeout.is_zero() {
            self.default_timeout = timeout;
        }
        self
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Connection string with the password hidden
    pub fn redacted_connection_string(&self) -> String {
        redact_url(&self.connection_string)
    }

    /// Open the connection; an already open connection is returned as is
    pub async fn connect(&self, options: ConnectOptions) -> PersistenceResult<Arc<Connection>> {
        if let Some(existing) = self.connection() {
            warn!(
                database = existing.database_name(),
                "Database already connected, reusing the open connection"
            );
            return Ok(existing);
        }

        let settings = options.resolve();
        debug!(
            connection = %self.redacted_connection_string(),
            ?settings,
            "Connecting to database"
        );

        let started = Instant::now();
        let driver = self
            .connector
            .open(&self.connection_string, &settings)
            .await?;
        let connection = Arc::new(Connection::new(driver, settings, self.default_timeout));

        log_database_operation(
            "connect",
            None,
            "connected",
            Some(started.elapsed().as_millis() as u64),
            Some(&format!(
                "Successfully connected to {} database.",
                connection.database_name()
            )),
        );

        let winner = {
            let mut slot = self.connection.write();
            match slot.as_ref() {
                Some(existing) if existing.is_open() => Some(Arc::clone(existing)),
                _ => {
                    *slot = Some(Arc::clone(&connection));
                    None
                }
            }
        };

        match winner {
            // Lost a concurrent connect; keep the winner
            Some(winner) => {
                if let Err(e) = connection.close().await {
                    warn!(error = %e, "Failed to close redundant connection");
                }
                Ok(winner)
            }
            None => Ok(connection),
        }
    }

    /// Open connection, if any
    pub fn connection(&self) -> Option<Arc<Connection>> {
        self.connection
            .read()
            .as_ref()
            .filter(|connection| connection.is_open())
            .cloned()
    }

    pub fn is_connected(&self) -> bool {
        self.connection().is_some()
    }

    /// Close the connection; a no-op when never opened or already closed
    pub async fn disconnect(&self) -> PersistenceResult<()> {
        let Some(connection) = self.connection.write().take() else {
            return Ok(());
        };

        let database = connection.database_name().to_string();
        connection.close().await?;
        log_database_operation(
            "disconnect",
            None,
            "closed",
            None,
            Some(&format!("Closed connection to {database} database.")),
        );
        Ok(())
    }

    /// Bind a typed façade to the open connection
    pub fn create_collection<T: Entity>(
        &self,
        name: &str,
    ) -> Result<Collection<T>, ConfigurationError> {
        let connection = self
            .connection()
            .ok_or(ConfigurationError::ConnectionRequired)?;
        Ok(Collection::new(name, connection))
    }
}

impl fmt::Debug for DatabaseFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseFactory")
            .field("connection_string", &self.redacted_connection_string())
            .field("default_timeout", &self.default_timeout)
            .field("connected", &self.is_connected())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_defaults() {
        let settings = ConnectOptions::new().resolve();
        assert!(settings.retry_writes);
        assert_eq!(settings.socket_timeout, Duration::from_millis(60_000));
        assert_eq!(settings.connect_timeout, Duration::from_millis(45_000));
        assert_eq!(settings.read_concern, ReadConcernLevel::Local);
        assert_eq!(settings.db_name, None);
    }

    #[test]
    fn test_connect_overrides() {
        let settings = ConnectOptions::new()
            .retry_writes(false)
            .socket_timeout(Duration::from_secs(1))
            .read_concern(ReadConcernLevel::Majority)
            .db_name("app")
            .resolve();
        assert!(!settings.retry_writes);
        assert_eq!(settings.socket_timeout, Duration::from_secs(1));
        assert_eq!(settings.connect_timeout, Duration::from_millis(45_000));
        assert_eq!(settings.read_concern, ReadConcernLevel::Majority);
        assert_eq!(settings.db_name.as_deref(), Some("app"));
    }

    #[test]
    fn test_empty_connection_string_is_rejected() {
        for value in ["", "   "] {
            let error = DatabaseFactory::new(value).unwrap_err();
            assert_eq!(error, ConfigurationError::MissingConnectionString);
            assert_eq!(error.to_string(), "Missing connection string.");
        }
    }

    #[test]
    fn test_collection_requires_connection() {
        #[derive(serde::Serialize, serde::Deserialize)]
        struct Probe {}
        impl Entity for Probe {}

        let factory = DatabaseFactory::new("mongodb://localhost:27017").unwrap();
        let error = factory.create_collection::<Probe>("probes").unwrap_err();
        assert_eq!(error, ConfigurationError::ConnectionRequired);
    }

    #[test]
    fn test_debug_redacts_password() {
        let factory = DatabaseFactory::new("mongodb://app:secret@db:27017").unwrap();
        let rendered = format!("{factory:?}");
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("app:***@db"));
    }
}
