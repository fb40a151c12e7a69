//! Shared test doubles
//!
//! `RecordingDriver` captures every command the collection façade sends and
//! answers with scripted outcomes. `CountingStore` wraps the in-memory JSON
//! store, counts calls and can be told to fail.

#![allow(dead_code)]

use async_trait::async_trait;
use bson::oid::ObjectId;
use bson::{Bson, Document};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use persistence_core::cache::{
    CacheClient, CacheConnector, CacheError, CacheEvents, CacheResult, JsonStore, MemoryJsonStore,
    SetCondition,
};
use persistence_core::config::{CacheBackendKind, CacheInstanceConfig};
use persistence_core::database::{
    AggregateCommand, ConnectOptions, Connector, ConnectionSettings, CountCommand, DatabaseFactory,
    DeleteCommand, DeleteOutcome, DocumentDriver, DocumentStream, FindCommand,
    FindOneAndUpdateCommand, InsertCommand, UpdateCommand, UpdateOutcome, UpdateSpec,
};
use persistence_core::{PersistenceError, PersistenceResult};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A command as the driver received it
#[derive(Debug, Clone, PartialEq)]
pub enum Recorded {
    Find(String, FindCommand),
    FindStream(String, FindCommand),
    FindOne(String, FindCommand),
    Aggregate(String, AggregateCommand),
    Count(String, CountCommand),
    Insert(String, InsertCommand),
    Update(String, UpdateCommand),
    Delete(String, DeleteCommand),
    FindOneAndUpdate(String, FindOneAndUpdateCommand),
}

/// Outcomes the driver answers with
#[derive(Debug, Clone, Default)]
pub struct Script {
    pub documents: Vec<Document>,
    pub count: u64,
    pub update: UpdateOutcome,
    pub delete: DeleteOutcome,
    /// `find_one_and_update` result; upserts echo the filter and `$set` when unset
    pub modified: Option<Document>,
    /// Fail every operation with this backend message
    pub failure: Option<String>,
}

#[derive(Debug)]
pub struct RecordingDriver {
    database: String,
    commands: Mutex<Vec<Recorded>>,
    script: Mutex<Script>,
    closes: AtomicUsize,
}

impl RecordingDriver {
    pub fn new(database: &str) -> Arc<Self> {
        Arc::new(Self {
            database: database.to_string(),
            commands: Mutex::new(Vec::new()),
            script: Mutex::new(Script::default()),
            closes: AtomicUsize::new(0),
        })
    }

    pub fn script<F: FnOnce(&mut Script)>(&self, edit: F) {
        edit(&mut self.script.lock());
    }

    pub fn commands(&self) -> Vec<Recorded> {
        self.commands.lock().clone()
    }

    pub fn last(&self) -> Recorded {
        self.commands
            .lock()
            .last()
            .cloned()
            .expect("no command recorded")
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    fn record(&self, command: Recorded) -> PersistenceResult<Script> {
        self.commands.lock().push(command);
        let script = self.script.lock().clone();
        match &script.failure {
            Some(message) => Err(PersistenceError::Backend(message.clone())),
            None => Ok(script),
        }
    }
}

fn upserted_echo(command: &FindOneAndUpdateCommand) -> Document {
    let mut document = command.filter.clone();
    if let UpdateSpec::Document(update) = &command.update {
        for operator in ["$setOnInsert", "$set"] {
            if let Ok(fields) = update.get_document(operator) {
                for (key, value) in fields {
                    document.insert(key.clone(), value.clone());
                }
            }
        }
    }
    if !document.contains_key("_id") {
        document.insert("_id", ObjectId::new());
    }
    document
}

#[async_trait]
impl DocumentDriver for RecordingDriver {
    fn database_name(&self) -> &str {
        &self.database
    }

    async fn find(&self, collection: &str, command: FindCommand) -> PersistenceResult<Vec<Document>> {
        Ok(self.record(Recorded::Find(collection.to_string(), command))?.documents)
    }

    async fn find_stream(
        &self,
        collection: &str,
        command: FindCommand,
    ) -> PersistenceResult<DocumentStream> {
        let documents = self
            .record(Recorded::FindStream(collection.to_string(), command))?
            .documents;
        Ok(stream::iter(documents.into_iter().map(Ok)).boxed())
    }

    async fn find_one(
        &self,
        collection: &str,
        command: FindCommand,
    ) -> PersistenceResult<Option<Document>> {
        let script = self.record(Recorded::FindOne(collection.to_string(), command))?;
        Ok(script.documents.into_iter().next())
    }

    async fn aggregate(
        &self,
        collection: &str,
        command: AggregateCommand,
    ) -> PersistenceResult<Vec<Document>> {
        Ok(self.record(Recorded::Aggregate(collection.to_string(), command))?.documents)
    }

    async fn count(&self, collection: &str, command: CountCommand) -> PersistenceResult<u64> {
        Ok(self.record(Recorded::Count(collection.to_string(), command))?.count)
    }

    async fn insert(&self, collection: &str, command: InsertCommand) -> PersistenceResult<()> {
        self.record(Recorded::Insert(collection.to_string(), command))?;
        Ok(())
    }

    async fn update(
        &self,
        collection: &str,
        command: UpdateCommand,
    ) -> PersistenceResult<UpdateOutcome> {
        Ok(self.record(Recorded::Update(collection.to_string(), command))?.update)
    }

    async fn delete(
        &self,
        collection: &str,
        command: DeleteCommand,
    ) -> PersistenceResult<DeleteOutcome> {
        Ok(self.record(Recorded::Delete(collection.to_string(), command))?.delete)
    }

    async fn find_one_and_update(
        &self,
        collection: &str,
        command: FindOneAndUpdateCommand,
    ) -> PersistenceResult<Option<Document>> {
        let upsert = command.options.upsert;
        let echo = upserted_echo(&command);
        let script = self.record(Recorded::FindOneAndUpdate(collection.to_string(), command))?;
        Ok(match script.modified {
            Some(document) => Some(document),
            None if upsert => Some(echo),
            None => None,
        })
    }

    async fn ping(&self) -> PersistenceResult<()> {
        Ok(())
    }

    async fn close(&self) -> PersistenceResult<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands out one shared [`RecordingDriver`] and records how it was opened
#[derive(Debug)]
pub struct RecordingConnector {
    pub driver: Arc<RecordingDriver>,
    opened: Mutex<Vec<(String, ConnectionSettings)>>,
    fail: AtomicBool,
}

impl RecordingConnector {
    pub fn new(database: &str) -> Arc<Self> {
        Arc::new(Self {
            driver: RecordingDriver::new(database),
            opened: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        })
    }

    pub fn failing(database: &str) -> Arc<Self> {
        let connector = Self::new(database);
        connector.fail.store(true, Ordering::SeqCst);
        connector
    }

    pub fn opened(&self) -> Vec<(String, ConnectionSettings)> {
        self.opened.lock().clone()
    }
}

#[async_trait]
impl Connector for RecordingConnector {
    async fn open(
        &self,
        connection_string: &str,
        settings: &ConnectionSettings,
    ) -> PersistenceResult<Arc<dyn DocumentDriver>> {
        self.opened
            .lock()
            .push((connection_string.to_string(), settings.clone()));
        if self.fail.load(Ordering::SeqCst) {
            return Err(PersistenceError::Backend("server selection timeout".to_string()));
        }
        Ok(Arc::clone(&self.driver) as Arc<dyn DocumentDriver>)
    }
}

/// Factory connected through a fresh [`RecordingConnector`]
pub async fn connected_factory() -> (DatabaseFactory, Arc<RecordingConnector>) {
    let connector = RecordingConnector::new("app");
    let factory = DatabaseFactory::with_connector(
        "mongodb://localhost:27017/app",
        Arc::clone(&connector) as Arc<dyn Connector>,
    )
    .expect("factory");
    factory
        .connect(ConnectOptions::new())
        .await
        .expect("connect");
    (factory, connector)
}

/// In-memory store with call counters and failure injection
#[derive(Debug, Default)]
pub struct CountingStore {
    pub inner: MemoryJsonStore,
    pub sets: AtomicUsize,
    pub gets: AtomicUsize,
    pub expires: AtomicUsize,
    pub fail_reads: AtomicBool,
    pub fail_writes: AtomicBool,
}

impl CountingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
            + self.gets.load(Ordering::SeqCst)
            + self.expires.load(Ordering::SeqCst)
    }

    fn broken() -> CacheError {
        CacheError::ConnectionError("connection reset by peer".to_string())
    }
}

#[async_trait]
impl JsonStore for CountingStore {
    fn backend_name(&self) -> &'static str {
        "counting"
    }

    async fn json_set(
        &self,
        key: &str,
        path: &str,
        value: &Value,
        condition: SetCondition,
    ) -> CacheResult<bool> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Self::broken());
        }
        self.inner.json_set(key, path, value, condition).await
    }

    async fn json_get(&self, key: &str, path: Option<&str>) -> CacheResult<Option<Value>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Self::broken());
        }
        self.inner.json_get(key, path).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<bool> {
        self.expires.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Self::broken());
        }
        self.inner.expire(key, ttl).await
    }

    async fn expire_at(&self, key: &str, at: DateTime<Utc>) -> CacheResult<bool> {
        self.expires.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Self::broken());
        }
        self.inner.expire_at(key, at).await
    }

    async fn ping(&self) -> CacheResult<()> {
        self.inner.ping().await
    }

    async fn close(&self) -> CacheResult<()> {
        self.inner.close().await
    }
}

/// Always connects to the same [`CountingStore`]
#[derive(Debug)]
pub struct CountingConnector {
    pub store: Arc<CountingStore>,
    pub connects: AtomicUsize,
    pub refuse: AtomicBool,
}

impl CountingConnector {
    pub fn new(store: Arc<CountingStore>) -> Arc<Self> {
        Arc::new(Self {
            store,
            connects: AtomicUsize::new(0),
            refuse: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl CacheConnector for CountingConnector {
    async fn connect(
        &self,
        _config: &CacheInstanceConfig,
        _events: CacheEvents,
    ) -> CacheResult<Arc<dyn JsonStore>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.refuse.load(Ordering::SeqCst) {
            return Err(CacheError::ConnectionError("connection refused".to_string()));
        }
        Ok(Arc::clone(&self.store) as Arc<dyn JsonStore>)
    }
}

pub fn cache_config(name: &str, enabled: bool) -> CacheInstanceConfig {
    CacheInstanceConfig {
        name: name.to_string(),
        enabled,
        backend: CacheBackendKind::Memory,
        host: "localhost".to_string(),
        ..CacheInstanceConfig::default()
    }
}

/// Client over a [`CountingStore`], connected when `enabled`
pub async fn counting_client(enabled: bool) -> (Arc<CacheClient>, Arc<CountingStore>) {
    let store = CountingStore::new();
    let connector = CountingConnector::new(Arc::clone(&store));
    let client = CacheClient::with_connector(cache_config("app", enabled), connector)
        .expect("cache client");
    client.connect().await.expect("cache connect");
    (Arc::new(client), store)
}

pub fn object_id(value: &Bson) -> ObjectId {
    value.as_object_id().expect("object id")
}
