//! Document driver seam
//!
//! The façade never talks to a concrete client. Every operation is shaped
//! into a fully resolved command (filter or pipeline plus the effective query
//! options) and handed to a [`DocumentDriver`] bound to one open database.
//! [`MongoDriver`](super::mongo::MongoDriver) is the production
//! implementation.

use super::connection::ConnectionSettings;
use super::options::{AggregateSettings, CountSettings, FindOneAndUpdateSettings, QueryOptions};
use crate::error::PersistenceResult;
use async_trait::async_trait;
use bson::{Bson, Document};
use futures::stream::BoxStream;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Documents streamed from a cursor-mode read
pub type DocumentStream = BoxStream<'static, PersistenceResult<Document>>;

/// `find` / `findOne` / `findById` request
#[derive(Debug, Clone, PartialEq)]
pub struct FindCommand {
    pub filter: Document,
    pub options: QueryOptions,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregateCommand {
    pub pipeline: Vec<Document>,
    pub options: AggregateSettings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CountCommand {
    pub filter: Document,
    pub options: CountSettings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertCommand {
    pub documents: Vec<Document>,
    pub max_time: Duration,
}

/// Update modifications, either operator documents or an aggregation pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateSpec {
    Document(Document),
    Pipeline(Vec<Document>),
}

impl From<Document> for UpdateSpec {
    fn from(document: Document) -> Self {
        Self::Document(document)
    }
}

impl From<Vec<Document>> for UpdateSpec {
    fn from(pipeline: Vec<Document>) -> Self {
        Self::Pipeline(pipeline)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateCommand {
    pub filter: Document,
    pub update: UpdateSpec,
    /// `updateMany` when true, `updateOne` otherwise
    pub multi: bool,
    pub upsert: bool,
    pub array_filters: Option<Vec<Document>>,
    pub max_time: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteCommand {
    pub filter: Document,
    /// `deleteMany` when true, `deleteOne` otherwise
    pub multi: bool,
    pub max_time: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FindOneAndUpdateCommand {
    pub filter: Document,
    pub update: UpdateSpec,
    pub options: FindOneAndUpdateSettings,
}

/// Raw result of a delete as reported by the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeleteOutcome {
    pub acknowledged: bool,
    pub deleted_count: u64,
}

impl DeleteOutcome {
    /// Deleting nothing is reported as `false`, not as an error
    pub fn succeeded(&self) -> bool {
        self.acknowledged && self.deleted_count > 0
    }
}

/// Raw result of an update as reported by the driver
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UpdateOutcome {
    pub matched_count: u64,
    pub modified_count: u64,
    pub upserted_id: Option<Bson>,
}

impl UpdateOutcome {
    /// A match that changed nothing is reported as `false`
    pub fn succeeded(&self) -> bool {
        self.matched_count > 0 && self.modified_count > 0
    }
}

/// Operations against one open database
#[async_trait]
pub trait DocumentDriver: Send + Sync + fmt::Debug {
    /// Name of the database every collection resolves against
    fn database_name(&self) -> &str;

    async fn find(&self, collection: &str, command: FindCommand) -> PersistenceResult<Vec<Document>>;

    /// Cursor-mode read; documents arrive in `batch_size` round-trips
    async fn find_stream(
        &self,
        collection: &str,
        command: FindCommand,
    ) -> PersistenceResult<DocumentStream>;

    async fn find_one(
        &self,
        collection: &str,
        command: FindCommand,
    ) -> PersistenceResult<Option<Document>>;

    async fn aggregate(
        &self,
        collection: &str,
        command: AggregateCommand,
    ) -> PersistenceResult<Vec<Document>>;

    async fn count(&self, collection: &str, command: CountCommand) -> PersistenceResult<u64>;

    async fn insert(&self, collection: &str, command: InsertCommand) -> PersistenceResult<()>;

    async fn update(
        &self,
        collection: &str,
        command: UpdateCommand,
    ) -> PersistenceResult<UpdateOutcome>;

    async fn delete(
        &self,
        collection: &str,
        command: DeleteCommand,
    ) -> PersistenceResult<DeleteOutcome>;

    async fn find_one_and_update(
        &self,
        collection: &str,
        command: FindOneAndUpdateCommand,
    ) -> PersistenceResult<Option<Document>>;

    async fn ping(&self) -> PersistenceResult<()>;

    async fn close(&self) -> PersistenceResult<()>;
}

/// Opens a [`DocumentDriver`] for a connection string
#[async_trait]
pub trait Connector: Send + Sync + fmt::Debug {
    /// Resolves once the connection is usable
    async fn open(
        &self,
        connection_string: &str,
        settings: &ConnectionSettings,
    ) -> PersistenceResult<Arc<dyn DocumentDriver>>;
}
