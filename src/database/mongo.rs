//! MongoDB implementation of the driver seam
//!
//! Maps resolved commands onto the official `mongodb` driver. The Rust driver
//! has no socket timeout, so every call is bounded by the connection's
//! socket timeout. Writes the server cannot time-limit (inserts, updates and
//! deletes) are bounded by the smaller of that and their own time limit.

use super::connection::{ConnectionSettings, ReadConcernLevel};
use super::driver::{
    AggregateCommand, Connector, CountCommand, DeleteCommand, DeleteOutcome, DocumentDriver,
    DocumentStream, FindCommand, FindOneAndUpdateCommand, InsertCommand, UpdateCommand,
    UpdateOutcome, UpdateSpec,
};
use super::options::{ReadRouting, ReturnDocument};
use crate::error::{PersistenceError, PersistenceResult};
use async_trait::async_trait;
use bson::{doc, Document};
use futures::{StreamExt, TryStreamExt};
use mongodb::options::{self as mongo_options, ClientOptions, ReadConcern, ReadPreference, SelectionCriteria};
use mongodb::{Client, Collection, Database};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Database used when neither the options nor the connection string name one
const FALLBACK_DATABASE: &str = "test";

/// Opens [`MongoDriver`]s
#[derive(Debug, Default, Clone, Copy)]
pub struct MongoConnector;

#[async_trait]
impl Connector for MongoConnector {
    async fn open(
        &self,
        connection_string: &str,
        settings: &ConnectionSettings,
    ) -> PersistenceResult<Arc<dyn DocumentDriver>> {
        let mut options = ClientOptions::parse(connection_string).await?;
        options.retry_writes = Some(settings.retry_writes);
        options.connect_timeout = Some(settings.connect_timeout);
        options.read_concern = Some(read_concern(settings.read_concern));
        if let Some(app_name) = &settings.app_name {
            options.app_name = Some(app_name.clone());
        }
        if let Some(size) = settings.max_pool_size {
            options.max_pool_size = Some(size);
        }

        let database_name = settings
            .db_name
            .clone()
            .or_else(|| options.default_database.clone())
            .unwrap_or_else(|| FALLBACK_DATABASE.to_string());

        let client = Client::with_options(options)?;
        let driver = MongoDriver {
            database: client.database(&database_name),
            client,
            database_name,
            socket_timeout: settings.socket_timeout,
        };

        // The driver connects lazily; a ping proves the connection is usable
        driver.ping().await?;
        info!(database = %driver.database_name, "MongoDB connection established");

        Ok(Arc::new(driver))
    }
}

/// Driver bound to one MongoDB database
#[derive(Debug, Clone)]
pub struct MongoDriver {
    client: Client,
    database: Database,
    database_name: String,
    socket_timeout: Duration,
}

impl MongoDriver {
    fn collection(&self, name: &str) -> Collection<Document> {
        self.database.collection::<Document>(name)
    }

    async fn bounded<F, R>(&self, limit: Duration, operation: &str, call: F) -> PersistenceResult<R>
    where
        F: Future<Output = mongodb::error::Result<R>>,
    {
        match tokio::time::timeout(limit, call).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(PersistenceError::Timeout(format!(
                "{operation} exceeded {}ms",
                limit.as_millis()
            ))),
        }
    }

    fn write_limit(&self, max_time: Duration) -> Duration {
        max_time.min(self.socket_timeout)
    }
}

fn read_concern(level: ReadConcernLevel) -> ReadConcern {
    match level {
        ReadConcernLevel::Local => ReadConcern::local(),
        ReadConcernLevel::Available => ReadConcern::available(),
        ReadConcernLevel::Majority => ReadConcern::majority(),
        ReadConcernLevel::Linearizable => ReadConcern::linearizable(),
        ReadConcernLevel::Snapshot => ReadConcern::snapshot(),
    }
}

fn selection_criteria(routing: ReadRouting) -> SelectionCriteria {
    match routing {
        ReadRouting::Primary => SelectionCriteria::ReadPreference(ReadPreference::Primary),
        ReadRouting::SecondaryPreferred => {
            SelectionCriteria::ReadPreference(ReadPreference::SecondaryPreferred { options: None })
        }
    }
}

fn find_options(command: &FindCommand) -> mongo_options::FindOptions {
    let query = &command.options;
    let mut options = mongo_options::FindOptions::default();
    options.max_time = Some(query.max_time);
    options.selection_criteria = Some(selection_criteria(query.read_routing));
    options.projection = query.projection.clone();
    options.sort = query.sort.clone();
    options.skip = query.skip;
    options.limit = query.limit;
    options.batch_size = query.batch_size;
    options
}

fn update_modifications(update: UpdateSpec) -> mongodb::options::UpdateModifications {
    match update {
        UpdateSpec::Document(document) => mongodb::options::UpdateModifications::Document(document),
        UpdateSpec::Pipeline(stages) => mongodb::options::UpdateModifications::Pipeline(stages),
    }
}

#[async_trait]
impl DocumentDriver for MongoDriver {
    fn database_name(&self) -> &str {
        &self.database_name
    }

    async fn find(&self, collection: &str, command: FindCommand) -> PersistenceResult<Vec<Document>> {
        let options = find_options(&command);
        let coll = self.collection(collection);
        self.bounded(self.socket_timeout, "find", async move {
            coll.find(command.filter)
                .with_options(options)
                .await?
                .try_collect::<Vec<_>>()
                .await
        })
        .await
    }

    async fn find_stream(
        &self,
        collection: &str,
        command: FindCommand,
    ) -> PersistenceResult<DocumentStream> {
        let options = find_options(&command);
        let coll = self.collection(collection);
        let cursor = self
            .bounded(self.socket_timeout, "find", async move {
                coll.find(command.filter).with_options(options).await
            })
            .await?;
        Ok(cursor.map_err(PersistenceError::from).boxed())
    }

    async fn find_one(
        &self,
        collection: &str,
        command: FindCommand,
    ) -> PersistenceResult<Option<Document>> {
        let query = &command.options;
        let mut options = mongo_options::FindOneOptions::default();
        options.max_time = Some(query.max_time);
        options.selection_criteria = Some(selection_criteria(query.read_routing));
        options.projection = query.projection.clone();
        options.sort = query.sort.clone();
        options.skip = query.skip;

        let coll = self.collection(collection);
        self.bounded(self.socket_timeout, "findOne", async move {
            coll.find_one(command.filter).with_options(options).await
        })
        .await
    }

    async fn aggregate(
        &self,
        collection: &str,
        command: AggregateCommand,
    ) -> PersistenceResult<Vec<Document>> {
        let settings = &command.options;
        let mut options = mongo_options::AggregateOptions::default();
        options.allow_disk_use = Some(settings.allow_disk_use);
        options.max_time = Some(settings.max_time);
        options.batch_size = settings.batch_size;
        options.selection_criteria = Some(selection_criteria(settings.read_routing));

        // Aggregations may legitimately outlive the socket timeout
        let limit = settings.max_time.max(self.socket_timeout);
        let coll = self.collection(collection);
        self.bounded(limit, "aggregate", async move {
            coll.aggregate(command.pipeline)
                .with_options(options)
                .await?
                .try_collect::<Vec<_>>()
                .await
        })
        .await
    }

    async fn count(&self, collection: &str, command: CountCommand) -> PersistenceResult<u64> {
        let settings = &command.options;
        let mut options = mongo_options::CountOptions::default();
        options.max_time = Some(settings.max_time);
        options.selection_criteria = Some(selection_criteria(settings.read_routing));
        options.skip = settings.skip;
        options.limit = settings.limit;

        let coll = self.collection(collection);
        self.bounded(self.socket_timeout, "countDocuments", async move {
            coll.count_documents(command.filter)
                .with_options(options)
                .await
        })
        .await
    }

    async fn insert(&self, collection: &str, command: InsertCommand) -> PersistenceResult<()> {
        let coll = self.collection(collection);
        let result = self
            .bounded(self.write_limit(command.max_time), "insertMany", async move {
                coll.insert_many(command.documents).await
            })
            .await?;
        debug!(collection, inserted = result.inserted_ids.len(), "Documents inserted");
        Ok(())
    }

    async fn update(
        &self,
        collection: &str,
        command: UpdateCommand,
    ) -> PersistenceResult<UpdateOutcome> {
        let mut options = mongo_options::UpdateOptions::default();
        options.upsert = Some(command.upsert);
        options.array_filters = command.array_filters;
        let update = update_modifications(command.update);
        let filter = command.filter;
        let coll = self.collection(collection);

        let result = if command.multi {
            self.bounded(self.write_limit(command.max_time), "updateMany", async move {
                coll.update_many(filter, update).with_options(options).await
            })
            .await?
        } else {
            self.bounded(self.write_limit(command.max_time), "updateOne", async move {
                coll.update_one(filter, update).with_options(options).await
            })
            .await?
        };

        Ok(UpdateOutcome {
            matched_count: result.matched_count,
            modified_count: result.modified_count,
            upserted_id: result.upserted_id,
        })
    }

    async fn delete(
        &self,
        collection: &str,
        command: DeleteCommand,
    ) -> PersistenceResult<DeleteOutcome> {
        let filter = command.filter;
        let coll = self.collection(collection);
        let limit = self.write_limit(command.max_time);

        let result = if command.multi {
            self.bounded(limit, "deleteMany", async move { coll.delete_many(filter).await })
                .await?
        } else {
            self.bounded(limit, "deleteOne", async move { coll.delete_one(filter).await })
                .await?
        };

        // The driver only returns results for acknowledged writes
        Ok(DeleteOutcome {
            acknowledged: true,
            deleted_count: result.deleted_count,
        })
    }

    async fn find_one_and_update(
        &self,
        collection: &str,
        command: FindOneAndUpdateCommand,
    ) -> PersistenceResult<Option<Document>> {
        let settings = command.options;
        let mut options = mongo_options::FindOneAndUpdateOptions::default();
        options.return_document = Some(match settings.return_document {
            ReturnDocument::Before => mongo_options::ReturnDocument::Before,
            ReturnDocument::After => mongo_options::ReturnDocument::After,
        });
        options.upsert = Some(settings.upsert);
        options.max_time = Some(settings.max_time);
        options.projection = settings.projection;
        options.sort = settings.sort;
        options.array_filters = settings.array_filters;

        let update = update_modifications(command.update);
        let filter = command.filter;
        let coll = self.collection(collection);
        self.bounded(self.socket_timeout, "findOneAndUpdate", async move {
            coll.find_one_and_update(filter, update)
                .with_options(options)
                .await
        })
        .await
    }

    async fn ping(&self) -> PersistenceResult<()> {
        let database = self.database.clone();
        self.bounded(self.socket_timeout, "ping", async move {
            database.run_command(doc! { "ping": 1 }).await
        })
        .await?;
        Ok(())
    }

    async fn close(&self) -> PersistenceResult<()> {
        self.client.clone().shutdown().await;
        debug!(database = %self.database_name, "MongoDB client shut down");
        Ok(())
    }
}
