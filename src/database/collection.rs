//! # Collection Façade
//!
//! Typed access to one collection of an open [`Connection`]. Each operation
//! shapes its request with the default query policy (secondary-preferred
//! reads, the connection time limit, lean results) unless the caller
//! overrides a setting, then delegates to the connection's driver.
//!
//! Driver failures propagate unmodified. Deleting or updating nothing is
//! reported as `false`, not as an error.
//!
//! Updates of timestamped entities refresh `updatedAt`, which the server
//! counts as a modification. Use `UpdateOptions::timestamps(false)` when an
//! update that changes nothing else has to report `false`.
//!
//! ```rust,no_run
//! use bson::doc;
//! use persistence_core::database::{ConnectOptions, DatabaseFactory, FindOptions};
//! use persistence_core::models::User;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let factory = DatabaseFactory::new("mongodb://localhost:27017")?;
//! factory.connect(ConnectOptions::new().db_name("app")).await?;
//! let users = factory.create_collection::<User>("users")?;
//!
//! let recent = users
//!     .find(doc! {}, FindOptions::new().sort(doc! { "createdAt": -1 }).limit(10))
//!     .await?;
//! # Ok(())
//! # }
//! ```

use super::connection::Connection;
use super::cursor::EntityCursor;
use super::driver::{
    AggregateCommand, CountCommand, DeleteCommand, DocumentDriver, FindCommand,
    FindOneAndUpdateCommand, InsertCommand, UpdateCommand, UpdateSpec,
};
use super::options::{
    AggregateOptions, AggregateSettings, CountOptions, DeleteOptions, FindOneAndUpdateOptions,
    FindOptions, LeanMode, UpdateOptions,
};
use super::schema::{prepare_update, stamp_insert, Entity};
use crate::constants::fields;
use crate::error::{PersistenceError, PersistenceResult};
use bson::oid::ObjectId;
use bson::{doc, Bson, DateTime, Document};
use serde::de::DeserializeOwned;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Reference resolution for [`Collection::find_populated`]
#[derive(Debug, Clone, PartialEq)]
pub struct Populate {
    /// Field holding the reference; the resolved value replaces it
    pub path: String,
    /// Collection the reference points into
    pub from: String,
    pub foreign_field: String,
    /// Resolve to a single document instead of an array
    pub single: bool,
    pub projection: Option<Document>,
}

impl Populate {
    pub fn new<P: Into<String>, F: Into<String>>(path: P, from: F) -> Self {
        Self {
            path: path.into(),
            from: from.into(),
            foreign_field: fields::ID.to_string(),
            single: true,
            projection: None,
        }
    }

    pub fn foreign_field<F: Into<String>>(mut self, field: F) -> Self {
        self.foreign_field = field.into();
        self
    }

    /// Keep every match as an array
    pub fn many(mut self) -> Self {
        self.single = false;
        self
    }

    pub fn projection(mut self, projection: Document) -> Self {
        self.projection = Some(projection);
        self
    }

    fn stages(&self) -> Vec<Document> {
        let mut stages = vec![doc! {
            "$lookup": {
                "from": self.from.as_str(),
                "localField": self.path.as_str(),
                "foreignField": self.foreign_field.as_str(),
                "as": self.path.as_str(),
            }
        }];
        if self.single {
            stages.push(doc! {
                "$unwind": {
                    "path": format!("${}", self.path),
                    "preserveNullAndEmptyArrays": true,
                }
            });
        }
        stages
    }
}

/// Typed façade over one collection
pub struct Collection<T> {
    name: String,
    connection: Arc<Connection>,
    _entity: PhantomData<fn() -> T>,
}

impl<T> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            connection: Arc::clone(&self.connection),
            _entity: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Collection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name)
            .field("database", &self.connection.database_name())
            .finish()
    }
}

impl<T: Entity> Collection<T> {
    pub(crate) fn new(name: &str, connection: Arc<Connection>) -> Self {
        Self {
            name: name.to_string(),
            connection,
            _entity: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    fn driver(&self) -> PersistenceResult<&Arc<dyn DocumentDriver>> {
        self.connection.driver()
    }

    fn default_timeout(&self) -> Duration {
        self.connection.default_timeout()
    }

    /// Run an aggregation pipeline
    pub async fn aggregate<R: DeserializeOwned>(
        &self,
        pipeline: Vec<Document>,
        options: AggregateOptions,
    ) -> PersistenceResult<Vec<R>> {
        let command = AggregateCommand {
            pipeline,
            options: options.resolve(),
        };
        self.driver()?
            .aggregate(&self.name, command)
            .await?
            .into_iter()
            .map(|document| bson::from_document(document).map_err(PersistenceError::from))
            .collect()
    }

    pub async fn count(&self, filter: Document, options: CountOptions) -> PersistenceResult<u64> {
        let command = CountCommand {
            filter,
            options: options.resolve(self.default_timeout()),
        };
        self.driver()?.count(&self.name, command).await
    }

    /// Insert one entity and return it as stored
    pub async fn create(&self, entity: &T) -> PersistenceResult<T> {
        let mut created = self.create_documents(std::slice::from_ref(entity)).await?;
        created
            .pop()
            .ok_or_else(|| PersistenceError::Backend("insert returned no document".to_string()))
    }

    /// Insert several entities in one round-trip
    pub async fn create_many(&self, entities: &[T]) -> PersistenceResult<Vec<T>> {
        self.create_documents(entities).await
    }

    async fn create_documents(&self, entities: &[T]) -> PersistenceResult<Vec<T>> {
        if entities.is_empty() {
            return Ok(Vec::new());
        }

        let now = DateTime::now();
        let mut documents = Vec::with_capacity(entities.len());
        for entity in entities {
            entity.validate().map_err(PersistenceError::Validation)?;

            let mut document = bson::to_document(entity)?;
            if matches!(document.get(fields::ID), None | Some(Bson::Null)) {
                document.insert(fields::ID, ObjectId::new());
            }
            stamp_insert::<T>(&mut document, now);
            documents.push(document);
        }

        let command = InsertCommand {
            documents: documents.clone(),
            max_time: self.default_timeout(),
        };
        self.driver()?.insert(&self.name, command).await?;

        documents
            .into_iter()
            .map(|document| bson::from_document(document).map_err(PersistenceError::from))
            .collect()
    }

    /// `true` when a document was removed
    pub async fn delete_one(
        &self,
        filter: Document,
        options: DeleteOptions,
    ) -> PersistenceResult<bool> {
        self.delete(filter, false, options).await
    }

    /// `true` when at least one document was removed
    pub async fn delete_many(
        &self,
        filter: Document,
        options: DeleteOptions,
    ) -> PersistenceResult<bool> {
        self.delete(filter, true, options).await
    }

    async fn delete(
        &self,
        filter: Document,
        multi: bool,
        options: DeleteOptions,
    ) -> PersistenceResult<bool> {
        let command = DeleteCommand {
            filter,
            multi,
            max_time: options.max_time.unwrap_or(self.default_timeout()),
        };
        let outcome = self.driver()?.delete(&self.name, command).await?;
        debug!(
            collection = %self.name,
            deleted = outcome.deleted_count,
            acknowledged = outcome.acknowledged,
            "Delete completed"
        );
        Ok(outcome.succeeded())
    }

    /// Lean, decoded results
    pub async fn find(&self, filter: Document, options: FindOptions) -> PersistenceResult<Vec<T>> {
        let command = FindCommand {
            filter,
            options: options.resolve(self.default_timeout()),
        };
        let lean = command.options.lean;
        self.driver()?
            .find(&self.name, command)
            .await?
            .into_iter()
            .map(|document| decode::<T>(document, lean))
            .collect()
    }

    /// Plain documents, for projections that do not fit `T`
    pub async fn find_documents(
        &self,
        filter: Document,
        options: FindOptions,
    ) -> PersistenceResult<Vec<Document>> {
        let command = FindCommand {
            filter,
            options: options.resolve(self.default_timeout()),
        };
        let lean = command.options.lean;
        let mut documents = self.driver()?.find(&self.name, command).await?;
        if lean.is_some_and(|mode| mode.getters) {
            documents.iter_mut().for_each(T::apply_getters);
        }
        Ok(documents)
    }

    /// Stream results in batches (250 unless overridden)
    pub async fn find_cursor(
        &self,
        filter: Document,
        options: FindOptions,
    ) -> PersistenceResult<EntityCursor<T>> {
        let command = FindCommand {
            filter,
            options: options.cursor().resolve(self.default_timeout()),
        };
        let documents = self.driver()?.find_stream(&self.name, command).await?;
        Ok(EntityCursor::new(documents))
    }

    /// Find with referenced documents resolved in place
    pub async fn find_populated(
        &self,
        filter: Document,
        populate: &[Populate],
        options: FindOptions,
    ) -> PersistenceResult<Vec<Document>> {
        let resolved = options.resolve(self.default_timeout());

        let mut pipeline = vec![doc! { "$match": filter }];
        if let Some(sort) = &resolved.sort {
            pipeline.push(doc! { "$sort": sort.clone() });
        }
        if let Some(skip) = resolved.skip {
            let skip = i64::try_from(skip).unwrap_or(i64::MAX);
            pipeline.push(doc! { "$skip": skip });
        }
        if let Some(limit) = resolved.limit {
            pipeline.push(doc! { "$limit": limit });
        }
        let mut projection = resolved.projection.clone().unwrap_or_default();
        for reference in populate {
            pipeline.extend(reference.stages());
            if let Some(fields) = &reference.projection {
                for (field, value) in fields {
                    projection.insert(format!("{}.{}", reference.path, field), value.clone());
                }
            }
        }
        if !projection.is_empty() {
            pipeline.push(doc! { "$project": projection });
        }

        let command = AggregateCommand {
            pipeline,
            options: AggregateSettings {
                allow_disk_use: false,
                read_routing: resolved.read_routing,
                max_time: resolved.max_time,
                batch_size: resolved.batch_size,
            },
        };
        let mut documents = self.driver()?.aggregate(&self.name, command).await?;
        if resolved.lean.is_some_and(|mode| mode.getters) {
            documents.iter_mut().for_each(T::apply_getters);
        }
        Ok(documents)
    }

    pub async fn find_by_id<I: Into<Bson>>(
        &self,
        id: I,
        options: FindOptions,
    ) -> PersistenceResult<Option<T>> {
        let mut filter = Document::new();
        filter.insert(fields::ID, id.into());
        self.find_one(filter, options).await
    }

    pub async fn find_one(
        &self,
        filter: Document,
        options: FindOptions,
    ) -> PersistenceResult<Option<T>> {
        let command = FindCommand {
            filter,
            options: options.resolve(self.default_timeout()),
        };
        let lean = command.options.lean;
        self.driver()?
            .find_one(&self.name, command)
            .await?
            .map(|document| decode::<T>(document, lean))
            .transpose()
    }

    /// Atomically update one document; `None` when nothing matched
    pub async fn find_one_and_update<U: Into<UpdateSpec>>(
        &self,
        filter: Document,
        update: U,
        options: FindOneAndUpdateOptions,
    ) -> PersistenceResult<Option<T>> {
        let settings = options.resolve(self.default_timeout());
        let update = prepare_update::<T>(
            update.into(),
            settings.upsert,
            settings.set_defaults_on_insert,
            settings.timestamps,
            DateTime::now(),
        );
        let lean = settings.lean;
        let command = FindOneAndUpdateCommand {
            filter,
            update,
            options: settings,
        };
        self.driver()?
            .find_one_and_update(&self.name, command)
            .await?
            .map(|document| decode::<T>(document, lean))
            .transpose()
    }

    /// Update or insert one document and return its new state
    pub async fn find_one_and_upsert<U: Into<UpdateSpec>>(
        &self,
        filter: Document,
        update: U,
        options: FindOneAndUpdateOptions,
    ) -> PersistenceResult<T> {
        let options = options.upsert(true).return_new(true);
        self.find_one_and_update(filter, update, options)
            .await?
            .ok_or_else(|| PersistenceError::Backend("upsert returned no document".to_string()))
    }

    /// `true` when a document matched and was modified
    pub async fn update_one<U: Into<UpdateSpec>>(
        &self,
        filter: Document,
        update: U,
        options: UpdateOptions,
    ) -> PersistenceResult<bool> {
        self.update(filter, update.into(), false, options).await
    }

    /// `true` when documents matched and at least one was modified
    pub async fn update_many<U: Into<UpdateSpec>>(
        &self,
        filter: Document,
        update: U,
        options: UpdateOptions,
    ) -> PersistenceResult<bool> {
        self.update(filter, update.into(), true, options).await
    }

    async fn update(
        &self,
        filter: Document,
        update: UpdateSpec,
        multi: bool,
        options: UpdateOptions,
    ) -> PersistenceResult<bool> {
        let update = prepare_update::<T>(
            update,
            options.upsert,
            options.set_defaults_on_insert.unwrap_or(true),
            options.timestamps.unwrap_or(true),
            DateTime::now(),
        );
        let command = UpdateCommand {
            filter,
            update,
            multi,
            upsert: options.upsert,
            array_filters: options.array_filters,
            max_time: options.max_time.unwrap_or(self.default_timeout()),
        };
        let outcome = self.driver()?.update(&self.name, command).await?;
        debug!(
            collection = %self.name,
            matched = outcome.matched_count,
            modified = outcome.modified_count,
            upserted = outcome.upserted_id.is_some(),
            "Update completed"
        );
        Ok(outcome.succeeded())
    }
}

fn decode<T: Entity>(mut document: Document, lean: Option<LeanMode>) -> PersistenceResult<T> {
    if lean.is_some_and(|mode| mode.getters) {
        T::apply_getters(&mut document);
    }
    Ok(bson::from_document(document)?)
}
