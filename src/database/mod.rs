//! # Document Store
//!
//! Connection management and typed collection access for MongoDB-compatible
//! document stores.
//!
//! ## Key Components
//!
//! - [`connection`] - [`DatabaseFactory`] and the shared [`Connection`] handle
//! - [`collection`] - [`Collection`] façade with default query policy
//! - [`schema`] - [`Entity`] trait, timestamps and upsert defaults
//! - [`options`] - per-operation options and their resolution
//! - [`driver`] - the [`DocumentDriver`] seam every operation goes through
//! - [`mongo`] - the MongoDB driver implementation
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use bson::doc;
//! use persistence_core::database::{ConnectOptions, DatabaseFactory, FindOptions};
//! use persistence_core::models::User;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let factory = DatabaseFactory::new("mongodb://localhost:27017")?;
//! factory.connect(ConnectOptions::new().db_name("app")).await?;
//!
//! let users = factory.create_collection::<User>("users")?;
//! let ada = users
//!     .find_one(doc! { "username": "ada" }, FindOptions::new().read_secondary(false))
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod collection;
pub mod connection;
pub mod cursor;
pub mod driver;
pub mod mongo;
pub mod options;
pub mod schema;

pub use collection::{Collection, Populate};
pub use connection::{
    ConnectOptions, Connection, ConnectionSettings, DatabaseFactory, ReadConcernLevel,
};
pub use cursor::EntityCursor;
pub use driver::{
    AggregateCommand, Connector, CountCommand, DeleteCommand, DeleteOutcome, DocumentDriver,
    DocumentStream, FindCommand, FindOneAndUpdateCommand, InsertCommand, UpdateCommand,
    UpdateOutcome, UpdateSpec,
};
pub use mongo::{MongoConnector, MongoDriver};
pub use options::{
    AggregateOptions, AggregateSettings, CountOptions, CountSettings, DeleteOptions,
    FindOneAndUpdateOptions, FindOneAndUpdateSettings, FindOptions, LeanMode, QueryOptions,
    ReadRouting, ReturnDocument, UpdateOptions,
};
pub use schema::{Entity, SchemaOptions};
