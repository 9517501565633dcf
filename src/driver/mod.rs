/// # Driver Module
///
/// Driver seam between a `Session` and the database it forwards to.
///
/// A driver hands out a client handle; the client hands out database
/// handles; a database hands out collection handles. Sessions only ever talk
/// to these traits, so the real MongoDB driver and the in-memory driver are
/// interchangeable.

pub mod matcher;
pub mod memory;
pub mod mongo;

use crate::core::db::ConnectionSettings;
use mongodb::bson::{Bson, Document};
use thiserror::Error;

pub use memory::MemoryDriver;
pub use mongo::MongoDriver;

/// Errors raised by a driver implementation.
#[derive(Error, Debug)]
pub enum DriverError {
    /// Any error surfaced by the `mongodb` crate
    #[error(transparent)]
    Mongo(#[from] mongodb::error::Error),

    /// A document with the same `_id` already exists in the collection
    #[error("E11000 duplicate key error collection: {namespace} dup key: {{ _id: {key} }}")]
    DuplicateKey { namespace: String, key: String },

    /// A bulk insert stopped (ordered) or finished (unordered) with failures
    #[error("bulk write failed after inserting {inserted} document(s): {message}")]
    BulkWrite { inserted: usize, message: String },

    /// A malformed filter, update specification or document
    #[error("{0}")]
    BadValue(String),

    /// The client handle was used after being closed
    #[error("client has been closed")]
    Closed,

    /// The in-memory store's lock was poisoned by a panicking writer
    #[error("Failed to acquire memory store lock")]
    Lock,
}

pub type DriverResult<T> = std::result::Result<T, DriverError>;

/// Counts reported by an update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub matched: u64,
    pub modified: u64,
}

/// Creates client handles from connection settings.
pub trait Driver: Send {
    fn connect(&self, settings: &ConnectionSettings) -> DriverResult<Box<dyn ClientHandle>>;
}

/// An established connection.
pub trait ClientHandle: Send {
    /// Binds a database by name. Binding is lazy and does not check existence.
    fn database(&self, name: &str) -> DriverResult<Box<dyn DatabaseHandle>>;

    /// Releases the connection.
    fn close(self: Box<Self>);
}

pub trait DatabaseHandle: Send {
    fn name(&self) -> &str;

    /// Binds a collection by name. Binding is lazy and does not check existence.
    fn collection(&self, name: &str) -> DriverResult<Box<dyn CollectionHandle>>;
}

/// CRUD primitives on one collection.
pub trait CollectionHandle: Send {
    fn name(&self) -> &str;

    /// Inserts one document and returns its `_id`, generated when absent.
    fn insert_one(&self, document: Document) -> DriverResult<Bson>;

    /// Inserts documents and returns their ids in input order.
    ///
    /// With `ordered` set, insertion stops at the first failure and the
    /// documents before it stay persisted.
    fn insert_many(&self, documents: Vec<Document>, ordered: bool) -> DriverResult<Vec<Bson>>;

    /// Runs a query. A `limit` of zero means no limit.
    fn find(&self, filter: Document, limit: u64) -> DriverResult<Vec<Document>>;

    fn update_one(&self, filter: Document, update: Document) -> DriverResult<UpdateOutcome>;

    fn update_many(&self, filter: Document, update: Document) -> DriverResult<UpdateOutcome>;

    /// Returns the number of deleted documents, 0 or 1.
    fn delete_one(&self, filter: Document) -> DriverResult<u64>;

    fn delete_many(&self, filter: Document) -> DriverResult<u64>;
}
