//! Storage engine boundary
//!
//! These traits describe the asynchronous key-value/index engine this crate
//! sits on top of. The engine owns persistence, durability and transaction
//! semantics; this crate only opens connections, drives schema upgrades and
//! relays reads and writes. Implementations exist for:
//!
//! - **Memory**: [`MemoryEngine`](crate::memory::MemoryEngine), for tests and native callers
//! - **IndexedDB**: the `objectstore-indexeddb` crate (browser WASM)
//!
//! All futures are single-threaded. Nothing here requires `Send`, matching
//! the cooperative event loop the browser engine runs on.

#![allow(async_fn_in_trait)]

use crate::config::IndexConfig;
use crate::error::{EngineError, OpenError};
use crate::key::{Key, Record};
use crate::upgrade::SchemaUpgrader;

/// Result type for engine calls
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Access mode of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionMode {
    ReadOnly,
    ReadWrite,
}

impl TransactionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionMode::ReadOnly => "readonly",
            TransactionMode::ReadWrite => "readwrite",
        }
    }
}

/// Factory for versioned database connections.
pub trait StorageEngine {
    type Connection: Connection;

    /// Open `name` at `version`.
    ///
    /// When the stored version is lower than `version` (or the database does
    /// not exist yet) the engine enters a version change and must call
    /// [`SchemaUpgrader::upgrade`] with its upgrade context before the
    /// connection is handed out. A failing upgrade aborts the version change
    /// and the open fails with [`OpenError::Upgrade`].
    async fn open(
        &self,
        name: &str,
        version: u32,
        upgrader: SchemaUpgrader,
    ) -> Result<Self::Connection, OpenError>;

    /// Delete a database and everything in it.
    async fn delete_database(&self, name: &str) -> EngineResult<()>;
}

/// Schema operations available only while a version change is in progress.
pub trait UpgradeTransaction {
    /// Version stored before this upgrade (0 for a new database).
    fn old_version(&self) -> u32;

    /// Version being upgraded to.
    fn new_version(&self) -> u32;

    fn contains_store(&self, name: &str) -> bool;

    fn delete_store(&mut self, name: &str) -> EngineResult<()>;

    fn create_store(&mut self, name: &str, key_path: &str) -> EngineResult<()>;

    fn create_index(&mut self, store: &str, index: &IndexConfig) -> EngineResult<()>;
}

/// An open, versioned database connection.
pub trait Connection {
    type Transaction: Transaction;

    fn name(&self) -> &str;

    fn version(&self) -> u32;

    /// Names of the stores currently present, sorted.
    fn store_names(&self) -> Vec<String>;

    /// Start a transaction scoped to a single store.
    fn transaction(&self, store: &str, mode: TransactionMode) -> EngineResult<Self::Transaction>;

    fn close(&self);
}

/// A transaction over one store.
pub trait Transaction {
    type ObjectStore: ObjectStore;

    fn mode(&self) -> TransactionMode;

    fn object_store(&self, store: &str) -> EngineResult<Self::ObjectStore>;

    /// Wait until the transaction has committed.
    async fn complete(&self) -> EngineResult<()>;
}

/// A store handle obtained from a transaction.
pub trait ObjectStore {
    type Index: Index;

    fn name(&self) -> String;

    /// Insert or replace a record, keyed by the store's key path.
    async fn put(&self, record: &Record) -> EngineResult<Key>;

    async fn get(&self, key: &Key) -> EngineResult<Option<Record>>;

    /// Delete by key. Deleting an absent key succeeds.
    async fn delete(&self, key: &Key) -> EngineResult<()>;

    async fn count(&self) -> EngineResult<usize>;

    fn index(&self, name: &str) -> EngineResult<Self::Index>;
}

/// A secondary index handle obtained from a store.
pub trait Index {
    fn name(&self) -> String;

    fn key_path(&self) -> String;

    fn unique(&self) -> bool;

    /// First record whose indexed value equals `key`.
    async fn get(&self, key: &Key) -> EngineResult<Option<Record>>;

    /// Every record whose indexed value equals `key`, in primary key order.
    async fn get_all(&self, key: &Key) -> EngineResult<Vec<Record>>;
}
