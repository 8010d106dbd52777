//! IndexedDB implementation of the object store engine traits.
//!
//! Every handle here wraps the matching web-sys type; requests are awaited
//! through the promise helpers in [`crate::idb`].

use js_sys::Promise;
use objectstore_core::{
    Connection, EngineResult, Index, IndexConfig, Key, ObjectStore, OpenError,
    Record, SchemaUpgrader, StorageEngine, Transaction, TransactionMode, UpgradeTransaction,
};
use tracing::debug;
use wasm_bindgen::JsValue;
use web_sys::{IdbDatabase, IdbIndex, IdbObjectStore, IdbTransaction, IdbTransactionMode};

use crate::convert::{js_array_to_records, js_to_key, js_to_record, key_to_js, record_to_js};
use crate::error::engine_error;
use crate::idb;

/// The browser's IndexedDB, reached through the global `indexedDB` factory.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexedDbEngine;

impl IndexedDbEngine {
    pub fn new() -> Self {
        Self
    }
}

impl StorageEngine for IndexedDbEngine {
    type Connection = IndexedDbConnection;

    async fn open(
        &self,
        name: &str,
        version: u32,
        upgrader: SchemaUpgrader,
    ) -> Result<IndexedDbConnection, OpenError> {
        let db = idb::open_database(name, version, upgrader).await?;
        Ok(IndexedDbConnection {
            name: name.to_string(),
            version,
            db,
        })
    }

    async fn delete_database(&self, name: &str) -> EngineResult<()> {
        idb::delete_database(name).await
    }
}

/// The version change context handed out during `upgradeneeded`.
pub struct IndexedDbUpgrade {
    db: IdbDatabase,
    tx: IdbTransaction,
    old_version: u32,
    new_version: u32,
}

impl IndexedDbUpgrade {
    pub(crate) fn new(db: IdbDatabase, tx: IdbTransaction, old_version: u32, new_version: u32) -> Self {
        Self {
            db,
            tx,
            old_version,
            new_version,
        }
    }
}

impl UpgradeTransaction for IndexedDbUpgrade {
    fn old_version(&self) -> u32 {
        self.old_version
    }

    fn new_version(&self) -> u32 {
        self.new_version
    }

    fn contains_store(&self, name: &str) -> bool {
        self.db.object_store_names().contains(name)
    }

    fn delete_store(&mut self, name: &str) -> EngineResult<()> {
        self.db.delete_object_store(name).map_err(engine_error)
    }

    fn create_store(&mut self, name: &str, key_path: &str) -> EngineResult<()> {
        let params = web_sys::IdbObjectStoreParameters::new();
        js_sys::Reflect::set(&params, &"keyPath".into(), &key_path.into()).map_err(engine_error)?;
        self.db
            .create_object_store_with_optional_parameters(name, &params)
            .map_err(engine_error)?;
        Ok(())
    }

    fn create_index(&mut self, store: &str, index: &IndexConfig) -> EngineResult<()> {
        let object_store = self.tx.object_store(store).map_err(engine_error)?;
        let params = web_sys::IdbIndexParameters::new();
        js_sys::Reflect::set(&params, &"unique".into(), &JsValue::from_bool(index.unique))
            .map_err(engine_error)?;
        object_store
            .create_index_with_str_and_optional_parameters(&index.name, &index.path, &params)
            .map_err(engine_error)?;
        Ok(())
    }
}

/// An open IndexedDB connection.
#[derive(Debug, Clone)]
pub struct IndexedDbConnection {
    name: String,
    version: u32,
    db: IdbDatabase,
}

impl IndexedDbConnection {
    /// The raw web-sys database handle.
    pub fn database(&self) -> &IdbDatabase {
        &self.db
    }
}

impl Connection for IndexedDbConnection {
    type Transaction = IndexedDbTransaction;

    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> u32 {
        self.version
    }

    fn store_names(&self) -> Vec<String> {
        let list = self.db.object_store_names();
        let mut names: Vec<String> = (0..list.length()).filter_map(|i| list.item(i)).collect();
        names.sort();
        names
    }

    fn transaction(&self, store: &str, mode: TransactionMode) -> EngineResult<IndexedDbTransaction> {
        let idb_mode = match mode {
            TransactionMode::ReadOnly => IdbTransactionMode::Readonly,
            TransactionMode::ReadWrite => IdbTransactionMode::Readwrite,
        };
        let tx = self
            .db
            .transaction_with_str_and_mode(store, idb_mode)
            .map_err(engine_error)?;
        debug!(store, mode = mode.as_str(), "Started transaction");

        // Listen for completion right away so a fast commit is never missed
        let done = idb::transaction_to_promise(&tx);
        Ok(IndexedDbTransaction { tx, mode, done })
    }

    fn close(&self) {
        self.db.close();
    }
}

/// A transaction over one IndexedDB object store.
#[derive(Debug, Clone)]
pub struct IndexedDbTransaction {
    tx: IdbTransaction,
    mode: TransactionMode,
    done: Promise,
}

impl IndexedDbTransaction {
    /// The raw web-sys transaction handle.
    pub fn raw(&self) -> &IdbTransaction {
        &self.tx
    }
}

impl Transaction for IndexedDbTransaction {
    type ObjectStore = IndexedDbObjectStore;

    fn mode(&self) -> TransactionMode {
        self.mode
    }

    fn object_store(&self, store: &str) -> EngineResult<IndexedDbObjectStore> {
        let store = self.tx.object_store(store).map_err(engine_error)?;
        Ok(IndexedDbObjectStore { store })
    }

    async fn complete(&self) -> EngineResult<()> {
        idb::await_transaction(&self.done).await
    }
}

/// An IndexedDB object store handle.
#[derive(Debug, Clone)]
pub struct IndexedDbObjectStore {
    store: IdbObjectStore,
}

impl ObjectStore for IndexedDbObjectStore {
    type Index = IndexedDbIndex;

    fn name(&self) -> String {
        self.store.name()
    }

    async fn put(&self, record: &Record) -> EngineResult<Key> {
        let js_val = record_to_js(record)?;
        let req = self.store.put(&js_val).map_err(engine_error)?;
        let key = idb::await_request(&req).await?;
        js_to_key(&key)
    }

    async fn get(&self, key: &Key) -> EngineResult<Option<Record>> {
        let req = self.store.get(&key_to_js(key)).map_err(engine_error)?;
        let result = idb::await_request(&req).await?;
        if result.is_undefined() || result.is_null() {
            return Ok(None);
        }
        js_to_record(&result).map(Some)
    }

    async fn delete(&self, key: &Key) -> EngineResult<()> {
        let req = self.store.delete(&key_to_js(key)).map_err(engine_error)?;
        idb::await_request(&req).await?;
        Ok(())
    }

    async fn count(&self) -> EngineResult<usize> {
        let req = self.store.count().map_err(engine_error)?;
        let result = idb::await_request(&req).await?;
        Ok(result.as_f64().unwrap_or(0.0) as usize)
    }

    fn index(&self, name: &str) -> EngineResult<IndexedDbIndex> {
        let index = self.store.index(name).map_err(engine_error)?;
        Ok(IndexedDbIndex { index })
    }
}

/// An IndexedDB index handle.
#[derive(Debug, Clone)]
pub struct IndexedDbIndex {
    index: IdbIndex,
}

impl Index for IndexedDbIndex {
    fn name(&self) -> String {
        self.index.name()
    }

    fn key_path(&self) -> String {
        self.index
            .key_path()
            .ok()
            .and_then(|path| path.as_string())
            .unwrap_or_default()
    }

    fn unique(&self) -> bool {
        self.index.unique()
    }

    async fn get(&self, key: &Key) -> EngineResult<Option<Record>> {
        let req = self.index.get(&key_to_js(key)).map_err(engine_error)?;
        let result = idb::await_request(&req).await?;
        if result.is_undefined() || result.is_null() {
            return Ok(None);
        }
        js_to_record(&result).map(Some)
    }

    async fn get_all(&self, key: &Key) -> EngineResult<Vec<Record>> {
        let req = self
            .index
            .get_all_with_key(&key_to_js(key))
            .map_err(engine_error)?;
        let result = idb::await_request(&req).await?;
        js_array_to_records(&result)
    }
}

