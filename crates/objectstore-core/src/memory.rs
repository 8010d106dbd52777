//! In-memory storage engine
//!
//! A `BTreeMap`-based engine with the same observable semantics as the
//! browser engine for everything this crate relies on: versioned opens with
//! atomic upgrades, key path extraction, unique indexes, read-only
//! transactions and closed connections. Useful for:
//! - Unit and integration testing
//! - Native callers that don't need persistence

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use crate::config::IndexConfig;
use crate::engine::{
    Connection, EngineResult, Index, ObjectStore, StorageEngine, Transaction, TransactionMode,
    UpgradeTransaction,
};
use crate::error::{EngineError, OpenError};
use crate::key::{extract_key, resolve_key_path, Key, Record};
use crate::upgrade::SchemaUpgrader;

#[derive(Debug, Clone)]
struct StoreData {
    key_path: String,
    indexes: Vec<IndexConfig>,
    records: BTreeMap<Key, Record>,
}

impl StoreData {
    fn index(&self, name: &str) -> Option<&IndexConfig> {
        self.indexes.iter().find(|i| i.name == name)
    }

    /// Records whose value at `path` is a valid key equal to `key`, in primary key order.
    fn matching<'a>(
        &'a self,
        path: &'a str,
        key: &'a Key,
    ) -> impl Iterator<Item = (&'a Key, &'a Record)> + 'a {
        self.records
            .iter()
            .filter(move |(_, record)| index_key(record, path).is_some_and(|k| &k == key))
    }

    /// Reject `record` if it would break a unique index.
    fn check_unique(&self, primary: &Key, record: &Record) -> EngineResult<()> {
        for index in self.indexes.iter().filter(|i| i.unique) {
            let Some(value) = index_key(record, &index.path) else {
                continue;
            };
            if self.matching(&index.path, &value).any(|(k, _)| k != primary) {
                return Err(EngineError::constraint(format!(
                    "unique index '{}' already contains {}",
                    index.name, value
                )));
            }
        }
        Ok(())
    }
}

/// Value a record contributes to an index, if any.
///
/// Records whose path is missing or not a valid key are simply not indexed.
fn index_key(record: &Record, path: &str) -> Option<Key> {
    resolve_key_path(record, path).and_then(|v| Key::from_value(v).ok())
}

#[derive(Debug, Clone, Default)]
struct DatabaseData {
    version: u32,
    stores: BTreeMap<String, StoreData>,
}

impl DatabaseData {
    fn store(&self, name: &str) -> EngineResult<&StoreData> {
        self.stores
            .get(name)
            .ok_or_else(|| EngineError::not_found(format!("no object store named '{}'", name)))
    }

    fn store_mut(&mut self, name: &str) -> EngineResult<&mut StoreData> {
        self.stores
            .get_mut(name)
            .ok_or_else(|| EngineError::not_found(format!("no object store named '{}'", name)))
    }
}

type SharedDatabase = Rc<RefCell<DatabaseData>>;

/// In-memory engine holding any number of named databases.
///
/// Cloning yields another handle to the same databases.
#[derive(Debug, Clone, Default)]
pub struct MemoryEngine {
    databases: Rc<RefCell<HashMap<String, SharedDatabase>>>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn database(&self, name: &str) -> Option<SharedDatabase> {
        self.databases.borrow().get(name).cloned()
    }

    fn inspect<T>(&self, db_name: &str, f: impl FnOnce(&DatabaseData) -> T) -> Option<T> {
        let db = self.database(db_name)?;
        let data = db.borrow();
        Some(f(&data))
    }

    /// Stored version of a database, if it exists.
    pub fn version(&self, db_name: &str) -> Option<u32> {
        self.inspect(db_name, |db| db.version)
    }

    /// Names of the stores present in a database, sorted.
    pub fn store_names(&self, db_name: &str) -> Vec<String> {
        self.inspect(db_name, |db| db.stores.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of records in a store, if the store exists.
    pub fn record_count(&self, db_name: &str, store: &str) -> Option<usize> {
        self.inspect(db_name, |db| db.stores.get(store).map(|s| s.records.len()))
            .flatten()
    }

    /// Key path of a store, if the store exists.
    pub fn key_path(&self, db_name: &str, store: &str) -> Option<String> {
        self.inspect(db_name, |db| db.stores.get(store).map(|s| s.key_path.clone()))
            .flatten()
    }

    /// Indexes of a store in creation order.
    pub fn indexes(&self, db_name: &str, store: &str) -> Vec<IndexConfig> {
        self.inspect(db_name, |db| db.stores.get(store).map(|s| s.indexes.clone()))
            .flatten()
            .unwrap_or_default()
    }
}

impl StorageEngine for MemoryEngine {
    type Connection = MemoryConnection;

    async fn open(
        &self,
        name: &str,
        version: u32,
        upgrader: SchemaUpgrader,
    ) -> Result<MemoryConnection, OpenError> {
        if version == 0 {
            return Err(EngineError::data("version must be at least 1").into());
        }

        let existing = self.database(name);
        let current = existing.as_ref().map_or(0, |db| db.borrow().version);
        if version < current {
            return Err(EngineError::version(format!(
                "requested version {} is less than the existing version {}",
                version, current
            ))
            .into());
        }

        let db = if version > current {
            // Upgrade a copy so a failed version change leaves nothing behind
            let mut staged = existing
                .as_ref()
                .map(|db| db.borrow().clone())
                .unwrap_or_default();
            upgrader.upgrade(&mut MemoryUpgrade {
                data: &mut staged,
                old_version: current,
                new_version: version,
            })?;
            staged.version = version;

            match existing {
                Some(db) => {
                    *db.borrow_mut() = staged;
                    db
                }
                None => {
                    let db = Rc::new(RefCell::new(staged));
                    self.databases
                        .borrow_mut()
                        .insert(name.to_string(), db.clone());
                    db
                }
            }
        } else {
            // version == current, and current >= 1 here
            existing.ok_or_else(|| EngineError::unknown("database vanished during open"))?
        };

        Ok(MemoryConnection {
            name: name.to_string(),
            version,
            db,
            closed: Rc::new(Cell::new(false)),
        })
    }

    async fn delete_database(&self, name: &str) -> EngineResult<()> {
        self.databases.borrow_mut().remove(name);
        Ok(())
    }
}

/// Version change context over a staged copy of the database.
struct MemoryUpgrade<'a> {
    data: &'a mut DatabaseData,
    old_version: u32,
    new_version: u32,
}

impl UpgradeTransaction for MemoryUpgrade<'_> {
    fn old_version(&self) -> u32 {
        self.old_version
    }

    fn new_version(&self) -> u32 {
        self.new_version
    }

    fn contains_store(&self, name: &str) -> bool {
        self.data.stores.contains_key(name)
    }

    fn delete_store(&mut self, name: &str) -> EngineResult<()> {
        self.data
            .stores
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| EngineError::not_found(format!("no object store named '{}'", name)))
    }

    fn create_store(&mut self, name: &str, key_path: &str) -> EngineResult<()> {
        if self.data.stores.contains_key(name) {
            return Err(EngineError::constraint(format!(
                "object store '{}' already exists",
                name
            )));
        }
        self.data.stores.insert(
            name.to_string(),
            StoreData {
                key_path: key_path.to_string(),
                indexes: Vec::new(),
                records: BTreeMap::new(),
            },
        );
        Ok(())
    }

    fn create_index(&mut self, store: &str, index: &IndexConfig) -> EngineResult<()> {
        let data = self.data.store_mut(store)?;
        if data.index(&index.name).is_some() {
            return Err(EngineError::constraint(format!(
                "index '{}' already exists on '{}'",
                index.name, store
            )));
        }
        if index.unique {
            let mut seen = Vec::new();
            for record in data.records.values() {
                if let Some(k) = index_key(record, &index.path) {
                    if seen.contains(&k) {
                        return Err(EngineError::constraint(format!(
                            "existing records violate unique index '{}'",
                            index.name
                        )));
                    }
                    seen.push(k);
                }
            }
        }
        data.indexes.push(index.clone());
        Ok(())
    }
}

/// Open connection to an in-memory database.
#[derive(Debug)]
pub struct MemoryConnection {
    name: String,
    version: u32,
    db: SharedDatabase,
    closed: Rc<Cell<bool>>,
}

impl Connection for MemoryConnection {
    type Transaction = MemoryTransaction;

    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> u32 {
        self.version
    }

    fn store_names(&self) -> Vec<String> {
        self.db.borrow().stores.keys().cloned().collect()
    }

    fn transaction(&self, store: &str, mode: TransactionMode) -> EngineResult<MemoryTransaction> {
        if self.closed.get() {
            return Err(EngineError::invalid_state(format!(
                "connection to '{}' is closed",
                self.name
            )));
        }
        self.db.borrow().store(store)?;
        Ok(MemoryTransaction {
            db: self.db.clone(),
            store: store.to_string(),
            mode,
        })
    }

    fn close(&self) {
        self.closed.set(true);
    }
}

/// Transaction scoped to one in-memory store.
///
/// Writes apply immediately; completion always succeeds.
#[derive(Debug)]
pub struct MemoryTransaction {
    db: SharedDatabase,
    store: String,
    mode: TransactionMode,
}

impl Transaction for MemoryTransaction {
    type ObjectStore = MemoryObjectStore;

    fn mode(&self) -> TransactionMode {
        self.mode
    }

    fn object_store(&self, store: &str) -> EngineResult<MemoryObjectStore> {
        if store != self.store {
            return Err(EngineError::not_found(format!(
                "'{}' is not in the scope of this transaction",
                store
            )));
        }
        Ok(MemoryObjectStore {
            db: self.db.clone(),
            store: self.store.clone(),
            mode: self.mode,
        })
    }

    async fn complete(&self) -> EngineResult<()> {
        Ok(())
    }
}

/// Store handle inside an in-memory transaction.
#[derive(Debug)]
pub struct MemoryObjectStore {
    db: SharedDatabase,
    store: String,
    mode: TransactionMode,
}

impl MemoryObjectStore {
    fn ensure_writable(&self) -> EngineResult<()> {
        if self.mode == TransactionMode::ReadOnly {
            return Err(EngineError::read_only(format!(
                "transaction on '{}' is read-only",
                self.store
            )));
        }
        Ok(())
    }
}

impl ObjectStore for MemoryObjectStore {
    type Index = MemoryIndex;

    fn name(&self) -> String {
        self.store.clone()
    }

    async fn put(&self, record: &Record) -> EngineResult<Key> {
        self.ensure_writable()?;
        let mut db = self.db.borrow_mut();
        let data = db.store_mut(&self.store)?;
        let key = extract_key(record, &data.key_path)?;
        data.check_unique(&key, record)?;
        data.records.insert(key.clone(), record.clone());
        Ok(key)
    }

    async fn get(&self, key: &Key) -> EngineResult<Option<Record>> {
        let db = self.db.borrow();
        let record = db.store(&self.store)?.records.get(key).cloned();
        Ok(record)
    }

    async fn delete(&self, key: &Key) -> EngineResult<()> {
        self.ensure_writable()?;
        let mut db = self.db.borrow_mut();
        db.store_mut(&self.store)?.records.remove(key);
        Ok(())
    }

    async fn count(&self) -> EngineResult<usize> {
        let db = self.db.borrow();
        let count = db.store(&self.store)?.records.len();
        Ok(count)
    }

    fn index(&self, name: &str) -> EngineResult<MemoryIndex> {
        let db = self.db.borrow();
        let config = db
            .store(&self.store)?
            .index(name)
            .cloned()
            .ok_or_else(|| {
                EngineError::not_found(format!("no index named '{}' on '{}'", name, self.store))
            })?;
        Ok(MemoryIndex {
            db: self.db.clone(),
            store: self.store.clone(),
            config,
        })
    }
}

/// Index handle over an in-memory store.
#[derive(Debug)]
pub struct MemoryIndex {
    db: SharedDatabase,
    store: String,
    config: IndexConfig,
}

impl Index for MemoryIndex {
    fn name(&self) -> String {
        self.config.name.clone()
    }

    fn key_path(&self) -> String {
        self.config.path.clone()
    }

    fn unique(&self) -> bool {
        self.config.unique
    }

    async fn get(&self, key: &Key) -> EngineResult<Option<Record>> {
        let db = self.db.borrow();
        let data = db.store(&self.store)?;
        let found = data
            .matching(&self.config.path, key)
            .next()
            .map(|(_, record)| record.clone());
        Ok(found)
    }

    async fn get_all(&self, key: &Key) -> EngineResult<Vec<Record>> {
        let db = self.db.borrow();
        let data = db.store(&self.store)?;
        let records = data
            .matching(&self.config.path, key)
            .map(|(_, record)| record.clone())
            .collect();
        Ok(records)
    }
}
