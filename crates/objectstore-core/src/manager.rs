//! Store manager: the façade over one open database connection
//!
//! Opens a connection through the schema upgrade protocol, relays entity
//! reads and writes to the engine, and fans confirmed writes out to the
//! listeners subscribed to the written store.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{DatabaseConfig, StoreName};
use crate::engine::{
    Connection, Index, ObjectStore, StorageEngine, Transaction, TransactionMode,
};
use crate::entity::{map_entity, to_record};
use crate::error::{EngineError, Error, Result};
use crate::key::{Key, Record};
use crate::logging::prefix;
use crate::subscription::{DeleteListener, PutListener, SubscriptionRegistry};
use crate::upgrade::SchemaUpgrader;

/// Store handle type of a connection's transactions.
pub type ObjectStoreOf<C> = <<C as Connection>::Transaction as Transaction>::ObjectStore;

/// Index handle type of a connection's stores.
pub type IndexOf<C> = <ObjectStoreOf<C> as ObjectStore>::Index;

/// Manages a database with zero to many stores.
///
/// Subscriptions are held per store name and live as long as the connection.
/// Listeners are weakly referenced: keep the `Rc` alive for as long as
/// notifications should arrive.
pub struct StoreManager<C: Connection> {
    connection: C,
    config: DatabaseConfig,
    registries: RefCell<HashMap<StoreName, Rc<SubscriptionRegistry>>>,
    open: Cell<bool>,
}

impl<C: Connection> StoreManager<C> {
    /// Open (or create and upgrade) a database.
    ///
    /// The configuration is validated before the engine is contacted. If the
    /// engine reports a version change, every declared store is recreated
    /// before this resolves.
    pub async fn open<E>(engine: &E, name: &str, config: DatabaseConfig) -> Result<Self>
    where
        E: StorageEngine<Connection = C>,
    {
        if let Err(e) = config.validate() {
            warn!("{} Rejected configuration for '{}': {}", prefix::DB, name, e);
            return Err(e.into());
        }

        info!(
            "{} Opening database '{}' at version {} ({} stores)",
            prefix::DB_OPEN,
            name,
            config.version,
            config.store_configs.len()
        );

        let upgrader = SchemaUpgrader::new(config.clone());
        let connection = engine
            .open(name, config.version, upgrader)
            .await
            .map_err(|source| {
                warn!("{} Failed to open '{}': {}", prefix::DB, name, source);
                Error::Connection {
                    database: name.to_string(),
                    source,
                }
            })?;

        Ok(Self::from_connection(connection, config))
    }

    /// Wrap an already open connection.
    pub fn from_connection(connection: C, config: DatabaseConfig) -> Self {
        Self {
            connection,
            config,
            registries: RefCell::new(HashMap::new()),
            open: Cell::new(true),
        }
    }

    pub fn name(&self) -> &str {
        self.connection.name()
    }

    pub fn version(&self) -> u32 {
        self.connection.version()
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// The underlying engine connection.
    pub fn connection(&self) -> &C {
        &self.connection
    }

    pub fn is_open(&self) -> bool {
        self.open.get()
    }

    /// Close the connection and drop every subscription.
    pub fn close(&self) {
        if self.open.replace(false) {
            self.connection.close();
            self.registries.borrow_mut().clear();
            info!("{} Closed database '{}'", prefix::DB_CLOSE, self.name());
        }
    }

    fn ensure_declared(&self, store: &StoreName) -> Result<()> {
        if self.config.store_config(store.as_str()).is_none() {
            return Err(Error::UnknownStore(store.to_string()));
        }
        Ok(())
    }

    fn operation_error(store: &StoreName) -> impl FnOnce(EngineError) -> Error + '_ {
        move |source| Error::Operation {
            store: store.to_string(),
            source,
        }
    }

    // ========================================================================
    // Engine accessors
    // ========================================================================

    /// Start a transaction scoped to `store`.
    pub fn transaction(&self, mode: TransactionMode, store: &StoreName) -> Result<C::Transaction> {
        self.ensure_declared(store)?;
        self.connection
            .transaction(store.as_str(), mode)
            .map_err(Self::operation_error(store))
    }

    /// Store handle from a transaction.
    pub fn object_store(
        &self,
        transaction: &C::Transaction,
        store: &StoreName,
    ) -> Result<ObjectStoreOf<C>> {
        transaction
            .object_store(store.as_str())
            .map_err(Self::operation_error(store))
    }

    /// Index handle from a store handle.
    pub fn index(&self, object_store: &ObjectStoreOf<C>, index_name: &str) -> Result<IndexOf<C>> {
        object_store
            .index(index_name)
            .map_err(|source| Error::Operation {
                store: object_store.name(),
                source,
            })
    }

    // ========================================================================
    // Entity operations
    // ========================================================================

    /// Write an entity, keyed by the store's key path.
    ///
    /// Put listeners of `store` are notified only after the write committed.
    pub async fn put_entity<T: Serialize>(&self, entity: T, store: &StoreName) -> Result<T> {
        let tx = self.transaction(TransactionMode::ReadWrite, store)?;
        let record = to_record(&entity, store.as_str())?;

        let object_store = self.object_store(&tx, store)?;
        let key = object_store
            .put(&record)
            .await
            .map_err(Self::operation_error(store))?;
        tx.complete().await.map_err(Self::operation_error(store))?;

        debug!(store = %store, key = %key, "Put entity");
        self.notify_put(store, &record);
        Ok(entity)
    }

    /// Read the record stored under `key`, shallow-copied onto a fresh `T`.
    ///
    /// Resolves to `None` only when no record exists for the key.
    pub async fn get_entity<T>(&self, key: impl Into<Key>, store: &StoreName) -> Result<Option<T>>
    where
        T: Default + Serialize + DeserializeOwned,
    {
        let key = key.into();
        let tx = self.transaction(TransactionMode::ReadOnly, store)?;
        let object_store = self.object_store(&tx, store)?;
        let record = object_store
            .get(&key)
            .await
            .map_err(Self::operation_error(store))?;
        tx.complete().await.map_err(Self::operation_error(store))?;

        debug!(store = %store, key = %key, found = record.is_some(), "Get entity");
        record.map(map_entity).transpose()
    }

    /// Delete the record stored under `key`.
    ///
    /// Delete listeners of `store` are notified only after the delete committed.
    pub async fn delete_entity(&self, key: impl Into<Key>, store: &StoreName) -> Result<()> {
        let key = key.into();
        let tx = self.transaction(TransactionMode::ReadWrite, store)?;
        let object_store = self.object_store(&tx, store)?;
        object_store
            .delete(&key)
            .await
            .map_err(Self::operation_error(store))?;
        tx.complete().await.map_err(Self::operation_error(store))?;

        debug!(store = %store, key = %key, "Deleted entity");
        self.notify_delete(store, &key);
        Ok(())
    }

    /// Read every record whose `index_name` value equals `key`.
    pub async fn find_by_index<T>(
        &self,
        index_name: &str,
        key: impl Into<Key>,
        store: &StoreName,
    ) -> Result<Vec<T>>
    where
        T: Default + Serialize + DeserializeOwned,
    {
        let key = key.into();
        let tx = self.transaction(TransactionMode::ReadOnly, store)?;
        let object_store = self.object_store(&tx, store)?;
        let index = self.index(&object_store, index_name)?;
        let records = index
            .get_all(&key)
            .await
            .map_err(Self::operation_error(store))?;
        tx.complete().await.map_err(Self::operation_error(store))?;

        debug!(store = %store, index = index_name, matches = records.len(), "Index lookup");
        records.into_iter().map(map_entity).collect()
    }

    // ========================================================================
    // Subscriptions
    // ========================================================================

    fn registry_or_create(&self, store: &StoreName) -> Result<Rc<SubscriptionRegistry>> {
        self.ensure_declared(store)?;
        if !self.is_open() {
            return Err(Error::Operation {
                store: store.to_string(),
                source: EngineError::invalid_state(format!(
                    "database '{}' is closed",
                    self.name()
                )),
            });
        }
        let registry = self
            .registries
            .borrow_mut()
            .entry(store.clone())
            .or_default()
            .clone();
        Ok(registry)
    }

    /// Registry of `store`, if anything subscribed to it yet.
    pub fn registry(&self, store: &StoreName) -> Option<Rc<SubscriptionRegistry>> {
        self.registries.borrow().get(store).cloned()
    }

    /// Subscribe to writes on `store`. The listener is weakly referenced.
    pub fn subscribe_put(&self, store: &StoreName, listener: &PutListener) -> Result<()> {
        self.registry_or_create(store)?.subscribe_put(listener);
        Ok(())
    }

    /// Subscribe to deletes on `store`. The listener is weakly referenced.
    pub fn subscribe_delete(&self, store: &StoreName, listener: &DeleteListener) -> Result<()> {
        self.registry_or_create(store)?.subscribe_delete(listener);
        Ok(())
    }

    /// Subscribe to both writes and deletes on `store`.
    pub fn subscribe(
        &self,
        put: &PutListener,
        delete: &DeleteListener,
        store: &StoreName,
    ) -> Result<()> {
        self.registry_or_create(store)?.subscribe(put, delete);
        Ok(())
    }

    fn notify_put(&self, store: &StoreName, record: &Record) {
        // Release the map before listeners run; they may subscribe again
        let registry = self.registry(store);
        if let Some(registry) = registry {
            registry.notify_put(record);
        }
    }

    fn notify_delete(&self, store: &StoreName, key: &Key) {
        let registry = self.registry(store);
        if let Some(registry) = registry {
            registry.notify_delete(key);
        }
    }
}
