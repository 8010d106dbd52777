//! IndexedDB engine for objectstore-core (browser WASM)
//!
//! Implements the engine traits from `objectstore-core` on top of the
//! browser's IndexedDB through web-sys. Callback-style requests are turned
//! into futures with `js_sys::Promise` and `wasm_bindgen_futures::JsFuture`.
//!
//! Records are carried across the JS boundary as JSON, so every value a
//! `serde_json::Map` can hold is stored as the equivalent plain JS object.
//!
//! # Example
//!
//! ```rust,ignore
//! use objectstore_core::{DatabaseConfig, StoreConfig, StoreName};
//!
//! let config = DatabaseConfig::new().with_version(2).with_store_config(
//!     StoreConfig::new()
//!         .with_store_name("users")
//!         .with_key_path("id")
//!         .with_index("by_email", "email", true),
//! );
//!
//! let manager = objectstore_indexeddb::open("app", config).await?;
//! let users = StoreName::new("users")?;
//! manager.put_entity(user, &users).await?;
//! ```

pub mod convert;
pub mod engine;
pub mod error;
pub mod idb;

pub use engine::{
    IndexedDbConnection, IndexedDbEngine, IndexedDbIndex, IndexedDbObjectStore,
    IndexedDbTransaction, IndexedDbUpgrade,
};
pub use error::{IndexedDbError, Result};

use objectstore_core::{DatabaseConfig, StorageEngine, StoreManager};

/// Open `name` in the browser's IndexedDB and wrap it in a [`StoreManager`].
pub async fn open(
    name: &str,
    config: DatabaseConfig,
) -> objectstore_core::Result<StoreManager<IndexedDbConnection>> {
    StoreManager::open(&IndexedDbEngine, name, config).await
}

/// Delete a database from the browser's IndexedDB.
pub async fn delete_database(name: &str) -> objectstore_core::Result<()> {
    IndexedDbEngine
        .delete_database(name)
        .await
        .map_err(|source| objectstore_core::Error::Connection {
            database: name.to_string(),
            source: source.into(),
        })
}
