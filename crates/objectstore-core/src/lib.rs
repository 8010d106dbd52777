//! Object store core
//!
//! A small convenience layer over an asynchronous key-value/index storage
//! engine. Declare named record stores (each with a primary key path and
//! secondary indexes), open a versioned database, put/get/delete entities,
//! and subscribe to writes and deletes per store.
//!
//! The engine itself sits behind the traits in [`engine`]. This crate ships
//! an in-memory engine ([`MemoryEngine`]); the browser engine lives in the
//! `objectstore-indexeddb` crate.
//!
//! # Schema upgrades
//!
//! Whenever the engine reports a version change, every declared store is
//! dropped and recreated with its indexes. Records in those stores do not
//! survive a version bump.
//!
//! # Example
//!
//! ```rust
//! # tokio_test_block_on(async {
//! use std::rc::Rc;
//! use objectstore_core::{
//!     DatabaseConfig, MemoryEngine, PutListener, Record, StoreConfig, StoreManager, StoreName,
//! };
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
//! struct User {
//!     id: u64,
//!     name: String,
//! }
//!
//! let config = DatabaseConfig::new().with_store_config(
//!     StoreConfig::new().with_store_name("users").with_key_path("id"),
//! );
//! let users = StoreName::new("users").unwrap();
//!
//! let engine = MemoryEngine::new();
//! let manager = StoreManager::open(&engine, "app", config).await.unwrap();
//!
//! // Keep the listener alive: the manager only holds a weak reference
//! let listener: PutListener = Rc::new(|record: &Record| println!("stored {:?}", record));
//! manager.subscribe_put(&users, &listener).unwrap();
//!
//! manager.put_entity(User { id: 1, name: "Ann".into() }, &users).await.unwrap();
//! let user: Option<User> = manager.get_entity(1, &users).await.unwrap();
//! assert_eq!(user.unwrap().name, "Ann");
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod entity;
pub mod error;
pub mod key;
pub mod logging;
pub mod manager;
pub mod memory;
pub mod subscription;
pub mod upgrade;

// Re-export main types at crate root
pub use config::{DatabaseConfig, IndexConfig, StoreConfig, StoreName};
pub use engine::{
    Connection, EngineResult, Index, ObjectStore, StorageEngine, Transaction, TransactionMode,
    UpgradeTransaction,
};
pub use error::{
    ConfigError, EngineError, EngineErrorKind, Error, OpenError, Result, UpgradeError,
    UpgradeStepKind,
};
pub use key::{Key, Record};
pub use manager::StoreManager;
pub use memory::MemoryEngine;
pub use subscription::{DeleteListener, PutListener, SubscriptionRegistry};
pub use upgrade::{SchemaUpgrader, UpgradePlan, UpgradeStep};
