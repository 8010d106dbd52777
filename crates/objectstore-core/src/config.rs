//! Database and store configuration
//!
//! A [`DatabaseConfig`] is the declared schema handed to
//! [`StoreManager::open`](crate::StoreManager::open): a database version plus
//! an ordered list of [`StoreConfig`]s, each with a primary key path and
//! zero or more secondary [`IndexConfig`]s.
//!
//! ```rust
//! use objectstore_core::{DatabaseConfig, StoreConfig};
//!
//! let config = DatabaseConfig::new()
//!     .with_version(2)
//!     .with_store_config(
//!         StoreConfig::new()
//!             .with_store_name("users")
//!             .with_key_path("id")
//!             .with_index("by_email", "email", true),
//!     );
//!
//! assert!(config.validate().is_ok());
//! ```

use std::borrow::Borrow;
use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

fn default_version() -> u32 {
    1
}

/// A validated, non-empty store identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoreName(String);

impl StoreName {
    pub fn new(name: impl Into<String>) -> Result<Self, ConfigError> {
        let name = name.into();
        if name.is_empty() {
            return Err(ConfigError::EmptyStoreName);
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for StoreName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for StoreName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoreName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<&str> for StoreName {
    type Error = ConfigError;

    fn try_from(name: &str) -> Result<Self, Self::Error> {
        Self::new(name)
    }
}

impl TryFrom<String> for StoreName {
    type Error = ConfigError;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        Self::new(name)
    }
}

/// One secondary index over a field path of a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexConfig {
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub unique: bool,
}

impl IndexConfig {
    pub fn new(name: impl Into<String>, path: impl Into<String>, unique: bool) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            unique,
        }
    }
}

/// Declaration of one record store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreConfig {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub store_name: String,
    #[serde(default)]
    pub key_path: Option<String>,
    #[serde(default)]
    pub indexes: Vec<IndexConfig>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            store_name: String::new(),
            key_path: None,
            indexes: Vec::new(),
        }
    }
}

impl StoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn with_store_name(mut self, store_name: impl Into<String>) -> Self {
        self.store_name = store_name.into();
        self
    }

    pub fn with_key_path(mut self, key_path: impl Into<String>) -> Self {
        self.key_path = Some(key_path.into());
        self
    }

    /// Append an index. Indexes are created in the order they are added.
    pub fn with_index(
        mut self,
        name: impl Into<String>,
        path: impl Into<String>,
        unique: bool,
    ) -> Self {
        self.indexes.push(IndexConfig::new(name, path, unique));
        self
    }

    /// The validated store name.
    pub fn name(&self) -> Result<StoreName, ConfigError> {
        StoreName::new(self.store_name.clone())
    }

    /// The key path, or an empty string when none was declared.
    pub fn key_path(&self) -> &str {
        self.key_path.as_deref().unwrap_or_default()
    }

    /// Check this store declaration on its own.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store_name.is_empty() {
            return Err(ConfigError::EmptyStoreName);
        }
        if self.version == 0 {
            return Err(ConfigError::InvalidVersion {
                target: format!("store '{}'", self.store_name),
                version: self.version,
            });
        }
        if self.key_path().is_empty() {
            return Err(ConfigError::MissingKeyPath(self.store_name.clone()));
        }

        let mut seen = HashSet::new();
        for index in &self.indexes {
            if index.name.is_empty() {
                return Err(ConfigError::EmptyIndexField {
                    store: self.store_name.clone(),
                    field: "name",
                });
            }
            if index.path.is_empty() {
                return Err(ConfigError::EmptyIndexField {
                    store: self.store_name.clone(),
                    field: "path",
                });
            }
            if !seen.insert(index.name.as_str()) {
                return Err(ConfigError::DuplicateIndex {
                    store: self.store_name.clone(),
                    index: index.name.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Declared schema of a whole database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseConfig {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub store_configs: Vec<StoreConfig>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            store_configs: Vec::new(),
        }
    }
}

impl DatabaseConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a configuration document.
    ///
    /// ```json
    /// {"version": 2, "storeConfigs": [{"storeName": "users", "keyPath": "id"}]}
    /// ```
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Append a store. Stores are (re)created in the order they are added.
    pub fn with_store_config(mut self, store_config: StoreConfig) -> Self {
        self.store_configs.push(store_config);
        self
    }

    /// Look up a declared store by name.
    pub fn store_config(&self, store_name: &str) -> Option<&StoreConfig> {
        self.store_configs
            .iter()
            .find(|s| s.store_name == store_name)
    }

    /// Names of all declared stores, in declaration order.
    pub fn store_names(&self) -> Vec<&str> {
        self.store_configs
            .iter()
            .map(|s| s.store_name.as_str())
            .collect()
    }

    /// Check the whole schema before it is used to open a database.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version == 0 {
            return Err(ConfigError::InvalidVersion {
                target: "database".to_string(),
                version: self.version,
            });
        }

        let mut seen = HashSet::new();
        for store in &self.store_configs {
            store.validate()?;
            if !seen.insert(store.store_name.as_str()) {
                return Err(ConfigError::DuplicateStore(store.store_name.clone()));
            }
        }
        Ok(())
    }
}
