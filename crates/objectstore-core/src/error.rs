//! Error types for object store operations

use std::fmt;

use thiserror::Error;

/// Result type for object store operations
pub type Result<T> = std::result::Result<T, Error>;

/// Category of a failure reported by the storage engine.
///
/// Mirrors the DOMException names IndexedDB uses so that a browser error
/// maps onto a kind without losing information.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineErrorKind {
    /// A uniqueness or existence constraint was violated
    Constraint,
    /// The supplied data (record or key) is not acceptable
    Data,
    /// The named store or index does not exist
    NotFound,
    /// A write was attempted in a read-only transaction
    ReadOnly,
    /// The connection or transaction is not usable anymore
    InvalidState,
    /// The requested version is lower than the stored one
    Version,
    /// The transaction was aborted
    Abort,
    /// The engine itself is not available in this environment
    Unavailable,
    /// Anything the engine reported that has no dedicated kind
    Unknown,
}

impl EngineErrorKind {
    /// Map a DOMException name onto a kind.
    pub fn from_dom_name(name: &str) -> Self {
        match name {
            "ConstraintError" => Self::Constraint,
            "DataError" => Self::Data,
            "NotFoundError" => Self::NotFound,
            "ReadOnlyError" => Self::ReadOnly,
            "InvalidStateError" | "TransactionInactiveError" => Self::InvalidState,
            "VersionError" => Self::Version,
            "AbortError" => Self::Abort,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for EngineErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Constraint => "constraint",
            Self::Data => "data",
            Self::NotFound => "not found",
            Self::ReadOnly => "read-only",
            Self::InvalidState => "invalid state",
            Self::Version => "version",
            Self::Abort => "abort",
            Self::Unavailable => "unavailable",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// A failure reported by the underlying storage engine, relayed verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} error: {message}")]
pub struct EngineError {
    pub kind: EngineErrorKind,
    pub message: String,
}

impl EngineError {
    pub fn new(kind: EngineErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn constraint(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::Constraint, message)
    }

    pub fn data(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::Data, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::NotFound, message)
    }

    pub fn read_only(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::ReadOnly, message)
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::InvalidState, message)
    }

    pub fn version(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::Version, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::Unknown, message)
    }
}

/// A declared schema that cannot be used to open a database.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Versions start at 1
    #[error("invalid version {version} for {target}: versions start at 1")]
    InvalidVersion { target: String, version: u32 },

    /// Store names must be non-empty
    #[error("store name must not be empty")]
    EmptyStoreName,

    /// Store names must be unique within a database
    #[error("store '{0}' is declared more than once")]
    DuplicateStore(String),

    /// Every store needs a primary key path
    #[error("store '{0}' has no key path")]
    MissingKeyPath(String),

    /// Index name or path is empty
    #[error("store '{store}' declares an index with an empty {field}")]
    EmptyIndexField { store: String, field: &'static str },

    /// Index names must be unique within a store
    #[error("store '{store}' declares index '{index}' more than once")]
    DuplicateIndex { store: String, index: String },

    /// Configuration document could not be parsed
    #[error("invalid configuration document: {0}")]
    Parse(String),
}

/// Which schema step failed during an upgrade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpgradeStepKind {
    DropStore,
    CreateStore,
    CreateIndex(String),
}

impl fmt::Display for UpgradeStepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DropStore => f.write_str("drop store"),
            Self::CreateStore => f.write_str("create store"),
            Self::CreateIndex(index) => write!(f, "create index '{}'", index),
        }
    }
}

/// A store or index could not be (re)created during a version change.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{step} failed for store '{store}': {source}")]
pub struct UpgradeError {
    pub store: String,
    pub step: UpgradeStepKind,
    #[source]
    pub source: EngineError,
}

/// Why opening a database failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OpenError {
    /// The engine refused the open request
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// The schema upgrade ran and failed, aborting the version change
    #[error("schema upgrade failed: {0}")]
    Upgrade(#[from] UpgradeError),
}

/// Errors surfaced by the store manager
#[derive(Debug, Error)]
pub enum Error {
    /// The database configuration is invalid
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// The database could not be opened or upgraded
    #[error("failed to open database '{database}': {source}")]
    Connection {
        database: String,
        #[source]
        source: OpenError,
    },

    /// An engine read or write failed
    #[error("operation on store '{store}' failed: {source}")]
    Operation {
        store: String,
        #[source]
        source: EngineError,
    },

    /// The store was not declared when the database was opened
    #[error("store '{0}' is not declared in the database configuration")]
    UnknownStore(String),

    /// The entity does not serialize to a record (a JSON object)
    #[error("entity for store '{store}' is not a record, found {found}")]
    NotARecord { store: String, found: &'static str },

    /// JSON serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// The engine error behind this failure, if any.
    pub fn engine_error(&self) -> Option<&EngineError> {
        match self {
            Error::Operation { source, .. } => Some(source),
            Error::Connection {
                source: OpenError::Engine(source),
                ..
            } => Some(source),
            Error::Connection {
                source: OpenError::Upgrade(err),
                ..
            } => Some(&err.source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dom_names_map_to_kinds() {
        assert_eq!(
            EngineErrorKind::from_dom_name("ConstraintError"),
            EngineErrorKind::Constraint
        );
        assert_eq!(
            EngineErrorKind::from_dom_name("TransactionInactiveError"),
            EngineErrorKind::InvalidState
        );
        assert_eq!(
            EngineErrorKind::from_dom_name("QuotaExceededError"),
            EngineErrorKind::Unknown
        );
    }

    #[test]
    fn test_engine_error_reachable_through_connection() {
        let err = Error::Connection {
            database: "app".into(),
            source: OpenError::Upgrade(UpgradeError {
                store: "users".into(),
                step: UpgradeStepKind::CreateIndex("by_email".into()),
                source: EngineError::constraint("index exists"),
            }),
        };
        assert_eq!(
            err.engine_error().map(|e| e.kind),
            Some(EngineErrorKind::Constraint)
        );
        assert!(err.to_string().contains("create index 'by_email'"));
    }
}
