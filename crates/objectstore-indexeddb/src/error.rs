//! Error types for the IndexedDB engine

use objectstore_core::{EngineError, EngineErrorKind};
use thiserror::Error;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::DomException;

/// Result type for IndexedDB operations
pub type Result<T> = std::result::Result<T, IndexedDbError>;

/// Errors that can occur while talking to IndexedDB
#[derive(Debug, Error)]
pub enum IndexedDbError {
    /// IndexedDB is not available in this environment
    #[error("IndexedDB not available: {0}")]
    NotAvailable(String),

    /// A DOMException raised by an IDB call or request
    #[error("IndexedDB {name}: {message}")]
    Dom { name: String, message: String },

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// JavaScript value conversion error
    #[error("JS conversion error: {0}")]
    JsValue(String),
}

impl From<JsValue> for IndexedDbError {
    fn from(val: JsValue) -> Self {
        if let Some(dom) = val.dyn_ref::<DomException>() {
            return IndexedDbError::Dom {
                name: dom.name(),
                message: dom.message(),
            };
        }
        let msg = js_sys::JSON::stringify(&val)
            .map(String::from)
            .unwrap_or_else(|_| format!("{:?}", val));
        IndexedDbError::JsValue(msg)
    }
}

/// Convert IndexedDbError to EngineError for the engine traits
impl From<IndexedDbError> for EngineError {
    fn from(err: IndexedDbError) -> Self {
        match err {
            IndexedDbError::NotAvailable(msg) => {
                EngineError::new(EngineErrorKind::Unavailable, msg)
            }
            IndexedDbError::Dom { name, message } => {
                EngineError::new(EngineErrorKind::from_dom_name(&name), message)
            }
            IndexedDbError::Json(e) => EngineError::data(e.to_string()),
            IndexedDbError::JsValue(msg) => EngineError::data(msg),
        }
    }
}

/// Convert a thrown or rejected JS value straight into an engine error.
pub(crate) fn engine_error(val: JsValue) -> EngineError {
    IndexedDbError::from(val).into()
}
