//! Error types for the IndexedDB engine

use idbridge_core::StoreError;
use thiserror::Error;
use wasm_bindgen::{JsCast, JsValue};

/// Result type for IndexedDB operations
pub type Result<T> = std::result::Result<T, IndexedDbError>;

/// Errors that can occur during IndexedDB operations
#[derive(Debug, Error)]
pub enum IndexedDbError {
    /// IndexedDB is not available in this environment
    #[error("IndexedDB not available: {0}")]
    NotAvailable(String),

    /// Database open error
    #[error("IndexedDB open error: {0}")]
    Open(String),

    /// Upgrade transaction failed or was aborted
    #[error("IndexedDB upgrade error: {0}")]
    Upgrade(String),

    /// Transaction error
    #[error("IndexedDB transaction error: {0}")]
    Transaction(String),

    /// Request error from IDB operation
    #[error("IndexedDB request error: {0}")]
    Request(String),

    /// Key already present (`ConstraintError`)
    #[error("IndexedDB constraint error: {0}")]
    Constraint(String),

    /// Invalid key or key path (`DataError`)
    #[error("IndexedDB data error: {0}")]
    Data(String),

    /// Cursor step failed
    #[error("IndexedDB cursor error: {0}")]
    Cursor(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// JavaScript value conversion error
    #[error("JS conversion error: {0}")]
    JsValue(String),
}

impl IndexedDbError {
    /// Classify a rejected request by its DOMException name.
    pub fn from_request(val: JsValue) -> Self {
        let (name, message) = dom_error(&val);
        let msg = format!("{}: {}", name, message);
        match name.as_str() {
            "ConstraintError" => IndexedDbError::Constraint(msg),
            "DataError" => IndexedDbError::Data(msg),
            "VersionError" => IndexedDbError::Open(msg),
            "AbortError" | "TransactionInactiveError" => IndexedDbError::Transaction(msg),
            _ => IndexedDbError::Request(msg),
        }
    }
}

/// Extract `(name, message)` from a DOMException or any thrown JS value.
pub(crate) fn dom_error(val: &JsValue) -> (String, String) {
    if let Some(exception) = val.dyn_ref::<web_sys::DomException>() {
        return (exception.name(), exception.message());
    }
    if let Some(error) = val.dyn_ref::<js_sys::Error>() {
        return (String::from(error.name()), String::from(error.message()));
    }
    let message = val
        .as_string()
        .or_else(|| {
            js_sys::JSON::stringify(val)
                .ok()
                .map(String::from)
        })
        .unwrap_or_else(|| format!("{:?}", val));
    ("UnknownError".to_string(), message)
}

impl From<JsValue> for IndexedDbError {
    fn from(val: JsValue) -> Self {
        IndexedDbError::from_request(val)
    }
}

/// Convert IndexedDbError to StoreError at the facade boundary
impl From<IndexedDbError> for StoreError {
    fn from(err: IndexedDbError) -> Self {
        match err {
            IndexedDbError::NotAvailable(msg) => StoreError::CapabilityUnavailable(msg),
            IndexedDbError::Open(msg) => StoreError::Connection(msg),
            IndexedDbError::Upgrade(msg) => StoreError::Connection(format!("upgrade: {}", msg)),
            IndexedDbError::Transaction(msg) => StoreError::Request(format!("transaction: {}", msg)),
            IndexedDbError::Request(msg) => StoreError::Request(msg),
            IndexedDbError::Constraint(msg) => StoreError::ConstraintViolation(msg),
            IndexedDbError::Data(msg) => StoreError::InvalidKey(msg),
            IndexedDbError::Cursor(msg) => StoreError::Cursor(msg),
            IndexedDbError::Json(e) => StoreError::Serialization(e.to_string()),
            IndexedDbError::JsValue(msg) => StoreError::Serialization(format!("JS: {}", msg)),
        }
    }
}
