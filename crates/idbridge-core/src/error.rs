//! Storage error types

use thiserror::Error;

/// Errors that can occur during storage operations.
///
/// Every variant terminates the operation that produced it. Nothing is
/// retried internally.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The host environment has no storage engine
    #[error("storage engine not available: {0}")]
    CapabilityUnavailable(String),

    /// An operation was attempted before initialization reached `Ready`
    #[error("storage not initialized; call initialize() first")]
    NotInitialized,

    /// Opening the database or running its migration failed
    #[error("connection error: {0}")]
    Connection(String),

    /// A record with the same primary key already exists
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// Generic per-request failure reported by the engine
    #[error("request error: {0}")]
    Request(String),

    /// Failure while stepping a cursor during a scan
    #[error("cursor error: {0}")]
    Cursor(String),

    /// The record has no valid key at its collection's key path
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Invalid database or schema configuration
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl StoreError {
    /// Stable variant name, used as the JS error `name` by the browser bindings.
    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::CapabilityUnavailable(_) => "CapabilityUnavailable",
            StoreError::NotInitialized => "NotInitialized",
            StoreError::Connection(_) => "ConnectionError",
            StoreError::ConstraintViolation(_) => "ConstraintViolation",
            StoreError::Request(_) => "RequestError",
            StoreError::Cursor(_) => "CursorError",
            StoreError::InvalidKey(_) => "InvalidKey",
            StoreError::Serialization(_) => "SerializationError",
            StoreError::Config(_) => "ConfigError",
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;
