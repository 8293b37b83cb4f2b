//! Error types for the hoard cache
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Store Error Enum ==
/// Failures reported by an underlying key/value store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The write would push the store past its capacity
    #[error("Storage quota exceeded: {required} bytes required, quota is {quota} bytes")]
    QuotaExceeded { required: usize, quota: usize },

    /// The store cannot be used in this environment
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// Reading or writing the backing file failed
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The backing file does not hold a valid key/value map
    #[error("Storage is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

// == Hoard Error Enum ==
/// Unified error type for hoard operations.
#[derive(Error, Debug)]
pub enum HoardError {
    /// Event name outside PUT, REMOVE, CLEAR
    #[error("Invalid event: {0} (expected one of PUT, REMOVE, CLEAR)")]
    InvalidEvent(String),

    /// The underlying store rejected a write or delete
    #[error("Storage write failed for key '{key}': {source}")]
    StorageWriteFailed {
        key: String,
        #[source]
        source: StoreError,
    },

    /// Construction options failed validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A value passed to put has no usable key under the key field
    #[error("Value has no string or number field '{0}' to use as its key")]
    MissingKeyField(String),

    /// A value could not be converted to JSON
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Request body or path failed validation
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A blocking hoard call panicked or was cancelled
    #[error("Background task failed: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),

    /// Key not found in the hoard
    #[error("Key not found: {0}")]
    NotFound(String),
}

impl HoardError {
    /// Wraps a store failure for the given application key.
    pub fn write_failed(key: impl Into<String>, source: StoreError) -> Self {
        HoardError::StorageWriteFailed {
            key: key.into(),
            source,
        }
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for HoardError {
    fn into_response(self) -> Response {
        let status = match &self {
            HoardError::InvalidEvent(_)
            | HoardError::InvalidConfig(_)
            | HoardError::InvalidRequest(_)
            | HoardError::MissingKeyField(_)
            | HoardError::Serialization(_) => StatusCode::BAD_REQUEST,
            HoardError::NotFound(_) => StatusCode::NOT_FOUND,
            HoardError::TaskFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            HoardError::StorageWriteFailed {
                source: StoreError::QuotaExceeded { .. },
                ..
            } => StatusCode::INSUFFICIENT_STORAGE,
            HoardError::StorageWriteFailed { .. } => StatusCode::SERVICE_UNAVAILABLE,
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for hoard operations.
pub type Result<T> = std::result::Result<T, HoardError>;
