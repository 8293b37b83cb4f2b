//! Response DTOs for the hoard server API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;
use serde_json::Value;

use crate::hoard::HoardStats;

/// Response body for a single record (GET /hoards/:namespace/records/:key)
#[derive(Debug, Clone, Serialize)]
pub struct RecordResponse {
    /// The requested key
    pub key: String,
    /// The stored value
    pub value: Value,
}

impl RecordResponse {
    /// Creates a new RecordResponse
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// Response body for multi-record reads (records by key, latest)
#[derive(Debug, Clone, Serialize)]
pub struct RecordsResponse {
    pub namespace: String,
    pub values: Vec<Value>,
}

impl RecordsResponse {
    pub fn new(namespace: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            namespace: namespace.into(),
            values,
        }
    }
}

/// Response body for puts
#[derive(Debug, Clone, Serialize)]
pub struct PutResponse {
    /// Success message
    pub message: String,
    /// Number of values written
    pub stored: usize,
}

impl PutResponse {
    /// Creates a new PutResponse
    pub fn new(namespace: &str, stored: usize) -> Self {
        Self {
            message: format!("Stored {} record(s) in '{}'", stored, namespace),
            stored,
        }
    }
}

/// Response body for DELETE /hoards/:namespace/records/:key
#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    /// Success message
    pub message: String,
    /// The key that was deleted
    pub key: String,
}

impl DeleteResponse {
    /// Creates a new DeleteResponse
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' removed", key),
            key,
        }
    }
}

/// Response body for DELETE /hoards/:namespace/records
#[derive(Debug, Clone, Serialize)]
pub struct ClearResponse {
    pub message: String,
}

impl ClearResponse {
    pub fn new(namespace: &str) -> Self {
        Self {
            message: format!("Namespace '{}' cleared", namespace),
        }
    }
}

/// Response body for POST /hoards/:namespace/excludes
#[derive(Debug, Clone, Serialize)]
pub struct ExcludesResponse {
    /// Requested keys with no live record
    pub missing: Vec<String>,
}

/// Response body for GET /hoards/:namespace/version
#[derive(Debug, Clone, Serialize)]
pub struct VersionResponse {
    pub namespace: String,
    /// Empty when the namespace is unversioned
    pub version: String,
}

/// Response body for GET /hoards/:namespace/stats
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub namespace: String,
    /// Number of lookups that found a live record
    pub hits: u64,
    /// Number of lookups that found nothing
    pub misses: u64,
    /// Number of records evicted by the cap
    pub evictions: u64,
    /// Number of records purged after their TTL
    pub expirations: u64,
    /// Current number of live records
    pub total_records: usize,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
    /// Whether the namespace fell back to in-memory storage
    pub fallback: bool,
}

impl StatsResponse {
    /// Creates a new StatsResponse from hoard statistics
    pub fn new(namespace: impl Into<String>, stats: &HoardStats, fallback: bool) -> Self {
        Self {
            namespace: namespace.into(),
            hits: stats.hits,
            misses: stats.misses,
            evictions: stats.evictions,
            expirations: stats.expirations,
            total_records: stats.total_records,
            hit_rate: stats.hit_rate(),
            fallback,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    /// Creates a new ErrorResponse
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
