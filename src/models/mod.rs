//! Request and Response models for the hoard server API
//!
//! This module defines the DTOs (Data Transfer Objects) used for
//! serializing/deserializing HTTP request and response bodies.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{KeysQuery, KeysRequest, LatestQuery, PutRecordsRequest};
pub use responses::{
    ClearResponse, DeleteResponse, ErrorResponse, ExcludesResponse, HealthResponse, PutResponse,
    RecordResponse, RecordsResponse, StatsResponse, VersionResponse,
};
