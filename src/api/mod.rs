//! API Module
//!
//! HTTP handlers and routing for the hoard server REST API.
//!
//! # Endpoints
//! - `GET /health` - Health check endpoint
//! - `/hoards/:namespace/records[/:key]` - Record reads, writes and deletes
//! - `POST /hoards/:namespace/lookup` - Values for a JSON list of keys
//! - `POST /hoards/:namespace/excludes` - Keys with no live record
//! - `GET /hoards/:namespace/latest` - Most recently updated values
//! - `GET /hoards/:namespace/version` - Stored schema version
//! - `GET /hoards/:namespace/stats` - Namespace statistics

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
