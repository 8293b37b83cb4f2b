//! Hoard - namespaced record caching over a shared key/value store
//!
//! Records expire after a TTL, the least recently updated are evicted past a
//! record cap, and subscribers hear about every put, remove and clear.

pub mod api;
pub mod clock;
pub mod config;
pub mod error;
pub mod hoard;
pub mod models;
pub mod storage;

pub use api::AppState;
pub use config::{HoardConfig, ServerConfig};
pub use error::{HoardError, Result, StoreError};
pub use hoard::{Hoard, HoardContext, HoardEvent};
