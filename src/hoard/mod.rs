//! Hoard Module
//!
//! Namespaced record caching with TTL expiration, max-records eviction,
//! change events and schema version reconciliation.

mod context;
mod engine;
mod events;
mod reentrancy;
mod record;
mod stats;
mod version;


// Re-export public types
pub use context::HoardContext;
pub use engine::{Hoard, HoardBuilder, Logger};
pub use events::{EventHandler, EventKind, EventSink, HoardEvent};
pub use reentrancy::{
    DeferredQueue, DispatchThread, ImmediateProtector, ReentrancyProtector, Task, TokioProtector,
};
pub use record::{KeySpace, MalformedRecord, Record, RECORD_PREFIX, VERSION_PREFIX};
pub use stats::HoardStats;
pub use version::{ClearingVersionChangeHandler, IgnoreVersionChange, VersionChangeHandler};

// == Public Constants ==
/// Maximum allowed key length in bytes for keys arriving over HTTP
pub const MAX_KEY_LENGTH: usize = 256;

/// Default `limit` for latest-records queries
pub const DEFAULT_LATEST_LIMIT: usize = 10;
