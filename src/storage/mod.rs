//! Storage Module
//!
//! The synchronous string key/value contract hoards are layered on, plus the
//! stores and availability probe that ship with the crate.

mod availability;
mod file;
mod memory;

pub use availability::{ProbeChecker, StorageAvailabilityChecker, PROBE_KEY};
pub use file::FileStore;
pub use memory::MemoryStore;

use crate::error::StoreError;

/// Default quota for stores created by the server: 5 MiB, like browser storage.
pub const DEFAULT_QUOTA_BYTES: usize = 5 * 1024 * 1024;

// == Key Value Store Trait ==
/// A shared, synchronous string-to-string store.
///
/// Implementations use interior mutability so any number of hoards can hold
/// the same store behind an `Arc`. Writes may fail when the store is full or
/// unusable; reads never fail.
pub trait KeyValueStore: Send + Sync {
    /// Reads the value stored under `key`.
    fn get_item(&self, key: &str) -> Option<String>;

    /// Writes `value` under `key`, replacing any previous value.
    fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Deletes `key`. Deleting a missing key succeeds.
    fn remove_item(&self, key: &str) -> Result<(), StoreError>;

    /// Deletes every key in the store, across all namespaces.
    fn clear(&self) -> Result<(), StoreError>;

    /// Enumerates every key currently in the store.
    fn keys(&self) -> Vec<String>;

    fn len(&self) -> usize {
        self.keys().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
