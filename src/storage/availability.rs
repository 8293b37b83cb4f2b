//! Storage Availability Module
//!
//! Decides whether a store is usable before a hoard commits to it.

use crate::error::StoreError;
use crate::storage::KeyValueStore;

/// Key written and removed by the availability probe.
pub const PROBE_KEY: &str = "hoard.probe";

// == Checker Trait ==
/// Probes a store once, at hoard construction.
pub trait StorageAvailabilityChecker: Send + Sync {
    fn assert_available(&self, store: &dyn KeyValueStore) -> Result<(), StoreError>;
}

// == Probe Checker ==
/// Writes, reads back and deletes a probe key.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProbeChecker;

impl StorageAvailabilityChecker for ProbeChecker {
    fn assert_available(&self, store: &dyn KeyValueStore) -> Result<(), StoreError> {
        store.set_item(PROBE_KEY, PROBE_KEY)?;
        let read_back = store.get_item(PROBE_KEY);
        store.remove_item(PROBE_KEY)?;

        if read_back.as_deref() != Some(PROBE_KEY) {
            return Err(StoreError::Unavailable(
                "probe value did not read back".to_string(),
            ));
        }
        Ok(())
    }
}

impl<F> StorageAvailabilityChecker for F
where
    F: Fn(&dyn KeyValueStore) -> Result<(), StoreError> + Send + Sync,
{
    fn assert_available(&self, store: &dyn KeyValueStore) -> Result<(), StoreError> {
        self(store)
    }
}
