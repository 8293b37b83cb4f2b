//! Memory Store Module
//!
//! In-process key/value store. Quota-limited it stands in for session
//! storage; unlimited it is the fallback store used when the real store
//! fails its availability probe.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::StoreError;
use crate::storage::KeyValueStore;

// == Entries ==
/// Key/value map with byte accounting against an optional quota.
///
/// Usage counts the UTF-8 length of every key and value.
#[derive(Debug, Default, Clone)]
pub(crate) struct Entries {
    map: BTreeMap<String, String>,
    used: usize,
    quota: Option<usize>,
}

impl Entries {
    pub(crate) fn new(quota: Option<usize>) -> Self {
        Self {
            map: BTreeMap::new(),
            used: 0,
            quota,
        }
    }

    pub(crate) fn from_map(map: BTreeMap<String, String>, quota: Option<usize>) -> Self {
        let used = map.iter().map(|(k, v)| k.len() + v.len()).sum();
        Self { map, used, quota }
    }

    pub(crate) fn map(&self) -> &BTreeMap<String, String> {
        &self.map
    }

    pub(crate) fn get(&self, key: &str) -> Option<String> {
        self.map.get(key).cloned()
    }

    /// Inserts a value, returning the previous one.
    ///
    /// Leaves the map untouched when the quota would be exceeded.
    pub(crate) fn insert(&mut self, key: &str, value: &str) -> Result<Option<String>, StoreError> {
        let previous = self.map.get(key).map(|v| key.len() + v.len()).unwrap_or(0);
        let required = self.used - previous + key.len() + value.len();

        if let Some(quota) = self.quota {
            if required > quota {
                return Err(StoreError::QuotaExceeded { required, quota });
            }
        }

        self.used = required;
        Ok(self.map.insert(key.to_string(), value.to_string()))
    }

    pub(crate) fn remove(&mut self, key: &str) -> Option<String> {
        let removed = self.map.remove(key);
        if let Some(value) = &removed {
            self.used -= key.len() + value.len();
        }
        removed
    }

    /// Puts back a value overwritten or removed by a failed operation.
    pub(crate) fn restore(&mut self, key: &str, previous: Option<String>) {
        self.remove(key);
        if let Some(value) = previous {
            self.used += key.len() + value.len();
            self.map.insert(key.to_string(), value);
        }
    }

    pub(crate) fn clear(&mut self) {
        self.map.clear();
        self.used = 0;
    }

    pub(crate) fn keys(&self) -> Vec<String> {
        self.map.keys().cloned().collect()
    }

    pub(crate) fn used(&self) -> usize {
        self.used
    }
}

// == Memory Store ==
/// Thread-safe in-memory store with no persistence.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<Entries>,
}

impl MemoryStore {
    /// Creates an unlimited store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that rejects writes past `quota_bytes`.
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            entries: Mutex::new(Entries::new(Some(quota_bytes))),
        }
    }

    /// Bytes currently used by keys and values.
    pub fn used_bytes(&self) -> usize {
        self.lock().used()
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl KeyValueStore for MemoryStore {
    fn get_item(&self, key: &str) -> Option<String> {
        self.lock().get(key)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.lock().insert(key, value).map(|_| ())
    }

    fn remove_item(&self, key: &str) -> Result<(), StoreError> {
        self.lock().remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.lock().clear();
        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        self.lock().keys()
    }

    fn len(&self) -> usize {
        self.lock().map().len()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_remove() {
        let store = MemoryStore::new();
        store.set_item("a", "1").unwrap();
        assert_eq!(store.get_item("a"), Some("1".to_string()));

        store.remove_item("a").unwrap();
        assert_eq!(store.get_item("a"), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_remove_missing_key_is_ok() {
        let store = MemoryStore::new();
        assert!(store.remove_item("nope").is_ok());
    }

    #[test]
    fn test_keys_are_enumerated_in_order() {
        let store = MemoryStore::new();
        store.set_item("b", "2").unwrap();
        store.set_item("a", "1").unwrap();
        assert_eq!(store.keys(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_clear_removes_everything() {
        let store = MemoryStore::new();
        store.set_item("a", "1").unwrap();
        store.set_item("b", "2").unwrap();
        store.clear().unwrap();
        assert_eq!(store.len(), 0);
        assert_eq!(store.used_bytes(), 0);
    }

    #[test]
    fn test_quota_rejects_oversized_write() {
        let store = MemoryStore::with_quota(10);
        store.set_item("ab", "cdef").unwrap(); // 6 bytes

        let result = store.set_item("gh", "ijkl"); // would be 12
        assert!(matches!(
            result,
            Err(StoreError::QuotaExceeded { required: 12, quota: 10 })
        ));
        assert_eq!(store.get_item("gh"), None);
        assert_eq!(store.used_bytes(), 6);
    }

    #[test]
    fn test_quota_counts_overwrite_once() {
        let store = MemoryStore::with_quota(10);
        store.set_item("ab", "cdef").unwrap();
        // Replacing the value frees the old bytes first.
        store.set_item("ab", "cdefghij").unwrap();
        assert_eq!(store.used_bytes(), 10);
    }

    #[test]
    fn test_restore_rolls_back_insert() {
        let mut entries = Entries::new(None);
        entries.insert("k", "old").unwrap();
        let previous = entries.insert("k", "newer").unwrap();
        entries.restore("k", previous);
        assert_eq!(entries.get("k"), Some("old".to_string()));
        assert_eq!(entries.used(), 4);
    }
}
