//! Hoard Context Module
//!
//! Process-scoped state shared by hoards: the persistent and session stores,
//! the fallback store, the namespace event sinks and the default protector.
//! Tests build a fresh context instead of resetting globals.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use tracing::error;

use crate::error::StoreError;
use crate::hoard::events::EventSink;
use crate::hoard::reentrancy::{DispatchThread, ImmediateProtector, ReentrancyProtector};
use crate::storage::{FileStore, KeyValueStore, MemoryStore};

pub struct HoardContext {
    persistent: Arc<dyn KeyValueStore>,
    session: Arc<dyn KeyValueStore>,
    fallback: Arc<MemoryStore>,
    sinks: Mutex<HashMap<String, Arc<EventSink>>>,
    protector: OnceLock<Arc<dyn ReentrancyProtector>>,
}

impl HoardContext {
    pub fn new(persistent: Arc<dyn KeyValueStore>, session: Arc<dyn KeyValueStore>) -> Self {
        Self {
            persistent,
            session,
            fallback: Arc::new(MemoryStore::new()),
            sinks: Mutex::new(HashMap::new()),
            protector: OnceLock::new(),
        }
    }

    /// Both stores in memory, without quotas.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), Arc::new(MemoryStore::new()))
    }

    /// Durable store in the JSON file at `path`; session store in memory.
    /// Both share the same quota.
    pub fn with_file_store(path: impl AsRef<Path>, quota_bytes: Option<usize>) -> Result<Self, StoreError> {
        let persistent = FileStore::open(path, quota_bytes)?;
        let session = match quota_bytes {
            Some(quota) => MemoryStore::with_quota(quota),
            None => MemoryStore::new(),
        };
        Ok(Self::new(Arc::new(persistent), Arc::new(session)))
    }

    /// Store for the requested mode.
    pub fn store(&self, persistent: bool) -> Arc<dyn KeyValueStore> {
        if persistent {
            Arc::clone(&self.persistent)
        } else {
            Arc::clone(&self.session)
        }
    }

    /// In-memory store substituted when the requested store is unusable.
    pub fn fallback_store(&self) -> Arc<dyn KeyValueStore> {
        self.fallback.clone()
    }

    /// The sink for `namespace`, created on first use.
    pub fn event_sink(&self, namespace: &str) -> Arc<EventSink> {
        Arc::clone(self.lock_sinks().entry(namespace.to_string()).or_default())
    }

    /// Protector used by hoards that were not given one.
    ///
    /// A dispatch thread, started on first use. If the thread cannot be
    /// spawned, handlers run inline.
    pub fn default_protector(&self) -> Arc<dyn ReentrancyProtector> {
        let protector = self.protector.get_or_init(|| {
            let protector: Arc<dyn ReentrancyProtector> = match DispatchThread::spawn() {
                Ok(thread) => Arc::new(thread),
                Err(err) => {
                    error!("Could not start hoard event thread, dispatching inline: {}", err);
                    Arc::new(ImmediateProtector)
                }
            };
            protector
        });
        Arc::clone(protector)
    }

    /// Whether [`default_protector`](Self::default_protector) has been resolved.
    pub fn default_protector_started(&self) -> bool {
        self.protector.get().is_some()
    }

    /// Forgets every sink. Hoards already open keep their old sink.
    pub fn reset_event_sinks(&self) {
        self.lock_sinks().clear();
    }

    /// Namespaces that have an event sink.
    pub fn namespaces(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock_sinks().keys().cloned().collect();
        names.sort();
        names
    }

    fn lock_sinks(&self) -> MutexGuard<'_, HashMap<String, Arc<EventSink>>> {
        self.sinks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for HoardContext {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl std::fmt::Debug for HoardContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HoardContext")
            .field("namespaces", &self.namespaces())
            .finish_non_exhaustive()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_is_shared_per_namespace() {
        let context = HoardContext::in_memory();
        let a = context.event_sink("a");
        let again = context.event_sink("a");
        let b = context.event_sink("b");

        assert!(Arc::ptr_eq(&a, &again));
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(context.namespaces(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_reset_event_sinks() {
        let context = HoardContext::in_memory();
        let before = context.event_sink("a");
        context.reset_event_sinks();
        assert!(context.namespaces().is_empty());
        assert!(!Arc::ptr_eq(&before, &context.event_sink("a")));
    }

    #[test]
    fn test_store_selection() {
        let context = HoardContext::in_memory();
        context.store(true).set_item("k", "durable").unwrap();
        assert_eq!(context.store(false).get_item("k"), None);
        assert_eq!(context.store(true).get_item("k"), Some("durable".to_string()));
        assert_eq!(context.fallback_store().get_item("k"), None);
    }

    #[test]
    fn test_default_protector_is_reused() {
        let context = HoardContext::in_memory();
        assert!(!context.default_protector_started());
        let first = context.default_protector();
        let second = context.default_protector();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(context.default_protector_started());
    }

    #[test]
    fn test_with_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hoard.json");

        let context = HoardContext::with_file_store(&path, None).unwrap();
        context.store(true).set_item("k", "v").unwrap();

        let reopened = HoardContext::with_file_store(&path, None).unwrap();
        assert_eq!(reopened.store(true).get_item("k"), Some("v".to_string()));
        assert_eq!(reopened.store(false).get_item("k"), None);
    }
}
