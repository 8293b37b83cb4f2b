//! File Store Module
//!
//! Durable key/value store backed by a single JSON file. The whole map is
//! rewritten on every mutation; a mutation whose write fails is rolled back
//! in memory so the store never reports a value it could not persist.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::error::StoreError;
use crate::storage::memory::Entries;
use crate::storage::KeyValueStore;

// == File Store ==
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<Entries>,
}

impl FileStore {
    /// Opens the store at `path`, loading existing contents if the file exists.
    ///
    /// A missing file is an empty store; the file is created on first write.
    pub fn open(path: impl AsRef<Path>, quota_bytes: Option<usize>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let map: BTreeMap<String, String> = match fs::read(&path) {
            Ok(bytes) if bytes.is_empty() => BTreeMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(err.into()),
        };

        debug!("Opened file store at {} with {} keys", path.display(), map.len());

        Ok(Self {
            path,
            entries: Mutex::new(Entries::from_map(map, quota_bytes)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Writes the map to a sibling temp file, then renames it into place.
    fn persist(&self, entries: &Entries) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(entries.map())?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get_item(&self, key: &str) -> Option<String> {
        self.lock().get(key)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.lock();
        let previous = entries.insert(key, value)?;
        if let Err(err) = self.persist(&entries) {
            entries.restore(key, previous);
            return Err(err);
        }
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.lock();
        let Some(previous) = entries.remove(key) else {
            return Ok(());
        };
        if let Err(err) = self.persist(&entries) {
            entries.restore(key, Some(previous));
            return Err(err);
        }
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        let mut entries = self.lock();
        let snapshot = entries.clone();
        entries.clear();
        if let Err(err) = self.persist(&entries) {
            *entries = snapshot;
            return Err(err);
        }
        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        self.lock().keys()
    }

    fn len(&self) -> usize {
        self.lock().map().len()
    }
}
