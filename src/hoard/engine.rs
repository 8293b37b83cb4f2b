//! Hoard Engine Module
//!
//! The cache engine: namespaced CRUD over a shared key/value store with
//! lazy TTL expiration, a max-records cap evicting the least recently
//! updated records, and change events.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::HoardConfig;
use crate::error::{HoardError, Result};
use crate::hoard::events::{EventHandler, EventSink, HoardEvent};
use crate::hoard::reentrancy::ReentrancyProtector;
use crate::hoard::record::{KeySpace, Record};
use crate::hoard::stats::{HoardStats, StatsRecorder};
use crate::hoard::version::{self, IgnoreVersionChange, VersionChangeHandler};
use crate::hoard::HoardContext;
use crate::storage::{KeyValueStore, ProbeChecker, StorageAvailabilityChecker};

/// Diagnostic sink for messages a caller should hear about, such as falling
/// back to in-memory storage.
pub type Logger = Arc<dyn Fn(&str) + Send + Sync>;

fn tracing_logger() -> Logger {
    Arc::new(|message: &str| warn!("{}", message))
}

// == Hoard ==
/// A namespaced, expiring, capacity-bounded view over a shared store.
///
/// Every operation takes `&self`; the store and event sink are shared with
/// other hoards and synchronize internally.
pub struct Hoard {
    namespace: String,
    keys: KeySpace,
    ttl_ms: Option<u64>,
    max_records: Option<usize>,
    store: Arc<dyn KeyValueStore>,
    fallback: bool,
    clock: Arc<dyn Clock>,
    protector: Arc<dyn ReentrancyProtector>,
    events: Arc<EventSink>,
    stats: StatsRecorder,
}

impl Hoard {
    /// Opens a hoard with default collaborators.
    pub fn open(context: &HoardContext, config: HoardConfig) -> Result<Self> {
        Self::builder(context, config).open()
    }

    pub fn builder(context: &HoardContext, config: HoardConfig) -> HoardBuilder<'_> {
        HoardBuilder::new(context, config)
    }

    // == Get ==
    /// Values for `keys`, in the order requested.
    ///
    /// Absent, expired and malformed records are skipped, so the result may
    /// be shorter than `keys`. Repeated keys yield repeated values.
    pub fn get<K: AsRef<str>>(&self, keys: &[K]) -> Vec<Value> {
        let now = self.clock.now_ms();
        keys.iter()
            .filter_map(|key| {
                let found = self.live_record(key.as_ref(), now);
                match found {
                    Some(_) => self.stats.record_hit(),
                    None => self.stats.record_miss(),
                }
                found.map(|record| record.value)
            })
            .collect()
    }

    pub fn get_one(&self, key: &str) -> Option<Value> {
        self.get(&[key]).pop()
    }

    // == Put ==
    /// Writes each value under the key found in its `key_field`, then
    /// applies the max-records cap once for the whole batch.
    ///
    /// Key fields are checked for every value before anything is written.
    /// A store failure stops the batch; values written before it stay, and
    /// the cap is still applied to them before the failure is returned.
    pub fn put<T: Serialize>(&self, values: &[T], key_field: &str) -> Result<()> {
        let entries = values
            .iter()
            .map(|value| {
                let value = serde_json::to_value(value)?;
                let key = key_of(&value, key_field)?;
                Ok((key, value))
            })
            .collect::<Result<Vec<_>>>()?;

        let written = entries
            .into_iter()
            .try_for_each(|(key, value)| self.write(key, value));
        let evicted = self.enforce_max_records();

        written.and(evicted)
    }

    pub fn put_one<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        self.write(key.to_string(), serde_json::to_value(value)?)?;
        self.enforce_max_records()
    }

    // == Remove ==
    pub fn remove<K: AsRef<str>>(&self, keys: &[K]) -> Result<()> {
        keys.iter().try_for_each(|key| self.remove_one(key.as_ref()))
    }

    /// Deletes the record for `key`. Emits REMOVE with the removed value;
    /// a missing key is a silent no-op.
    pub fn remove_one(&self, key: &str) -> Result<()> {
        let storage_key = self.keys.wrap(key);
        let Some(record) = self.read_record(&storage_key, self.clock.now_ms()) else {
            return Ok(());
        };

        self.store
            .remove_item(&storage_key)
            .map_err(|source| HoardError::write_failed(key, source))?;

        self.publish(HoardEvent::Remove {
            key: key.to_string(),
            value: record.value,
        });
        Ok(())
    }

    // == Excludes ==
    /// The keys from `keys` that have no live record, in input order.
    pub fn excludes<K: AsRef<str>>(&self, keys: &[K]) -> Vec<String> {
        let now = self.clock.now_ms();
        keys.iter()
            .map(|key| key.as_ref())
            .filter(|key| self.live_record(key, now).is_none())
            .map(str::to_string)
            .collect()
    }

    // == Get Latest ==
    /// Up to `limit` values, most recently updated first.
    pub fn get_latest(&self, limit: usize) -> Vec<Value> {
        self.records_by_last_update(self.clock.now_ms())
            .into_iter()
            .take(limit)
            .map(|(_, record)| record.value)
            .collect()
    }

    // == Clear ==
    /// Removes every record of this namespace, leaving other namespaces and
    /// the version marker alone, then emits one CLEAR.
    pub fn clear(&self) -> Result<()> {
        for storage_key in self.store.keys() {
            let Some(key) = self.keys.unwrap(&storage_key) else {
                continue;
            };
            self.store
                .remove_item(&storage_key)
                .map_err(|source| HoardError::write_failed(key, source))?;
        }

        debug!("Cleared namespace '{}'", self.namespace);
        self.publish(HoardEvent::Clear);
        Ok(())
    }

    // == Version ==
    /// The stored schema version, or an empty string if none.
    pub fn version(&self) -> String {
        self.stored_version().unwrap_or_default()
    }

    pub(crate) fn stored_version(&self) -> Option<String> {
        self.store.get_item(self.keys.version_key())
    }

    // == Events ==
    /// Subscribes to `PUT`, `REMOVE` or `CLEAR` on this namespace.
    pub fn on(&self, event: &str, handler: EventHandler) -> Result<()> {
        self.events.on(event, handler)
    }

    pub fn off(&self, event: &str, handler: &EventHandler) -> Result<()> {
        self.events.off(event, handler)
    }

    // == Introspection ==
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// True when the requested store failed its probe and data lives only
    /// in memory.
    pub fn is_fallback(&self) -> bool {
        self.fallback
    }

    /// Number of live records. Purges any expired records it finds.
    pub fn len(&self) -> usize {
        self.records_by_last_update(self.clock.now_ms()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> HoardStats {
        self.stats.snapshot(self.len())
    }

    pub(crate) fn key_space(&self) -> &KeySpace {
        &self.keys
    }

    pub(crate) fn backing_store(&self) -> &dyn KeyValueStore {
        self.store.as_ref()
    }

    // == Internals ==
    fn write(&self, key: String, value: Value) -> Result<()> {
        let record = Record::new(value, self.clock.now_ms());
        let encoded = record.encode()?;

        self.store
            .set_item(&self.keys.wrap(&key), &encoded)
            .map_err(|source| HoardError::write_failed(key.as_str(), source))?;

        self.publish(HoardEvent::Put {
            key,
            value: record.value,
        });
        Ok(())
    }

    fn live_record(&self, key: &str, now: u64) -> Option<Record> {
        self.read_record(&self.keys.wrap(key), now)
    }

    /// Decodes the record under `storage_key`, purging it if expired.
    fn read_record(&self, storage_key: &str, now: u64) -> Option<Record> {
        let raw = self.store.get_item(storage_key)?;

        let record = match Record::decode(&raw) {
            Ok(record) => record,
            Err(err) => {
                debug!("Skipping {}: {}", storage_key, err);
                return None;
            }
        };

        if record.is_expired(self.ttl_ms, now) {
            self.purge_expired(storage_key, record);
            return None;
        }

        Some(record)
    }

    fn purge_expired(&self, storage_key: &str, record: Record) {
        if let Err(err) = self.store.remove_item(storage_key) {
            warn!("Failed to purge expired record {}: {}", storage_key, err);
            return;
        }

        self.stats.record_expiration();
        debug!("Expired {}", storage_key);

        if let Some(key) = self.keys.unwrap(storage_key) {
            self.publish(HoardEvent::Remove {
                key: key.to_string(),
                value: record.value,
            });
        }
    }

    /// Live records of the namespace, newest first. Records with equal
    /// timestamps keep store enumeration order.
    fn records_by_last_update(&self, now: u64) -> Vec<(String, Record)> {
        let mut records: Vec<(String, Record)> = self
            .store
            .keys()
            .into_iter()
            .filter_map(|storage_key| {
                let key = self.keys.unwrap(&storage_key)?.to_string();
                let record = self.read_record(&storage_key, now)?;
                Some((key, record))
            })
            .collect();

        records.sort_by(|a, b| b.1.last_update_ms.cmp(&a.1.last_update_ms));
        records
    }

    // == Enforce Max Records ==
    /// Evicts every live record beyond the newest `max_records`, emitting
    /// REMOVE for each.
    fn enforce_max_records(&self) -> Result<()> {
        let Some(max_records) = self.max_records else {
            return Ok(());
        };

        let records = self.records_by_last_update(self.clock.now_ms());
        for (key, record) in records.into_iter().skip(max_records) {
            self.store
                .remove_item(&self.keys.wrap(&key))
                .map_err(|source| HoardError::write_failed(key.as_str(), source))?;

            self.stats.record_eviction();
            debug!("Evicted '{}' from namespace '{}'", key, self.namespace);

            self.publish(HoardEvent::Remove {
                key,
                value: record.value,
            });
        }
        Ok(())
    }

    fn publish(&self, event: HoardEvent) {
        self.events.publish(event, self.protector.as_ref());
    }
}

impl fmt::Debug for Hoard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hoard")
            .field("namespace", &self.namespace)
            .field("ttl_ms", &self.ttl_ms)
            .field("max_records", &self.max_records)
            .field("fallback", &self.fallback)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

/// The string form of `value[key_field]`; numbers are stringified.
fn key_of(value: &Value, key_field: &str) -> Result<String> {
    match value.get(key_field) {
        Some(Value::String(key)) => Ok(key.clone()),
        Some(Value::Number(key)) => Ok(key.to_string()),
        _ => Err(HoardError::MissingKeyField(key_field.to_string())),
    }
}

// == Hoard Builder ==
/// Opens a hoard with some collaborators replaced.
pub struct HoardBuilder<'a> {
    context: &'a HoardContext,
    config: HoardConfig,
    clock: Option<Arc<dyn Clock>>,
    logger: Option<Logger>,
    protector: Option<Arc<dyn ReentrancyProtector>>,
    checker: Option<Arc<dyn StorageAvailabilityChecker>>,
    version_handler: Option<Arc<dyn VersionChangeHandler>>,
}

impl<'a> HoardBuilder<'a> {
    pub fn new(context: &'a HoardContext, config: HoardConfig) -> Self {
        Self {
            context,
            config,
            clock: None,
            logger: None,
            protector: None,
            checker: None,
            version_handler: None,
        }
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn reentrancy_protector(mut self, protector: Arc<dyn ReentrancyProtector>) -> Self {
        self.protector = Some(protector);
        self
    }

    pub fn storage_availability_checker(mut self, checker: Arc<dyn StorageAvailabilityChecker>) -> Self {
        self.checker = Some(checker);
        self
    }

    pub fn version_change_handler(mut self, handler: Arc<dyn VersionChangeHandler>) -> Self {
        self.version_handler = Some(handler);
        self
    }

    // == Open ==
    /// Validates the config, resolves the store (falling back to memory if
    /// the probe fails), attaches the namespace's event sink and reconciles
    /// the schema version.
    pub fn open(self) -> Result<Hoard> {
        self.config.validate()?;

        let HoardConfig {
            namespace,
            ttl_ms,
            max_records,
            persistent,
            expected_version,
        } = self.config;

        let logger = self.logger.unwrap_or_else(tracing_logger);
        let checker = self.checker.unwrap_or_else(|| Arc::new(ProbeChecker));

        let requested = self.context.store(persistent);
        let (store, fallback) = match checker.assert_available(requested.as_ref()) {
            Ok(()) => (requested, false),
            Err(err) => {
                logger(&format!(
                    "{} storage is unavailable for namespace '{}' ({}); falling back to in-memory storage",
                    if persistent { "Persistent" } else { "Session" },
                    namespace,
                    err
                ));
                (self.context.fallback_store(), true)
            }
        };

        let hoard = Hoard {
            keys: KeySpace::new(&namespace),
            events: self.context.event_sink(&namespace),
            namespace,
            ttl_ms,
            max_records,
            store,
            fallback,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            protector: self
                .protector
                .unwrap_or_else(|| self.context.default_protector()),
            stats: StatsRecorder::default(),
        };

        let handler = self
            .version_handler
            .unwrap_or_else(|| Arc::new(IgnoreVersionChange));
        version::reconcile(&hoard, expected_version.as_deref(), handler.as_ref())?;

        Ok(hoard)
    }
}
