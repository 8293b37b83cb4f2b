//! Configuration Module
//!
//! Hoard construction options and the server's environment-driven settings.

use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Deserializer};

use crate::error::{HoardError, Result};
use crate::storage::DEFAULT_QUOTA_BYTES;

// == Hoard Config ==
/// Options recognized when opening a hoard.
///
/// Collaborators (clock, logger, protector, availability checker and version
/// change handler) are plugged in through [`HoardBuilder`](crate::hoard::HoardBuilder).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HoardConfig {
    /// Partition of the shared store this hoard reads and writes
    pub namespace: String,
    /// Maximum record age in milliseconds; no expiration when absent
    #[serde(default)]
    pub ttl_ms: Option<u64>,
    /// Maximum number of live records; no cap when absent
    #[serde(default)]
    pub max_records: Option<usize>,
    /// Durable store when true, session store otherwise
    #[serde(default)]
    pub persistent: bool,
    /// Schema version to reconcile against; the marker is never touched when absent
    #[serde(default, alias = "version", deserialize_with = "string_or_number")]
    pub expected_version: Option<String>,
}

impl HoardConfig {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            ttl_ms: None,
            max_records: None,
            persistent: false,
            expected_version: None,
        }
    }

    pub fn with_ttl_ms(mut self, ttl_ms: u64) -> Self {
        self.ttl_ms = Some(ttl_ms);
        self
    }

    pub fn with_max_records(mut self, max_records: usize) -> Self {
        self.max_records = Some(max_records);
        self
    }

    pub fn with_persistent(mut self, persistent: bool) -> Self {
        self.persistent = persistent;
        self
    }

    /// Versions are compared as strings, so `1` and `"1"` are the same version.
    pub fn with_expected_version(mut self, version: impl ToString) -> Self {
        self.expected_version = Some(version.to_string());
        self
    }

    // == Validate ==
    pub fn validate(&self) -> Result<()> {
        if self.namespace.is_empty() {
            return Err(HoardError::InvalidConfig(
                "namespace cannot be empty".to_string(),
            ));
        }
        if self.ttl_ms == Some(0) {
            return Err(HoardError::InvalidConfig(
                "ttl_ms must be greater than zero".to_string(),
            ));
        }
        if self.max_records == Some(0) {
            return Err(HoardError::InvalidConfig(
                "max_records must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Accepts `"2"`, `2` or `null` for a version.
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Version {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(Option::<Version>::deserialize(deserializer)?.map(|v| match v {
        Version::Text(s) => s,
        Version::Number(n) => n.to_string(),
    }))
}

// == Server Config ==
/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP server port
    pub server_port: u16,
    /// TTL applied to every namespace; `None` disables expiration
    pub ttl_ms: Option<u64>,
    /// Record cap applied to every namespace; `None` disables the cap
    pub max_records: Option<usize>,
    /// Whether namespaces use the durable store
    pub persistent: bool,
    /// File backing the durable store; in-memory when unset
    pub store_path: Option<PathBuf>,
    /// Byte quota for each store; `None` is unlimited
    pub store_quota: Option<usize>,
    /// Schema version every namespace is reconciled against
    pub version: Option<String>,
}

impl ServerConfig {
    /// Creates a new ServerConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `HOARD_TTL_MS` - Record TTL in milliseconds, 0 disables (default: 300000)
    /// - `HOARD_MAX_RECORDS` - Records per namespace, 0 disables (default: 1000)
    /// - `HOARD_PERSISTENT` - Use the durable store (default: true)
    /// - `HOARD_STORE_PATH` - JSON file for the durable store (default: in-memory)
    /// - `HOARD_STORE_QUOTA` - Store quota in bytes, 0 disables (default: 5 MiB)
    /// - `HOARD_VERSION` - Schema version (default: unversioned)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            server_port: parse_var("SERVER_PORT").unwrap_or(defaults.server_port),
            ttl_ms: parse_var::<u64>("HOARD_TTL_MS").map_or(defaults.ttl_ms, nonzero),
            max_records: parse_var::<usize>("HOARD_MAX_RECORDS")
                .map_or(defaults.max_records, nonzero),
            persistent: parse_var("HOARD_PERSISTENT").unwrap_or(defaults.persistent),
            store_path: env::var_os("HOARD_STORE_PATH").map(PathBuf::from),
            store_quota: parse_var::<usize>("HOARD_STORE_QUOTA")
                .map_or(defaults.store_quota, nonzero),
            version: env::var("HOARD_VERSION").ok().filter(|v| !v.is_empty()),
        }
    }

    /// Options for a namespace opened by the server.
    pub fn hoard_config(&self, namespace: &str) -> HoardConfig {
        HoardConfig {
            namespace: namespace.to_string(),
            ttl_ms: self.ttl_ms,
            max_records: self.max_records,
            persistent: self.persistent,
            expected_version: self.version.clone(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server_port: 3000,
            ttl_ms: Some(300_000),
            max_records: Some(1000),
            persistent: true,
            store_path: None,
            store_quota: Some(DEFAULT_QUOTA_BYTES),
            version: None,
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

fn nonzero<T: Default + PartialEq>(value: T) -> Option<T> {
    (value != T::default()).then_some(value)
}
