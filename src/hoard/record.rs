//! Record Module
//!
//! Wire format for stored records and the namespaced key scheme.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Leading token of every record key.
pub const RECORD_PREFIX: &str = "hoard.r";

/// Leading token of every version marker key.
pub const VERSION_PREFIX: &str = "hoard.v";

// == Record ==
/// A stored value together with the time it was last written.
///
/// Encoded as `{"v": <value>, "t": <ms>}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "v")]
    pub value: Value,
    #[serde(rename = "t")]
    pub last_update_ms: u64,
}

/// A stored string that does not decode as a [`Record`].
#[derive(Error, Debug)]
#[error("Malformed record: {0}")]
pub struct MalformedRecord(#[from] serde_json::Error);

impl Record {
    pub fn new(value: Value, now_ms: u64) -> Self {
        Self {
            value,
            last_update_ms: now_ms,
        }
    }

    // == Is Expired ==
    /// A record is expired once strictly more than `ttl_ms` has passed since
    /// its last write. Without a TTL it never expires.
    pub fn is_expired(&self, ttl_ms: Option<u64>, now_ms: u64) -> bool {
        match ttl_ms {
            Some(ttl) => now_ms.saturating_sub(self.last_update_ms) > ttl,
            None => false,
        }
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn decode(raw: &str) -> Result<Self, MalformedRecord> {
        Ok(serde_json::from_str(raw)?)
    }
}

// == Key Space ==
/// Maps application keys of one namespace to storage keys and back.
///
/// Record keys look like `hoard.r:<len>:<namespace>:<key>`. The byte length
/// of the namespace pins down where it ends, so no character has to be
/// reserved and no namespace's prefix can match another namespace's keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpace {
    record_prefix: String,
    version_key: String,
}

impl KeySpace {
    pub fn new(namespace: &str) -> Self {
        Self {
            record_prefix: format!("{RECORD_PREFIX}:{}:{namespace}:", namespace.len()),
            version_key: format!("{VERSION_PREFIX}:{}:{namespace}", namespace.len()),
        }
    }

    /// Storage key for an application key.
    pub fn wrap(&self, key: &str) -> String {
        format!("{}{key}", self.record_prefix)
    }

    /// Application key for a storage key, if it belongs to this namespace.
    pub fn unwrap<'a>(&self, storage_key: &'a str) -> Option<&'a str> {
        storage_key.strip_prefix(self.record_prefix.as_str())
    }

    pub fn contains(&self, storage_key: &str) -> bool {
        storage_key.starts_with(self.record_prefix.as_str())
    }

    /// Reserved key holding this namespace's schema version.
    pub fn version_key(&self) -> &str {
        &self.version_key
    }
}
