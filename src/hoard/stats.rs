//! Hoard Statistics Module
//!
//! Tracks lookup hits and misses, evictions and expirations per hoard.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

// == Hoard Stats ==
/// Point-in-time statistics for one hoard.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HoardStats {
    /// Keys looked up that had a live record
    pub hits: u64,
    /// Keys looked up that were absent, expired or malformed
    pub misses: u64,
    /// Records removed by the max-records cap
    pub evictions: u64,
    /// Records purged after outliving the TTL
    pub expirations: u64,
    /// Live records in the namespace when the snapshot was taken
    pub total_records: usize,
}

impl HoardStats {
    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if no lookups have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

// == Stats Recorder ==
/// Lock-free counters updated through `&self`.
#[derive(Debug, Default)]
pub(crate) struct StatsRecorder {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

impl StatsRecorder {
    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_expiration(&self) {
        self.expirations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, total_records: usize) -> HoardStats {
        HoardStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            total_records,
        }
    }
}
