//! Cache Statistics Module
//!
//! Tracks how lookups were served: from cache, from the backend, or not at all.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

// == Cache Stats ==
/// Snapshot of the lookup and cache counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Fresh entries served with candidates
    pub hits: u64,
    /// Fresh entries served that record a failed lookup
    pub negative_hits: u64,
    /// Lookups with no entry at all
    pub misses: u64,
    /// Lookups whose entry had outlived the TTL
    pub expired: u64,
    /// Entries dropped to respect the entry cap
    pub evictions: u64,
    /// Requests sent to the backend
    pub backend_calls: u64,
    /// Backend requests that produced no candidates
    pub backend_failures: u64,
    /// Current number of entries in the cache
    pub total_entries: usize,
}

impl CacheStats {
    // == Hit Rate ==
    /// Share of lookups answered from the cache, positive or negative.
    ///
    /// Returns 0.0 if no lookups have been made.
    pub fn hit_rate(&self) -> f64 {
        let served = self.hits + self.negative_hits;
        let total = served + self.misses + self.expired;
        if total == 0 {
            0.0
        } else {
            served as f64 / total as f64
        }
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "entries={} hits={} negative_hits={} misses={} expired={} evictions={} \
             backend_calls={} backend_failures={} hit_rate={:.2}",
            self.total_entries,
            self.hits,
            self.negative_hits,
            self.misses,
            self.expired,
            self.evictions,
            self.backend_calls,
            self.backend_failures,
            self.hit_rate()
        )
    }
}

// == Stat Counters ==
/// Live counters, updated through a shared reference.
///
/// Lets cache hits be recorded while only a read lock on the store is held.
#[derive(Debug, Default)]
pub struct StatCounters {
    hits: AtomicU64,
    negative_hits: AtomicU64,
    misses: AtomicU64,
    expired: AtomicU64,
    evictions: AtomicU64,
    backend_calls: AtomicU64,
    backend_failures: AtomicU64,
}

impl StatCounters {
    // == Constructor ==
    /// Creates a new set of counters, all at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Record Hit ==
    /// Counts a fresh entry served with candidates.
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    // == Record Negative Hit ==
    /// Counts a fresh entry served that records a failed lookup.
    pub fn record_negative_hit(&self) {
        self.negative_hits.fetch_add(1, Ordering::Relaxed);
    }

    // == Record Miss ==
    /// Counts a lookup for a query never seen before.
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    // == Record Expired ==
    /// Counts a lookup whose entry had outlived the TTL.
    pub fn record_expired(&self) {
        self.expired.fetch_add(1, Ordering::Relaxed);
    }

    // == Record Evictions ==
    /// Counts entries dropped to respect the entry cap.
    pub fn record_evictions(&self, count: u64) {
        self.evictions.fetch_add(count, Ordering::Relaxed);
    }

    // == Record Backend Call ==
    /// Counts one backend request and whether it failed.
    pub fn record_backend_call(&self, succeeded: bool) {
        self.backend_calls.fetch_add(1, Ordering::Relaxed);
        if !succeeded {
            self.backend_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    // == Snapshot ==
    /// Reads every counter into a [`CacheStats`].
    pub fn snapshot(&self, total_entries: usize) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            negative_hits: self.negative_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            backend_calls: self.backend_calls.load(Ordering::Relaxed),
            backend_failures: self.backend_failures.load(Ordering::Relaxed),
            total_entries,
        }
    }
}
