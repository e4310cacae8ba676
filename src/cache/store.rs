//! Cache Store Module
//!
//! Maps raw query bytes to the last lookup result for that query.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::cache::{CacheEntry, CacheStats, StatCounters};

// == Cache Store ==
/// Query cache with TTL-based freshness.
///
/// Nothing is removed on expiry; a stale entry simply stops being served and
/// is replaced on the next lookup. Growth is unbounded unless `max_entries`
/// is set.
#[derive(Debug)]
pub struct CacheStore {
    /// Query bytes to last result
    entries: HashMap<Vec<u8>, CacheEntry>,
    /// Lookup statistics, writable through `&self`
    stats: StatCounters,
    /// How long an entry is served
    ttl: Duration,
    /// Optional cap on the number of entries
    max_entries: Option<usize>,
}

impl CacheStore {
    // == Constructor ==
    /// Creates an empty store.
    ///
    /// # Arguments
    /// * `ttl` - How long an entry, positive or negative, is served
    /// * `max_entries` - Optional entry cap, None = unbounded
    pub fn new(ttl: Duration, max_entries: Option<usize>) -> Self {
        Self {
            entries: HashMap::new(),
            stats: StatCounters::new(),
            ttl,
            max_entries,
        }
    }

    // == Get ==
    /// Returns the current entry for `query`, fresh or not.
    pub fn get(&self, query: &[u8]) -> Option<&CacheEntry> {
        self.entries.get(query)
    }

    /// Returns the entry for `query` only if it is still fresh at `now`.
    ///
    /// Does not touch statistics.
    pub fn fresh(&self, query: &[u8], now: Instant) -> Option<&CacheEntry> {
        self.get(query).filter(|entry| entry.is_fresh(self.ttl, now))
    }

    // == Lookup Fresh ==
    /// Returns a clone of the fresh entry for `query` and records the outcome.
    ///
    /// A fresh negative entry counts as a negative hit and is returned like
    /// any other hit. Only needs shared access, so callers can hold a read
    /// lock.
    pub fn lookup_fresh(&self, query: &[u8], now: Instant) -> Option<CacheEntry> {
        match self.entries.get(query) {
            Some(entry) if entry.is_fresh(self.ttl, now) => {
                if entry.is_negative() {
                    self.stats.record_negative_hit();
                } else {
                    self.stats.record_hit();
                }
                Some(entry.clone())
            }
            Some(_) => {
                self.stats.record_expired();
                None
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    // == Put ==
    /// Replaces the entry for `query`.
    ///
    /// When an entry cap is set and a new query would exceed it, stale
    /// entries are purged first, then the oldest entry is evicted.
    pub fn put(&mut self, query: Vec<u8>, entry: CacheEntry) {
        if let Some(max) = self.max_entries {
            if !self.entries.contains_key(&query) && self.entries.len() >= max {
                self.make_room(max, entry.created_at);
            }
        }

        self.entries.insert(query, entry);
    }

    fn make_room(&mut self, max: usize, now: Instant) {
        let purged = self.purge_stale(now);
        self.stats.record_evictions(purged as u64);

        while self.entries.len() >= max {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.created_at)
                .map(|(query, _)| query.clone());

            match oldest {
                Some(query) => {
                    self.entries.remove(&query);
                    self.stats.record_evictions(1);
                }
                None => break,
            }
        }
    }

    // == Purge Stale ==
    /// Removes every entry that is no longer fresh at `now`.
    ///
    /// Returns the number of entries removed.
    pub fn purge_stale(&mut self, now: Instant) -> usize {
        let ttl = self.ttl;
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_fresh(ttl, now));
        before - self.entries.len()
    }

    /// Counts one backend request.
    pub fn record_backend_call(&self, succeeded: bool) {
        self.stats.record_backend_call(succeeded);
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot(self.entries.len())
    }

    // == Length ==
    /// Returns the current number of entries in the cache.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    // == Is Empty ==
    /// Returns true if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn ttl(&self) -> Duration {
        self.ttl
    }
}
