//! Cache Entry Module
//!
//! Defines one cached lookup result together with the time it was made.

use std::time::{Duration, Instant};

// == Cache Entry ==
/// Result of one backend lookup.
///
/// Entries are never modified; a refresh replaces the whole entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Slash-joined candidates, None when the lookup failed
    pub result: Option<Vec<u8>>,
    /// Creation time on the monotonic clock
    pub created_at: Instant,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates an entry stamped with the current time.
    pub fn new(result: Option<Vec<u8>>) -> Self {
        Self::created_at(result, Instant::now())
    }

    /// Creates an entry with an explicit creation time.
    pub fn created_at(result: Option<Vec<u8>>, created_at: Instant) -> Self {
        Self { result, created_at }
    }

    // == Is Fresh ==
    /// Returns true while `now` is strictly before `created_at + ttl`.
    ///
    /// A zero TTL therefore never yields a fresh entry. Wall-clock changes do
    /// not affect freshness.
    pub fn is_fresh(&self, ttl: Duration, now: Instant) -> bool {
        match self.created_at.checked_add(ttl) {
            Some(expires_at) => now < expires_at,
            // Beyond what the clock can represent
            None => true,
        }
    }

    /// Returns true if this entry records a failed lookup.
    pub fn is_negative(&self) -> bool {
        self.result.is_none()
    }
}
