//! Lookup Service
//!
//! Answers a query from the cache while the entry is fresh, otherwise asks
//! the backend and stores whatever came back, including a failure.
//!
//! A failed lookup is cached like a successful one: the same query is not
//! retried until its entry expires, so a backend outage stays visible for one
//! TTL window per query. This is intended behavior.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::backend::{Backend, SocialImeClient};
use crate::cache::{CacheEntry, CacheStats, CacheStore};
use crate::config::Config;
use crate::error::Result;

/// Per-query fill gates. Holding a gate means owning the refresh of that query.
type FillGates = Mutex<HashMap<Vec<u8>, Arc<Mutex<()>>>>;

/// Cache-fronted conversion lookups, shared by every connection.
pub struct LookupService {
    cache: Arc<RwLock<CacheStore>>,
    backend: Arc<dyn Backend>,
    gates: FillGates,
}

impl LookupService {
    /// Creates a service over an existing store and backend.
    pub fn new(cache: CacheStore, backend: Arc<dyn Backend>) -> Self {
        Self {
            cache: Arc::new(RwLock::new(cache)),
            backend,
            gates: Mutex::new(HashMap::new()),
        }
    }

    /// Creates a service backed by the Social IME client described by `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let cache = CacheStore::new(config.cache_ttl, config.max_entries);
        let backend = SocialImeClient::new(config)?;
        Ok(Self::new(cache, Arc::new(backend)))
    }

    /// Snapshot of the cache statistics.
    pub async fn stats(&self) -> CacheStats {
        self.cache.read().await.stats()
    }

    // == Resolve ==
    /// Returns the candidates for `query`, or None if none are known.
    ///
    /// Concurrent misses on the same query wait for a single backend call.
    /// A hit only takes the read lock, so hits never queue behind each other.
    pub async fn resolve(&self, query: &[u8]) -> Option<Vec<u8>> {
        let hit = self.cache.read().await.lookup_fresh(query, Instant::now());
        if let Some(entry) = hit {
            debug!(query = %String::from_utf8_lossy(query), "Cache hit");
            return entry.result;
        }

        let gate = self.gate_for(query).await;
        let result = {
            let _filling = gate.lock().await;
            self.fill(query).await
        };
        self.release_gate(query, gate).await;

        result
    }

    async fn fill(&self, query: &[u8]) -> Option<Vec<u8>> {
        // Another task may have refreshed the entry while this one waited.
        if let Some(entry) = self.cache.read().await.fresh(query, Instant::now()) {
            return entry.result.clone();
        }

        let result = self.backend.fetch(query).await;

        let mut cache = self.cache.write().await;
        cache.record_backend_call(result.is_some());
        cache.put(query.to_vec(), CacheEntry::new(result.clone()));

        result
    }

    async fn gate_for(&self, query: &[u8]) -> Arc<Mutex<()>> {
        let mut gates = self.gates.lock().await;
        Arc::clone(gates.entry(query.to_vec()).or_default())
    }

    async fn release_gate(&self, query: &[u8], gate: Arc<Mutex<()>>) {
        let mut gates = self.gates.lock().await;
        // Only the map and this task still hold it: nobody else is waiting.
        if Arc::strong_count(&gate) == 2 {
            gates.remove(query);
        }
    }

    #[cfg(test)]
    async fn open_gates(&self) -> usize {
        self.gates.lock().await.len()
    }

    #[cfg(test)]
    pub(crate) fn cache(&self) -> Arc<RwLock<CacheStore>> {
        Arc::clone(&self.cache)
    }
}
