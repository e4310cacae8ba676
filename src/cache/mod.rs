//! Cache Module
//!
//! Time-bounded cache of backend lookup results, shared by all connections.

mod entry;
mod stats;
mod store;


// Re-export public types
pub use entry::CacheEntry;
pub use stats::{CacheStats, StatCounters};
pub use store::CacheStore;
