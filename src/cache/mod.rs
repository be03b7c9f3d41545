//! Cache Module
//!
//! Provides in-memory caching with TTL expiration, LRU eviction and
//! change notifications.

mod entry;
mod events;
mod lru;
mod manager;
mod stats;
mod store;


// Re-export public types
pub use entry::{CacheEntry, CacheValue};
pub use events::{CacheEventKind, CacheEvents, Listener, ListenerId};
pub use lru::LruTracker;
pub use manager::{CacheCore, NetworkCache};
pub use stats::CacheStatistics;
pub use store::{CacheStore, Lookup, MAX_EVICTION_ATTEMPTS};
