//! Cache Store Module
//!
//! Concurrent cache engine combining a sharded map with LRU tracking and TTL expiration.
//!
//! # Locking
//! The entry map (`DashMap`) and the LRU tracker (`parking_lot::Mutex`) are
//! separate regions. They are only ever nested map-shard first, LRU second.
//! Nothing touches the map while holding the LRU lock.

use std::time::Duration;

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::cache::{CacheEntry, CacheStatistics, CacheValue, LruTracker};
use crate::error::{CacheError, CacheResult};

/// Eviction attempts `set` makes before giving up on a full cache.
pub const MAX_EVICTION_ATTEMPTS: usize = 3;

// == Read Outcome ==
/// Result of a typed lookup.
#[derive(Debug, PartialEq, Eq)]
pub enum Lookup<T> {
    Hit(T),
    Miss,
    /// The entry had expired and was removed
    Expired,
    /// The entry held another type and was removed
    TypeMismatch,
}

// == Cache Store ==
/// Concurrent storage with LRU eviction and TTL support.
#[derive(Debug)]
pub struct CacheStore {
    /// Key-value storage
    entries: DashMap<String, CacheEntry>,
    /// LRU access tracker
    lru: Mutex<LruTracker>,
    /// Maximum number of entries allowed
    capacity: usize,
}

impl CacheStore {
    // == Constructor ==
    /// Creates a new CacheStore holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: DashMap::with_capacity(capacity.min(4096)),
            lru: Mutex::new(LruTracker::new()),
            capacity,
        }
    }

    // == Set ==
    /// Stores a value under `key`, expiring after `ttl`.
    ///
    /// An existing key is overwritten and its TTL reset. If the cache is at
    /// capacity and the key is new, the least recently used entry is
    /// evicted first, retrying up to `MAX_EVICTION_ATTEMPTS` times.
    ///
    /// Returns the keys evicted to make room.
    pub fn set(&self, key: String, value: CacheValue, ttl: Duration) -> CacheResult<Vec<String>> {
        let mut evicted = Vec::new();

        for _ in 0..MAX_EVICTION_ATTEMPTS {
            if self.entries.len() < self.capacity || self.entries.contains_key(&key) {
                let entry = CacheEntry::new(value, ttl);
                match self.entries.entry(key) {
                    Entry::Occupied(mut occupied) => {
                        occupied.insert(entry);
                        self.lru.lock().touch(occupied.key());
                    }
                    Entry::Vacant(vacant) => {
                        let key = vacant.key().clone();
                        let _guard = vacant.insert(entry);
                        self.lru.lock().touch(&key);
                    }
                }
                return Ok(evicted);
            }

            if let Some(key) = self.evict_oldest() {
                evicted.push(key);
            }
        }

        warn!(
            capacity = self.capacity,
            attempts = MAX_EVICTION_ATTEMPTS,
            "Cache full and eviction failed"
        );
        Err(CacheError::CapacityExhausted {
            capacity: self.capacity,
            attempts: MAX_EVICTION_ATTEMPTS,
        })
    }

    // == Get ==
    /// Retrieves a typed value by key.
    ///
    /// Expired entries and entries of the wrong type are removed as a side
    /// effect. A hit moves the key to the head of the LRU order.
    pub fn get<T: Clone + 'static>(&self, key: &str) -> Lookup<T> {
        let found = match self.entries.get(key) {
            None => return Lookup::Miss,
            Some(entry) if entry.is_expired() => None,
            Some(entry) => {
                let value = entry.value_as::<T>();
                if value.is_some() {
                    // Still holding the shard read guard: map, then LRU.
                    self.lru.lock().touch(key);
                }
                Some(value)
            }
        };

        match found {
            Some(Some(value)) => Lookup::Hit(value),
            Some(None) => {
                if self.remove(key) {
                    Lookup::TypeMismatch
                } else {
                    Lookup::Miss
                }
            }
            None => {
                if self.remove_if_expired(key) {
                    Lookup::Expired
                } else {
                    Lookup::Miss
                }
            }
        }
    }

    /// Returns true if `key` holds a live (unexpired) entry. Does not touch LRU order.
    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .get(key)
            .map(|entry| !entry.is_expired())
            .unwrap_or(false)
    }

    // == Remove ==
    /// Removes an entry by key. Returns true if something was removed.
    pub fn remove(&self, key: &str) -> bool {
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(occupied) => {
                self.lru.lock().remove(occupied.key());
                occupied.remove();
                true
            }
            Entry::Vacant(_) => false,
        }
    }

    /// Removes `key` only if it is still expired under the entry lock.
    pub fn remove_if_expired(&self, key: &str) -> bool {
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(occupied) if occupied.get().is_expired() => {
                self.lru.lock().remove(occupied.key());
                occupied.remove();
                true
            }
            _ => false,
        }
    }

    // == Clear ==
    /// Removes every entry. Returns the keys that were removed.
    pub fn clear(&self) -> Vec<String> {
        let keys: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        keys.into_iter().filter(|key| self.remove(key)).collect()
    }

    // == Update Expiration ==
    /// Resets the TTL of `key` without touching value or LRU order.
    ///
    /// The entry is refreshed under its exclusive shard lock, so concurrent
    /// refreshes and removals serialize cleanly.
    pub fn update_expiration(&self, key: &str, ttl: Duration) -> bool {
        match self.entries.get_mut(key) {
            Some(mut entry) => {
                entry.refresh(ttl);
                true
            }
            None => false,
        }
    }

    // == Evict Oldest ==
    /// Evicts the least recently used entry. Returns its key.
    ///
    /// The popped key is removed under its entry lock, clearing any node a
    /// concurrent touch re-added in between. Keys already gone from the map
    /// are skipped.
    pub fn evict_oldest(&self) -> Option<String> {
        loop {
            let candidate = self.lru.lock().pop_oldest()?;
            if let Entry::Occupied(occupied) = self.entries.entry(candidate) {
                self.lru.lock().remove(occupied.key());
                let (key, _) = occupied.remove_entry();
                debug!(key = %key, "Evicted least recently used entry");
                return Some(key);
            }
        }
    }

    // == Sweep Expired ==
    /// Removes up to `batch_size` expired entries. Returns their keys.
    pub fn sweep_expired(&self, batch_size: usize) -> Vec<String> {
        let now = Utc::now();
        let candidates: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| entry.value().is_expired_at(now))
            .map(|entry| entry.key().clone())
            .take(batch_size)
            .collect();

        candidates
            .into_iter()
            .filter(|key| self.remove_if_expired(key))
            .collect()
    }

    // == Stats ==
    /// Returns an occupancy snapshot. O(n) over the current entries.
    pub fn stats(&self) -> CacheStatistics {
        let now = Utc::now();
        let (active, expired) = self.entries.iter().fold((0, 0), |(active, expired), entry| {
            if entry.value().is_expired_at(now) {
                (active, expired + 1)
            } else {
                (active + 1, expired)
            }
        });
        CacheStatistics::new(self.capacity, active, expired)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Keys from least to most recently used.
    pub fn lru_order(&self) -> Vec<String> {
        self.lru.lock().keys_oldest_first().cloned().collect()
    }

    /// Number of nodes in the LRU tracker.
    pub fn lru_len(&self) -> usize {
        self.lru.lock().len()
    }
}
