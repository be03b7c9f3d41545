//! Cache Manager Module
//!
//! `NetworkCache` is the public face of the cache: typed reads and writes,
//! change notifications, background sweeping and disposal.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::{CacheEventKind, CacheEvents, CacheStatistics, CacheStore, ListenerId, Lookup};
use crate::config::CacheConfig;
use crate::error::{CacheError, CacheResult, ConfigError};
use crate::tasks::{spawn_sweep_task, SweepHandle, SweepMode};

// == Cache Core ==
/// Storage plus listeners, shared between the manager and its sweep task.
#[derive(Debug)]
pub struct CacheCore {
    store: CacheStore,
    events: CacheEvents,
}

impl CacheCore {
    pub fn new(capacity: usize) -> Self {
        Self {
            store: CacheStore::new(capacity),
            events: CacheEvents::new(),
        }
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    pub fn events(&self) -> &CacheEvents {
        &self.events
    }

    /// Removes up to `batch_size` expired entries and notifies for each.
    pub fn sweep_expired(&self, batch_size: usize) -> usize {
        let expired = self.store.sweep_expired(batch_size);
        self.events.emit_all(CacheEventKind::Expired, &expired);
        expired.len()
    }
}

// == Network Cache ==
/// Thread-safe TTL + LRU cache of arbitrary `'static` values.
///
/// Values are stored type-erased and read back with `try_get::<T>`. All
/// operations fail with `CacheError::Disposed` once `dispose` has run.
pub struct NetworkCache {
    core: Arc<CacheCore>,
    config: CacheConfig,
    sweeper: Mutex<Option<SweepHandle>>,
    disposed: AtomicBool,
}

impl NetworkCache {
    // == Constructor ==
    /// Creates a cache and starts its background sweep.
    ///
    /// Outside a Tokio runtime the cache still works, relying on lazy
    /// expiry until `resume_sweep` is called from within a runtime.
    pub fn new(config: CacheConfig) -> CacheResult<Self> {
        config.validate()?;

        let core = Arc::new(CacheCore::new(config.max_entries));
        let sweeper = match Handle::try_current() {
            Ok(_) => Some(spawn_sweep_task(
                Arc::downgrade(&core),
                config.sweep_interval,
                config.sweep_batch_size,
            )),
            Err(_) => {
                warn!("No Tokio runtime available; background sweep disabled until resumed");
                None
            }
        };

        info!(
            "Cache initialized: max_entries={}, default_ttl={:?}",
            config.max_entries, config.default_ttl
        );

        Ok(Self {
            core,
            config,
            sweeper: Mutex::new(sweeper),
            disposed: AtomicBool::new(false),
        })
    }

    /// Creates a cache from `CACHE_*` environment variables.
    pub fn from_env() -> CacheResult<Self> {
        Self::new(CacheConfig::from_env()?)
    }

    fn ensure_live(&self) -> CacheResult<()> {
        if self.disposed.load(Ordering::Acquire) {
            Err(CacheError::Disposed)
        } else {
            Ok(())
        }
    }

    fn ensure_live_and_not_cancelled(&self, cancel: &CancellationToken) -> CacheResult<()> {
        self.ensure_live()?;
        if cancel.is_cancelled() {
            return Err(CacheError::Cancelled);
        }
        Ok(())
    }

    // == Try Get ==
    /// Returns a clone of the value stored under `key` if it is live and a `T`.
    ///
    /// An expired entry is removed and an expired notification fires. An
    /// entry holding another type is removed and a removed notification
    /// fires. Both cases yield `Ok(None)`.
    pub fn try_get<T>(&self, key: &str) -> CacheResult<Option<T>>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.ensure_live()?;

        match self.core.store.get::<T>(key) {
            Lookup::Hit(value) => Ok(Some(value)),
            Lookup::Miss => Ok(None),
            Lookup::Expired => {
                debug!(key, "Lazily expired entry on read");
                self.core.events.emit(CacheEventKind::Expired, key);
                Ok(None)
            }
            Lookup::TypeMismatch => {
                debug!(key, "Removed entry holding an unexpected type");
                self.core.events.emit(CacheEventKind::Removed, key);
                Ok(None)
            }
        }
    }

    // == Set ==
    /// Stores `value` under `key` with the configured default TTL.
    pub fn set<V>(&self, key: impl Into<String>, value: V) -> CacheResult<()>
    where
        V: Any + Send + Sync,
    {
        self.set_with_ttl(key, value, self.config.default_ttl)
    }

    /// Stores `value` under `key`, expiring after `ttl`.
    ///
    /// Entries evicted to make room fire removed notifications before the
    /// added notification for `key`.
    pub fn set_with_ttl<V>(&self, key: impl Into<String>, value: V, ttl: Duration) -> CacheResult<()>
    where
        V: Any + Send + Sync,
    {
        self.ensure_live()?;

        let key = key.into();
        let evicted = self.core.store.set(key.clone(), Arc::new(value), ttl)?;

        self.core.events.emit_all(CacheEventKind::Removed, &evicted);
        self.core.events.emit(CacheEventKind::Added, &key);
        Ok(())
    }

    // == Remove ==
    /// Deletes `key`. Returns true if an entry was removed.
    pub fn remove(&self, key: &str) -> CacheResult<bool> {
        self.ensure_live()?;

        let removed = self.core.store.remove(key);
        if removed {
            self.core.events.emit(CacheEventKind::Removed, key);
        }
        Ok(removed)
    }

    // == Clear ==
    /// Removes every entry, notifying once per removed key.
    pub fn clear(&self) -> CacheResult<()> {
        self.ensure_live()?;

        let removed = self.core.store.clear();
        info!("Cache cleared: {} entries removed", removed.len());
        self.core.events.emit_all(CacheEventKind::Removed, &removed);
        Ok(())
    }

    // == Update Expiration ==
    /// Resets the TTL of `key`. Returns false if the key is absent.
    pub fn update_expiration(&self, key: &str, ttl: Duration) -> CacheResult<bool> {
        self.ensure_live()?;
        Ok(self.core.store.update_expiration(key, ttl))
    }

    /// Returns true if `key` holds a live entry. Does not affect LRU order.
    pub fn contains_key(&self, key: &str) -> CacheResult<bool> {
        self.ensure_live()?;
        Ok(self.core.store.contains(key))
    }

    // == Sweeping ==
    /// Removes up to `batch_size` expired entries. Returns how many went.
    pub fn sweep_expired(&self, batch_size: usize) -> CacheResult<usize> {
        self.ensure_live()?;
        Ok(self.core.sweep_expired(batch_size))
    }

    /// Sweeps in batches until a pass finds nothing, yielding between passes.
    pub async fn sweep_all_expired(
        &self,
        batch_size: usize,
        cancel: &CancellationToken,
    ) -> CacheResult<usize> {
        let mut total = 0;
        loop {
            self.ensure_live_and_not_cancelled(cancel)?;

            let removed = self.core.sweep_expired(batch_size);
            if removed == 0 {
                return Ok(total);
            }
            total += removed;

            tokio::task::yield_now().await;
        }
    }

    /// Suspends the background sweep. Entries are kept.
    pub fn pause_sweep(&self) -> CacheResult<()> {
        self.ensure_live()?;
        if let Some(handle) = self.sweeper.lock().as_ref() {
            handle.pause();
            info!("Background sweep paused");
        }
        Ok(())
    }

    /// Restarts the background sweep with `interval` between passes.
    ///
    /// Starts the sweep task if none is running and a runtime is available.
    pub fn resume_sweep(&self, interval: Duration) -> CacheResult<()> {
        self.ensure_live()?;
        if interval.is_zero() {
            return Err(ConfigError::NonPositive {
                field: "sweep_interval",
            }
            .into());
        }

        let mut sweeper = self.sweeper.lock();
        match sweeper.as_ref() {
            Some(handle) => handle.resume(interval),
            None => match Handle::try_current() {
                Ok(_) => {
                    *sweeper = Some(spawn_sweep_task(
                        Arc::downgrade(&self.core),
                        interval,
                        self.config.sweep_batch_size,
                    ));
                }
                Err(_) => {
                    warn!("Cannot resume background sweep without a Tokio runtime");
                    return Ok(());
                }
            },
        }
        info!("Background sweep resumed with interval of {:?}", interval);
        Ok(())
    }

    /// True while a sweep task exists and is not paused.
    pub fn is_sweep_active(&self) -> bool {
        self.sweeper
            .lock()
            .as_ref()
            .map(|handle| matches!(handle.mode(), SweepMode::Active(_)))
            .unwrap_or(false)
    }

    // == Stats ==
    pub fn stats(&self) -> CacheResult<CacheStatistics> {
        self.ensure_live()?;
        Ok(self.core.store.stats())
    }

    pub fn len(&self) -> usize {
        self.core.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.core.store.is_empty()
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    // == Async Variants ==
    /// Async `try_get`; fails with `Cancelled` if `cancel` fired first.
    pub async fn try_get_async<T>(&self, key: &str, cancel: &CancellationToken) -> CacheResult<Option<T>>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.ensure_live()?;
        tokio::task::yield_now().await;
        self.ensure_live_and_not_cancelled(cancel)?;
        self.try_get(key)
    }

    pub async fn set_async<V>(
        &self,
        key: impl Into<String>,
        value: V,
        ttl: Duration,
        cancel: &CancellationToken,
    ) -> CacheResult<()>
    where
        V: Any + Send + Sync,
    {
        self.ensure_live()?;
        tokio::task::yield_now().await;
        self.ensure_live_and_not_cancelled(cancel)?;
        self.set_with_ttl(key, value, ttl)
    }

    pub async fn remove_async(&self, key: &str, cancel: &CancellationToken) -> CacheResult<bool> {
        self.ensure_live()?;
        tokio::task::yield_now().await;
        self.ensure_live_and_not_cancelled(cancel)?;
        self.remove(key)
    }

    pub async fn clear_async(&self, cancel: &CancellationToken) -> CacheResult<()> {
        self.ensure_live()?;
        tokio::task::yield_now().await;
        self.ensure_live_and_not_cancelled(cancel)?;
        self.clear()
    }

    pub async fn update_expiration_async(
        &self,
        key: &str,
        ttl: Duration,
        cancel: &CancellationToken,
    ) -> CacheResult<bool> {
        self.ensure_live()?;
        tokio::task::yield_now().await;
        self.ensure_live_and_not_cancelled(cancel)?;
        self.update_expiration(key, ttl)
    }

    // == Notifications ==
    /// Subscribes to insertions and overwrites.
    pub fn on_added<F>(&self, listener: F) -> CacheResult<ListenerId>
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.ensure_live()?;
        Ok(self.core.events.subscribe(CacheEventKind::Added, listener))
    }

    /// Subscribes to explicit removals, evictions and type-mismatch drops.
    pub fn on_removed<F>(&self, listener: F) -> CacheResult<ListenerId>
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.ensure_live()?;
        Ok(self.core.events.subscribe(CacheEventKind::Removed, listener))
    }

    /// Subscribes to expirations found by reads or sweeps.
    pub fn on_expired<F>(&self, listener: F) -> CacheResult<ListenerId>
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.ensure_live()?;
        Ok(self.core.events.subscribe(CacheEventKind::Expired, listener))
    }

    pub fn unsubscribe(&self, id: ListenerId) -> CacheResult<bool> {
        self.ensure_live()?;
        Ok(self.core.events.unsubscribe(id))
    }

    pub fn unsubscribe_all(&self) -> CacheResult<()> {
        self.ensure_live()?;
        self.core.events.clear();
        Ok(())
    }

    // == Dispose ==
    /// Stops the sweep, drops listeners and entries. Safe to call repeatedly.
    ///
    /// No notifications fire for the entries dropped here.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        if let Some(handle) = self.sweeper.lock().take() {
            handle.stop();
        }
        self.core.events.clear();
        let dropped = self.core.store.clear();

        info!("Cache disposed: {} entries dropped", dropped.len());
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

impl Drop for NetworkCache {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for NetworkCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkCache")
            .field("entries", &self.core.store.len())
            .field("config", &self.config)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
