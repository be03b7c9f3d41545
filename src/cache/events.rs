//! Cache Events Module
//!
//! Listener registry for the added / removed / expired notifications.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::error;

/// Callback invoked with the affected key.
pub type Listener = Arc<dyn Fn(&str) + Send + Sync>;

// == Event Kind ==
/// The three observable cache notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheEventKind {
    Added,
    Removed,
    Expired,
}

impl fmt::Display for CacheEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheEventKind::Added => write!(f, "added"),
            CacheEventKind::Removed => write!(f, "removed"),
            CacheEventKind::Expired => write!(f, "expired"),
        }
    }
}

/// Handle returned on subscription, used to unsubscribe one listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

// == Cache Events ==
/// Multi-listener registry, one list per event kind.
///
/// Listeners are called outside the registry lock, so a listener may
/// subscribe, unsubscribe or touch the cache without deadlocking.
#[derive(Default)]
pub struct CacheEvents {
    added: Mutex<Vec<(ListenerId, Listener)>>,
    removed: Mutex<Vec<(ListenerId, Listener)>>,
    expired: Mutex<Vec<(ListenerId, Listener)>>,
    next_id: AtomicU64,
}

impl CacheEvents {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, kind: CacheEventKind) -> &Mutex<Vec<(ListenerId, Listener)>> {
        match kind {
            CacheEventKind::Added => &self.added,
            CacheEventKind::Removed => &self.removed,
            CacheEventKind::Expired => &self.expired,
        }
    }

    // == Subscribe ==
    /// Registers a listener for one event kind.
    pub fn subscribe<F>(&self, kind: CacheEventKind, listener: F) -> ListenerId
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.slot(kind).lock().push((id, Arc::new(listener)));
        id
    }

    // == Unsubscribe ==
    /// Removes one listener. Returns false if the id is unknown.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        [&self.added, &self.removed, &self.expired]
            .into_iter()
            .any(|slot| {
                let mut listeners = slot.lock();
                let before = listeners.len();
                listeners.retain(|(existing, _)| *existing != id);
                listeners.len() != before
            })
    }

    /// Drops every listener of every kind.
    pub fn clear(&self) {
        self.added.lock().clear();
        self.removed.lock().clear();
        self.expired.lock().clear();
    }

    pub fn listener_count(&self, kind: CacheEventKind) -> usize {
        self.slot(kind).lock().len()
    }

    // == Emit ==
    /// Calls every listener of `kind` with `key`.
    ///
    /// A panicking listener is logged and skipped; the rest still run.
    pub fn emit(&self, kind: CacheEventKind, key: &str) {
        let listeners: Vec<Listener> = self
            .slot(kind)
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in listeners {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| (*listener)(key))) {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(event = %kind, key, reason = %reason, "Cache event listener failed");
            }
        }
    }

    /// Emits `kind` once per key.
    pub fn emit_all<'a, I>(&self, kind: CacheEventKind, keys: I)
    where
        I: IntoIterator<Item = &'a String>,
    {
        for key in keys {
            self.emit(kind, key);
        }
    }
}

impl fmt::Debug for CacheEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheEvents")
            .field("added", &self.listener_count(CacheEventKind::Added))
            .field("removed", &self.listener_count(CacheEventKind::Removed))
            .field("expired", &self.listener_count(CacheEventKind::Expired))
            .finish()
    }
}
