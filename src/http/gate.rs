//! Concurrency Gate Module
//!
//! Bounds the number of requests in flight with a counting semaphore.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::error::{HttpError, HttpResult};

/// Largest gate capacity: what a semaphore holds and `acquire_many` can drain.
pub const MAX_GATE_CAPACITY: usize = if Semaphore::MAX_PERMITS < u32::MAX as usize {
    Semaphore::MAX_PERMITS
} else {
    u32::MAX as usize
};

// == Gate Permit ==
/// One occupied slot. Released on drop.
#[derive(Debug)]
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
}

// == Concurrency Gate ==
#[derive(Debug)]
pub struct ConcurrencyGate {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl ConcurrencyGate {
    /// Creates a gate with `capacity` slots, clamped to `MAX_GATE_CAPACITY`.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.min(MAX_GATE_CAPACITY);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of slots currently held.
    pub fn in_flight(&self) -> usize {
        self.capacity.saturating_sub(self.semaphore.available_permits())
    }

    // == Acquire ==
    /// Waits for a free slot.
    ///
    /// Fails with `Cancelled` if `cancel` fires first and with `Disposed`
    /// once the gate is closed.
    pub async fn acquire(&self, cancel: &CancellationToken) -> HttpResult<GatePermit> {
        let semaphore = Arc::clone(&self.semaphore);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(HttpError::Cancelled),
            permit = semaphore.acquire_owned() => permit
                .map(|permit| GatePermit { _permit: permit })
                .map_err(|_| HttpError::Disposed),
        }
    }

    // == Wait Idle ==
    /// Waits until no slot is held.
    ///
    /// Takes every slot at once and immediately gives them back. Requests
    /// arriving during the wait queue behind it.
    pub async fn wait_idle(&self, cancel: &CancellationToken) -> HttpResult<()> {
        let all = u32::try_from(self.capacity).unwrap_or(u32::MAX);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(HttpError::Cancelled),
            permits = self.semaphore.acquire_many(all) => match permits {
                Ok(permits) => {
                    drop(permits);
                    Ok(())
                }
                // A closed gate has nothing left to drain.
                Err(_) => Ok(()),
            },
        }
    }

    /// Wakes every waiter with `Disposed` and rejects future acquires.
    pub fn close(&self) {
        self.semaphore.close();
    }

    pub fn is_closed(&self) -> bool {
        self.semaphore.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_acquire_and_release() {
        let gate = ConcurrencyGate::new(2);
        let token = CancellationToken::new();

        let first = gate.acquire(&token).await.unwrap();
        let _second = gate.acquire(&token).await.unwrap();
        assert_eq!(gate.in_flight(), 2);

        drop(first);
        assert_eq!(gate.in_flight(), 1);
    }

    #[tokio::test]
    async fn test_oversized_capacity_is_clamped() {
        let gate = ConcurrencyGate::new(usize::MAX);
        let token = CancellationToken::new();
        assert_eq!(gate.capacity(), MAX_GATE_CAPACITY);

        let permit = gate.acquire(&token).await.unwrap();
        assert_eq!(gate.in_flight(), 1);
        drop(permit);
        assert!(gate.wait_idle(&token).await.is_ok());
    }

    #[tokio::test]
    async fn test_acquire_cancelled_while_full() {
        let gate = ConcurrencyGate::new(1);
        let token = CancellationToken::new();
        let _held = gate.acquire(&token).await.unwrap();

        let waiter = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            waiter.cancel();
        });

        assert!(matches!(gate.acquire(&token).await, Err(HttpError::Cancelled)));
        assert_eq!(gate.in_flight(), 1);
    }

    #[tokio::test]
    async fn test_closed_gate_rejects() {
        let gate = ConcurrencyGate::new(1);
        gate.close();

        let token = CancellationToken::new();
        assert!(matches!(gate.acquire(&token).await, Err(HttpError::Disposed)));
        assert!(gate.wait_idle(&token).await.is_ok());
    }

    #[tokio::test]
    async fn test_wait_idle_returns_after_release() {
        let gate = Arc::new(ConcurrencyGate::new(3));
        let token = CancellationToken::new();
        let held = gate.acquire(&token).await.unwrap();

        let releaser = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            drop(held);
        });

        gate.wait_idle(&token).await.unwrap();
        assert_eq!(gate.in_flight(), 0);
        releaser.await.unwrap();
    }

    #[tokio::test]
    async fn test_wait_idle_cancellable() {
        let gate = ConcurrencyGate::new(1);
        let token = CancellationToken::new();
        let _held = gate.acquire(&token).await.unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(matches!(gate.wait_idle(&cancel).await, Err(HttpError::Cancelled)));
    }
}
