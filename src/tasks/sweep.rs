//! TTL Sweep Task
//!
//! Background task that periodically removes expired cache entries.

use std::sync::Weak;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cache::CacheCore;

// == Sweep Mode ==
/// What the sweep task should currently be doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepMode {
    /// Sweep one batch every interval
    Active(Duration),
    /// Wait for a resume without sweeping
    Paused,
}

// == Sweep Handle ==
/// Control handle for a running sweep task.
///
/// Dropping the handle closes the mode channel and stops the task, same as
/// `stop`. The task also exits once the cache it sweeps is gone.
#[derive(Debug)]
pub struct SweepHandle {
    mode: watch::Sender<SweepMode>,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl SweepHandle {
    /// Suspends sweeping. Cache state is untouched.
    pub fn pause(&self) {
        self.mode.send_replace(SweepMode::Paused);
    }

    /// Restarts sweeping with a fresh interval timer.
    pub fn resume(&self, interval: Duration) {
        self.mode.send_replace(SweepMode::Active(interval));
    }

    pub fn mode(&self) -> SweepMode {
        *self.mode.borrow()
    }

    /// Signals the task to exit at its next suspension point.
    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Spawns a background task that periodically sweeps expired cache entries.
///
/// Each tick removes at most `batch_size` expired entries and fires their
/// expired notifications. The task holds only a weak reference to the cache.
///
/// # Panics
/// Panics if called outside a Tokio runtime.
///
/// # Example
/// ```ignore
/// let handle = spawn_sweep_task(Arc::downgrade(&core), Duration::from_secs(300), 100);
/// handle.pause();
/// handle.resume(Duration::from_secs(60));
/// handle.stop();
/// ```
pub fn spawn_sweep_task(core: Weak<CacheCore>, interval: Duration, batch_size: usize) -> SweepHandle {
    let (mode_tx, mut mode_rx) = watch::channel(SweepMode::Active(interval));
    let shutdown = CancellationToken::new();
    let stop = shutdown.clone();

    let task = tokio::spawn(async move {
        info!("Starting TTL sweep task with interval of {:?}", interval);

        loop {
            let mode = *mode_rx.borrow_and_update();
            match mode {
                SweepMode::Paused => {
                    debug!("TTL sweep paused");
                    tokio::select! {
                        _ = stop.cancelled() => break,
                        changed = mode_rx.changed() => {
                            if changed.is_err() {
                                break;
                            }
                        }
                    }
                }
                SweepMode::Active(every) => {
                    tokio::select! {
                        _ = stop.cancelled() => break,
                        changed = mode_rx.changed() => {
                            if changed.is_err() {
                                break;
                            }
                        }
                        _ = tokio::time::sleep(every) => {
                            let Some(core) = core.upgrade() else {
                                break;
                            };
                            let removed = core.sweep_expired(batch_size);
                            if removed > 0 {
                                info!("TTL sweep: removed {} expired entries", removed);
                            } else {
                                debug!("TTL sweep: no expired entries found");
                            }
                        }
                    }
                }
            }
        }

        debug!("TTL sweep task stopped");
    });

    SweepHandle {
        mode: mode_tx,
        shutdown,
        task,
    }
}
