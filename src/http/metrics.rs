//! Request Metrics Module
//!
//! Counters and a bounded window of recent latencies.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

// == Request Metrics ==
/// One sample per logical request, retries included.
#[derive(Debug)]
pub struct RequestMetrics {
    total: AtomicU64,
    failed: AtomicU64,
    latencies: Mutex<VecDeque<Duration>>,
    max_samples: usize,
}

impl RequestMetrics {
    pub fn new(max_samples: usize) -> Self {
        Self {
            total: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            latencies: Mutex::new(VecDeque::with_capacity(max_samples.min(1024))),
            max_samples,
        }
    }

    /// Records a finished request, dropping the oldest sample when full.
    pub fn record(&self, elapsed: Duration, succeeded: bool) {
        self.total.fetch_add(1, Ordering::Relaxed);
        if !succeeded {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }

        let mut latencies = self.latencies.lock();
        latencies.push_back(elapsed);
        while latencies.len() > self.max_samples {
            latencies.pop_front();
        }
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Mean latency over the retained window, zero when empty.
    pub fn average(&self) -> Duration {
        let latencies = self.latencies.lock();
        if latencies.is_empty() {
            return Duration::ZERO;
        }
        let sum: Duration = latencies.iter().sum();
        sum / latencies.len() as u32
    }

    pub fn sample_count(&self) -> usize {
        self.latencies.lock().len()
    }
}
