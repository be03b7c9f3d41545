//! Request Executor Module
//!
//! Runs one logical request through the gate, the retry loop and metrics.

use std::future::Future;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{HttpError, HttpResult};
use crate::http::{ConcurrencyGate, RequestMetrics, RetryPolicy};

// == Cancel Signals ==
/// The wrapper-wide shutdown token paired with the caller's token.
#[derive(Debug, Clone, Copy)]
pub struct CancelSignals<'a> {
    pub shutdown: &'a CancellationToken,
    pub caller: &'a CancellationToken,
}

impl<'a> CancelSignals<'a> {
    pub fn new(shutdown: &'a CancellationToken, caller: &'a CancellationToken) -> Self {
        Self { shutdown, caller }
    }

    pub fn is_fired(&self) -> bool {
        self.shutdown.is_cancelled() || self.caller.is_cancelled()
    }

    /// Completes when either token fires.
    pub async fn fired(&self) {
        tokio::select! {
            _ = self.shutdown.cancelled() => {}
            _ = self.caller.cancelled() => {}
        }
    }
}

// == Request Executor ==
#[derive(Debug)]
pub struct RequestExecutor {
    gate: ConcurrencyGate,
    policy: RetryPolicy,
    metrics: RequestMetrics,
}

impl RequestExecutor {
    pub fn new(gate: ConcurrencyGate, policy: RetryPolicy, metrics: RequestMetrics) -> Self {
        Self {
            gate,
            policy,
            metrics,
        }
    }

    pub fn gate(&self) -> &ConcurrencyGate {
        &self.gate
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn metrics(&self) -> &RequestMetrics {
        &self.metrics
    }

    // == Execute ==
    /// Runs `attempt` until it succeeds, fails for good or is cancelled.
    ///
    /// One gate slot is held for the whole call. Exactly one metrics sample
    /// is recorded, covering gate wait, every attempt and every backoff.
    pub async fn execute<F, Fut, R>(&self, signals: CancelSignals<'_>, attempt: F) -> HttpResult<R>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = HttpResult<R>>,
    {
        let started = Instant::now();
        let outcome = self.run(signals, attempt).await;
        self.metrics.record(started.elapsed(), outcome.is_ok());
        outcome
    }

    async fn run<F, Fut, R>(&self, signals: CancelSignals<'_>, mut attempt: F) -> HttpResult<R>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = HttpResult<R>>,
    {
        if signals.is_fired() {
            return Err(HttpError::Cancelled);
        }

        let _permit = tokio::select! {
            biased;
            _ = signals.fired() => return Err(HttpError::Cancelled),
            permit = self.gate.acquire(signals.shutdown) => permit?,
        };

        let mut tries: u32 = 0;
        loop {
            tries += 1;
            let result = tokio::select! {
                biased;
                _ = signals.fired() => return Err(HttpError::Cancelled),
                result = attempt() => result,
            };

            let error = match result {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            if !self.policy.should_retry(tries, &error) {
                if tries > 1 || self.policy.is_retryable(&error) {
                    warn!(attempts = tries, error = %error, "Request failed after retries");
                } else {
                    debug!(status = ?error.status_code(), error = %error, "Request failed without retry");
                }
                return Err(error);
            }

            let delay = self.policy.backoff(tries);
            warn!(
                retry = tries,
                max_retries = self.policy.max_retries(),
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Request failed, retrying"
            );

            tokio::select! {
                biased;
                _ = signals.fired() => return Err(HttpError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}
