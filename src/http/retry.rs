//! Retry Policy Module
//!
//! Decides which failures are retried and how long to wait in between.

use std::collections::HashSet;
use std::time::Duration;

use crate::error::HttpError;
use crate::http::ClientSettings;

/// Upper bound on any single backoff delay.
pub const MAX_BACKOFF: Duration = Duration::from_secs(120);

// == Retry Policy ==
/// Exponential backoff over a set of retryable statuses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
    retryable: HashSet<u16>,
}

impl RetryPolicy {
    pub fn new<I>(max_retries: u32, base_delay: Duration, retryable: I) -> Self
    where
        I: IntoIterator<Item = u16>,
    {
        Self {
            max_retries,
            base_delay,
            retryable: retryable.into_iter().collect(),
        }
    }

    pub fn from_settings(settings: &ClientSettings) -> Self {
        Self {
            max_retries: settings.retry_count(),
            base_delay: settings.retry_delay(),
            retryable: settings.retryable_status_codes().clone(),
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// True if `error` carries a status in the retryable set.
    pub fn is_retryable(&self, error: &HttpError) -> bool {
        error
            .status_code()
            .map(|status| self.retryable.contains(&status.as_u16()))
            .unwrap_or(false)
    }

    /// True if a failure on 1-indexed `attempt` should be retried.
    pub fn should_retry(&self, attempt: u32, error: &HttpError) -> bool {
        attempt <= self.max_retries && self.is_retryable(error)
    }

    // == Backoff ==
    /// Delay before retry `retry` (1-indexed): `base * 2^(retry-1)`, capped.
    pub fn backoff(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(31);
        self.base_delay
            .checked_mul(1u32 << exponent)
            .map(|delay| delay.min(MAX_BACKOFF))
            .unwrap_or(MAX_BACKOFF)
    }
}
