//! Client Settings Module
//!
//! Validated configuration for `HttpClient`.

use std::collections::HashSet;
use std::time::Duration;

use reqwest::Url;

use crate::config::env_parse;
use crate::error::ConfigError;
use crate::http::gate::MAX_GATE_CAPACITY;

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(100);

/// Default base delay for exponential backoff
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Statuses retried unless configured otherwise
pub const DEFAULT_RETRYABLE_STATUS_CODES: [u16; 5] = [408, 500, 502, 503, 504];

// == Handler Options ==
/// Transport-level behaviour applied when the client builds its own transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerOptions {
    pub follow_redirects: bool,
    pub max_redirects: usize,
    /// gzip and deflate response decoding
    pub decompression: bool,
    pub cookies: bool,
}

impl Default for HandlerOptions {
    fn default() -> Self {
        Self {
            follow_redirects: true,
            max_redirects: 20,
            decompression: true,
            cookies: true,
        }
    }
}

/// HTTP protocol version hint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProtocolVersion {
    /// Negotiate
    #[default]
    Auto,
    Http1,
    /// HTTP/2 with prior knowledge
    Http2,
}

// == Client Settings ==
/// Settings for `HttpClient`.
///
/// Setters validate their argument; `validate` checks the whole set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    timeout: Duration,
    base_address: Option<Url>,
    retry_count: u32,
    retry_delay: Duration,
    max_concurrent_requests: usize,
    max_metrics_count: usize,
    retryable_status_codes: HashSet<u16>,
    handler: HandlerOptions,
    protocol: ProtocolVersion,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            base_address: None,
            retry_count: 3,
            retry_delay: DEFAULT_RETRY_DELAY,
            max_concurrent_requests: 10,
            max_metrics_count: 1000,
            retryable_status_codes: DEFAULT_RETRYABLE_STATUS_CODES.into_iter().collect(),
            handler: HandlerOptions::default(),
            protocol: ProtocolVersion::Auto,
        }
    }
}

impl ClientSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads settings from environment variables on top of the defaults.
    ///
    /// # Environment Variables
    /// - `HTTP_TIMEOUT_MS` - Per-request timeout (default: 100000)
    /// - `HTTP_BASE_ADDRESS` - Absolute base URL (default: none)
    /// - `HTTP_RETRY_COUNT` - Retries after the first attempt (default: 3)
    /// - `HTTP_RETRY_DELAY_MS` - Base backoff delay (default: 1000)
    /// - `HTTP_MAX_CONCURRENT_REQUESTS` - Gate size (default: 10)
    /// - `HTTP_MAX_METRICS_COUNT` - Latency samples kept (default: 1000)
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut settings = Self::default();

        if let Some(ms) = env_parse::<u64>("HTTP_TIMEOUT_MS") {
            settings.set_timeout(Duration::from_millis(ms))?;
        }
        if let Ok(address) = std::env::var("HTTP_BASE_ADDRESS") {
            settings.set_base_address(&address)?;
        }
        if let Some(count) = env_parse::<u32>("HTTP_RETRY_COUNT") {
            settings.set_retry_count(count);
        }
        if let Some(ms) = env_parse::<u64>("HTTP_RETRY_DELAY_MS") {
            settings.set_retry_delay(Duration::from_millis(ms))?;
        }
        if let Some(max) = env_parse::<usize>("HTTP_MAX_CONCURRENT_REQUESTS") {
            settings.set_max_concurrent_requests(max)?;
        }
        if let Some(max) = env_parse::<usize>("HTTP_MAX_METRICS_COUNT") {
            settings.set_max_metrics_count(max)?;
        }

        settings.validate()?;
        Ok(settings)
    }

    // == Accessors ==
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn base_address(&self) -> Option<&Url> {
        self.base_address.as_ref()
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    pub fn max_concurrent_requests(&self) -> usize {
        self.max_concurrent_requests
    }

    pub fn max_metrics_count(&self) -> usize {
        self.max_metrics_count
    }

    pub fn retryable_status_codes(&self) -> &HashSet<u16> {
        &self.retryable_status_codes
    }

    pub fn handler(&self) -> &HandlerOptions {
        &self.handler
    }

    pub fn protocol(&self) -> ProtocolVersion {
        self.protocol
    }

    // == Setters ==
    pub fn set_timeout(&mut self, timeout: Duration) -> Result<&mut Self, ConfigError> {
        non_zero_duration(timeout, "timeout")?;
        self.timeout = timeout;
        Ok(self)
    }

    /// Parses and sets the absolute URL relative request paths resolve against.
    pub fn set_base_address(&mut self, address: &str) -> Result<&mut Self, ConfigError> {
        self.base_address = Some(parse_base_address(address)?);
        Ok(self)
    }

    pub fn clear_base_address(&mut self) -> &mut Self {
        self.base_address = None;
        self
    }

    /// Number of retries after the first attempt. Zero disables retrying.
    pub fn set_retry_count(&mut self, retry_count: u32) -> &mut Self {
        self.retry_count = retry_count;
        self
    }

    pub fn set_retry_delay(&mut self, delay: Duration) -> Result<&mut Self, ConfigError> {
        non_zero_duration(delay, "retry_delay")?;
        self.retry_delay = delay;
        Ok(self)
    }

    pub fn set_max_concurrent_requests(&mut self, max: usize) -> Result<&mut Self, ConfigError> {
        concurrency_limit(max)?;
        self.max_concurrent_requests = max;
        Ok(self)
    }

    pub fn set_max_metrics_count(&mut self, max: usize) -> Result<&mut Self, ConfigError> {
        non_zero(max, "max_metrics_count")?;
        self.max_metrics_count = max;
        Ok(self)
    }

    /// Replaces the retryable set. An empty set disables retrying.
    pub fn set_retryable_status_codes<I>(&mut self, codes: I) -> &mut Self
    where
        I: IntoIterator<Item = u16>,
    {
        self.retryable_status_codes = codes.into_iter().collect();
        self
    }

    pub fn set_handler(&mut self, handler: HandlerOptions) -> Result<&mut Self, ConfigError> {
        validate_handler(&handler)?;
        self.handler = handler;
        Ok(self)
    }

    pub fn set_protocol(&mut self, protocol: ProtocolVersion) -> &mut Self {
        self.protocol = protocol;
        self
    }

    // == Validate ==
    /// Checks every field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        non_zero_duration(self.timeout, "timeout")?;
        non_zero_duration(self.retry_delay, "retry_delay")?;
        concurrency_limit(self.max_concurrent_requests)?;
        non_zero(self.max_metrics_count, "max_metrics_count")?;
        validate_handler(&self.handler)?;
        Ok(())
    }

    // == With ==
    /// Returns a modified copy, validated after `modify` runs.
    ///
    /// `self` is untouched whether or not the modification succeeds.
    ///
    /// # Example
    /// ```
    /// use std::time::Duration;
    /// use resilient_net::ClientSettings;
    ///
    /// let fast = ClientSettings::default()
    ///     .with(|s| {
    ///         s.set_timeout(Duration::from_secs(5))?.set_retry_count(1);
    ///         Ok(())
    ///     })
    ///     .unwrap();
    /// assert_eq!(fast.retry_count(), 1);
    /// ```
    pub fn with<F>(&self, modify: F) -> Result<Self, ConfigError>
    where
        F: FnOnce(&mut Self) -> Result<(), ConfigError>,
    {
        let mut copy = self.clone();
        modify(&mut copy)?;
        copy.validate()?;
        Ok(copy)
    }
}

fn non_zero(value: usize, field: &'static str) -> Result<(), ConfigError> {
    if value == 0 {
        Err(ConfigError::NonPositive { field })
    } else {
        Ok(())
    }
}

fn concurrency_limit(value: usize) -> Result<(), ConfigError> {
    non_zero(value, "max_concurrent_requests")?;
    if value > MAX_GATE_CAPACITY {
        return Err(ConfigError::TooLarge {
            field: "max_concurrent_requests",
            max: MAX_GATE_CAPACITY,
        });
    }
    Ok(())
}

fn non_zero_duration(value: Duration, field: &'static str) -> Result<(), ConfigError> {
    if value.is_zero() {
        Err(ConfigError::NonPositive { field })
    } else {
        Ok(())
    }
}

fn validate_handler(handler: &HandlerOptions) -> Result<(), ConfigError> {
    if handler.follow_redirects && handler.max_redirects == 0 {
        return Err(ConfigError::InvalidRedirectLimit);
    }
    Ok(())
}

fn parse_base_address(address: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(address.trim())
        .map_err(|e| ConfigError::InvalidBaseAddress(format!("{address}: {e}")))?;
    if url.cannot_be_a_base() {
        return Err(ConfigError::InvalidBaseAddress(address.to_string()));
    }
    Ok(url)
}
