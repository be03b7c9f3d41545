//! Error types for the cache and the HTTP client
//!
//! Provides unified error handling using thiserror.

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::StatusCode;
use thiserror::Error;

// == Config Error Enum ==
/// Validation failure for a configuration value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A numeric or duration field was zero
    #[error("{field} must be greater than zero")]
    NonPositive { field: &'static str },

    /// Base address could not be parsed as an absolute URL
    #[error("Invalid base address: {0}")]
    InvalidBaseAddress(String),

    /// A count exceeded what the runtime can represent
    #[error("{field} must not exceed {max}")]
    TooLarge { field: &'static str, max: usize },

    /// Redirects are followed but the limit is zero
    #[error("max_redirects must be greater than zero when redirects are followed")]
    InvalidRedirectLimit,
}

// == Cache Error Enum ==
/// Error type for cache operations.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The cache has been disposed
    #[error("Cache has been disposed")]
    Disposed,

    /// Eviction could not make room for a new key
    #[error("Cache full: no room after {attempts} eviction attempts (capacity {capacity})")]
    CapacityExhausted { capacity: usize, attempts: usize },

    /// The caller's cancellation token fired
    #[error("Cache operation was cancelled")]
    Cancelled,

    /// Invalid cache configuration
    #[error(transparent)]
    Config(#[from] ConfigError),
}

// == Http Error Enum ==
/// Error type for HTTP client operations.
#[derive(Error, Debug)]
pub enum HttpError {
    /// The client has been disposed
    #[error("HTTP client has been disposed")]
    Disposed,

    /// Invalid client settings
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Header name or value rejected
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// Request URL could not be resolved
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Timeout must be non-zero
    #[error("Timeout must be greater than 0")]
    InvalidTimeout,

    /// Server answered with a non-2xx status
    #[error("Request failed: {status} - {body}")]
    Status { status: StatusCode, body: String },

    /// Connection, protocol or body read failure
    #[error("Request failed: {message}")]
    Transport {
        message: String,
        status: Option<StatusCode>,
    },

    /// The HTTP stack reported a connection, DNS or body failure with no
    /// status attached. Never classified from its message.
    #[error("Network failure: {0}")]
    Network(String),

    /// The transport gave up waiting for a response
    #[error("Request timed out")]
    Timeout,

    /// A cancellation signal fired
    #[error("Request was cancelled")]
    Cancelled,

    /// Response body was not the expected JSON
    #[error("Failed to decode response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// The underlying transport could not be constructed
    #[error("Failed to build transport: {0}")]
    Build(String),
}

/// Matches a standalone three digit token.
static STATUS_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{3})\b").unwrap());

/// Status names that show up in messages from other HTTP stacks.
const STATUS_NAMES: &[(&str, u16)] = &[
    ("InternalServerError", 500),
    ("Internal Server Error", 500),
    ("BadGateway", 502),
    ("Bad Gateway", 502),
    ("ServiceUnavailable", 503),
    ("Service Unavailable", 503),
    ("GatewayTimeout", 504),
    ("Gateway Timeout", 504),
    ("RequestTimeout", 408),
    ("Request Timeout", 408),
    ("TooManyRequests", 429),
    ("Too Many Requests", 429),
];

impl HttpError {
    // == Status Code ==
    /// Returns the HTTP status associated with this failure.
    ///
    /// Structured statuses win. `Network` failures never carry one. For
    /// `Transport` failures without one, the message is scanned for a known status name or a three digit token in
    /// the 100..=599 range. That fallback is best-effort: a message that
    /// happens to contain an unrelated number may be misread.
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            HttpError::Status { status, .. } => Some(*status),
            HttpError::Transport {
                status: Some(status),
                ..
            } => Some(*status),
            HttpError::Transport { message, .. } => status_from_message(message),
            _ => None,
        }
    }

    /// True for errors raised before any I/O because an argument was bad.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            HttpError::Config(_)
                | HttpError::InvalidHeader(_)
                | HttpError::InvalidUrl(_)
                | HttpError::InvalidTimeout
        )
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, HttpError::Cancelled)
    }
}

// == Message Parsing ==
/// Best-effort status extraction from free-form error text.
pub fn status_from_message(message: &str) -> Option<StatusCode> {
    for (name, code) in STATUS_NAMES {
        if message.contains(name) {
            return StatusCode::from_u16(*code).ok();
        }
    }

    STATUS_TOKEN
        .captures_iter(message)
        .filter_map(|caps| caps.get(1)?.as_str().parse::<u16>().ok())
        .find(|code| (100..=599).contains(code))
        .and_then(|code| StatusCode::from_u16(code).ok())
}

// == Result Type Aliases ==
/// Convenience Result type for cache operations.
pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Convenience Result type for HTTP operations.
pub type HttpResult<T> = std::result::Result<T, HttpError>;
