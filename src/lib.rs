//! Resilient Net - A network access layer for async Rust services
//!
//! Provides a thread-safe TTL + LRU cache with change notifications and a
//! resilient HTTP client with retries, bounded concurrency and metrics.

pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod tasks;

pub use cache::{CacheStatistics, ListenerId, NetworkCache};
pub use config::CacheConfig;
pub use error::{CacheError, CacheResult, ConfigError, HttpError, HttpResult};
pub use http::{ClientSettings, HttpClient, RequestBody, Transport};
pub use tokio_util::sync::CancellationToken;
