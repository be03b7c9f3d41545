//! Configuration Module
//!
//! Handles loading and validating cache configuration from environment variables.

use std::env;
use std::time::Duration;

use crate::error::ConfigError;

/// Default TTL applied by `NetworkCache::set`
pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

/// Default interval between background sweeps
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Default number of expired entries removed per sweep pass
pub const DEFAULT_SWEEP_BATCH_SIZE: usize = 100;

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries the cache can hold
    pub max_entries: usize,
    /// TTL for entries stored without an explicit TTL
    pub default_ttl: Duration,
    /// Background sweep interval
    pub sweep_interval: Duration,
    /// Expired entries removed per background sweep pass
    pub sweep_batch_size: usize,
}

impl CacheConfig {
    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_MAX_ENTRIES` - Maximum cache entries (default: 1000)
    /// - `CACHE_DEFAULT_TTL_SECS` - Default TTL in seconds (default: 1800)
    /// - `CACHE_SWEEP_INTERVAL_SECS` - Sweep frequency in seconds (default: 300)
    /// - `CACHE_SWEEP_BATCH_SIZE` - Entries removed per sweep pass (default: 100)
    ///
    /// Unparsable values fall back to the default; parsed values are
    /// validated and a zero is rejected.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            max_entries: env_parse("CACHE_MAX_ENTRIES").unwrap_or(defaults.max_entries),
            default_ttl: env_parse("CACHE_DEFAULT_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.default_ttl),
            sweep_interval: env_parse("CACHE_SWEEP_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.sweep_interval),
            sweep_batch_size: env_parse("CACHE_SWEEP_BATCH_SIZE")
                .unwrap_or(defaults.sweep_batch_size),
        };
        config.validate()?;
        Ok(config)
    }

    /// Creates a default config with the given capacity.
    pub fn with_capacity(max_entries: usize) -> Self {
        Self {
            max_entries,
            ..Self::default()
        }
    }

    // == Validate ==
    /// Rejects zero capacity, TTL, interval or batch size.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_entries == 0 {
            return Err(ConfigError::NonPositive {
                field: "max_entries",
            });
        }
        if self.default_ttl.is_zero() {
            return Err(ConfigError::NonPositive {
                field: "default_ttl",
            });
        }
        if self.sweep_interval.is_zero() {
            return Err(ConfigError::NonPositive {
                field: "sweep_interval",
            });
        }
        if self.sweep_batch_size == 0 {
            return Err(ConfigError::NonPositive {
                field: "sweep_batch_size",
            });
        }
        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            default_ttl: DEFAULT_TTL,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            sweep_batch_size: DEFAULT_SWEEP_BATCH_SIZE,
        }
    }
}

/// Reads and parses an environment variable, ignoring absent or bad values.
pub(crate) fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}
