//! Cache Statistics Module
//!
//! Point-in-time snapshot of cache occupancy.

use serde::Serialize;

// == Cache Statistics ==
/// Occupancy snapshot computed on demand.
///
/// `expired_entries` counts entries past their expiry that nobody has read
/// or swept yet, so it is only as fresh as the last sweep or read pattern.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStatistics {
    /// Current number of entries in the cache
    pub total_entries: usize,
    /// Configured maximum number of entries
    pub capacity: usize,
    /// Entries whose expiry is still in the future
    pub active_entries: usize,
    /// Entries whose expiry has passed but are still stored
    pub expired_entries: usize,
}

impl CacheStatistics {
    // == Constructor ==
    pub fn new(capacity: usize, active_entries: usize, expired_entries: usize) -> Self {
        Self {
            total_entries: active_entries + expired_entries,
            capacity,
            active_entries,
            expired_entries,
        }
    }

    // == Fill Ratio ==
    /// Returns total_entries / capacity, or 0.0 for a zero capacity.
    pub fn fill_ratio(&self) -> f64 {
        if self.capacity == 0 {
            0.0
        } else {
            self.total_entries as f64 / self.capacity as f64
        }
    }

    pub fn is_full(&self) -> bool {
        self.total_entries >= self.capacity
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_default() {
        let stats = CacheStatistics::default();
        assert_eq!(stats.total_entries, 0);
        assert_eq!(stats.active_entries, 0);
        assert_eq!(stats.expired_entries, 0);
        assert_eq!(stats.fill_ratio(), 0.0);
    }

    #[test]
    fn test_stats_totals() {
        let stats = CacheStatistics::new(10, 3, 2);
        assert_eq!(stats.total_entries, 5);
        assert_eq!(stats.fill_ratio(), 0.5);
        assert!(!stats.is_full());
    }

    #[test]
    fn test_stats_full() {
        let stats = CacheStatistics::new(4, 4, 0);
        assert!(stats.is_full());
    }

    #[test]
    fn test_stats_serialize() {
        let stats = CacheStatistics::new(100, 1, 1);
        let json = serde_json::to_value(stats).unwrap();
        assert_eq!(json["total_entries"], 2);
        assert_eq!(json["capacity"], 100);
        assert_eq!(json["expired_entries"], 1);
    }
}
