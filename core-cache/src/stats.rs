//! Cache statistics

use serde::{Deserialize, Serialize};

/// Counters accumulated by a [`TtlCacheManager`](crate::TtlCacheManager) since
/// it was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Entries removed on read because they were expired
    pub expired_evictions: u64,
    /// Entries removed on read because they could not be decoded
    pub corrupt_evictions: u64,
    /// Store operations that failed and were absorbed
    pub store_failures: u64,
}

impl CacheStats {
    /// Hit ratio as a percentage of all lookups.
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            return 0.0;
        }

        (self.hits as f64 / lookups as f64) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate() {
        assert_eq!(CacheStats::default().hit_rate(), 0.0);

        let stats = CacheStats {
            hits: 3,
            misses: 1,
            ..Default::default()
        };
        assert_eq!(stats.hit_rate(), 75.0);
    }
}
