//! Cache configuration

use std::time::Duration;

/// Namespace used when none is configured
pub const DEFAULT_CACHE_PREFIX: &str = "query-cache";

/// One hour
pub const DEFAULT_MAX_AGE: Duration = Duration::from_millis(3_600_000);

/// Configuration for [`TtlCacheManager`](crate::TtlCacheManager).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TtlCacheConfig {
    /// Namespace prepended to every key as `"{prefix}:"`
    pub prefix: String,

    /// Entries older than this are treated as absent
    pub max_age: Duration,
}

impl Default for TtlCacheConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_CACHE_PREFIX.to_string(),
            max_age: DEFAULT_MAX_AGE,
        }
    }
}

impl TtlCacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the key namespace.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Set the maximum entry age.
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    /// Maximum age in milliseconds, saturating at `i64::MAX`.
    pub fn max_age_millis(&self) -> i64 {
        i64::try_from(self.max_age.as_millis()).unwrap_or(i64::MAX)
    }

    /// Full storage key for `key` under this config's prefix.
    pub fn storage_key(&self, key: &str) -> String {
        format!("{}:{}", self.prefix, key)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.prefix.is_empty() {
            return Err("Cache prefix cannot be empty".to_string());
        }
        if self.prefix.contains(':') {
            return Err("Cache prefix cannot contain ':'".to_string());
        }
        if self.max_age.is_zero() {
            return Err("Cache max age must be greater than zero".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TtlCacheConfig::default();
        assert_eq!(config.prefix, "query-cache");
        assert_eq!(config.max_age_millis(), 3_600_000);
        assert_eq!(config.storage_key("catalog"), "query-cache:catalog");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        assert!(TtlCacheConfig::new().with_prefix("").validate().is_err());
        assert!(TtlCacheConfig::new().with_prefix("a:b").validate().is_err());
        assert!(TtlCacheConfig::new()
            .with_max_age(Duration::ZERO)
            .validate()
            .is_err());
    }
}
