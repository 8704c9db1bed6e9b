//! Persisted cache entry format

use serde::{Deserialize, Serialize};

/// A cached payload together with the time it was written.
///
/// Serialized as `{ "data": <payload>, "timestamp": <epoch millis> }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEnvelope<T> {
    pub data: T,
    pub timestamp: i64,
}

impl<T> CacheEnvelope<T> {
    pub fn new(data: T, timestamp: i64) -> Self {
        Self { data, timestamp }
    }

    /// Milliseconds elapsed since the entry was written.
    pub fn age_millis(&self, now_millis: i64) -> i64 {
        now_millis.saturating_sub(self.timestamp)
    }

    /// An entry is expired once its age strictly exceeds `max_age_millis`.
    pub fn is_expired(&self, now_millis: i64, max_age_millis: i64) -> bool {
        self.age_millis(now_millis) > max_age_millis
    }
}
