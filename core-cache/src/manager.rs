//! TTL cache manager

use crate::config::TtlCacheConfig;
use crate::envelope::CacheEnvelope;
use crate::error::{CacheError, Result};
use crate::stats::CacheStats;
use bridge_traits::storage::KeyValueStore;
use bridge_traits::time::Clock;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

enum Lookup<T> {
    Hit(T),
    Absent,
    Expired { age_ms: i64 },
}

/// Persists query results with a maximum age.
///
/// Cloning is cheap and every clone shares the same store and statistics.
#[derive(Clone)]
pub struct TtlCacheManager {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    config: TtlCacheConfig,
    stats: Arc<Mutex<CacheStats>>,
}

impl TtlCacheManager {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        config: TtlCacheConfig,
    ) -> Self {
        Self {
            store,
            clock,
            config,
            stats: Arc::new(Mutex::new(CacheStats::default())),
        }
    }

    pub fn config(&self) -> &TtlCacheConfig {
        &self.config
    }

    pub fn prefix(&self) -> &str {
        &self.config.prefix
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> CacheStats {
        *self.stats.lock()
    }

    /// Store `payload` under `key`, stamped with the current time.
    #[instrument(skip(self, payload), fields(prefix = %self.config.prefix))]
    pub async fn save<T: Serialize + ?Sized>(&self, key: &str, payload: &T) {
        let storage_key = self.config.storage_key(key);
        if let Err(e) = self.try_save(&storage_key, payload).await {
            self.stats.lock().store_failures += 1;
            warn!(key = %storage_key, error = %e, "Failed to write cache entry");
        }
    }

    /// Cached payload for `key`, or `None` when absent, expired or unreadable.
    #[instrument(skip(self), fields(prefix = %self.config.prefix))]
    pub async fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let storage_key = self.config.storage_key(key);

        match self.try_load(&storage_key).await {
            Ok(Lookup::Hit(value)) => {
                self.stats.lock().hits += 1;
                debug!(key = %storage_key, "Cache hit");
                Some(value)
            }
            Ok(Lookup::Absent) => {
                self.stats.lock().misses += 1;
                None
            }
            Ok(Lookup::Expired { age_ms }) => {
                {
                    let mut stats = self.stats.lock();
                    stats.misses += 1;
                    stats.expired_evictions += 1;
                }
                debug!(key = %storage_key, age_ms, "Cache entry expired");
                self.evict(&storage_key).await;
                None
            }
            Err(e @ CacheError::Corruption { .. }) => {
                {
                    let mut stats = self.stats.lock();
                    stats.misses += 1;
                    stats.corrupt_evictions += 1;
                }
                warn!(error = %e, "Evicting corrupted cache entry");
                self.evict(&storage_key).await;
                None
            }
            Err(e) => {
                {
                    let mut stats = self.stats.lock();
                    stats.misses += 1;
                    stats.store_failures += 1;
                }
                warn!(key = %storage_key, error = %e, "Failed to read cache entry");
                None
            }
        }
    }

    /// Delete the entry for `key`.
    pub async fn remove(&self, key: &str) {
        let storage_key = self.config.storage_key(key);
        self.evict(&storage_key).await;
    }

    /// Delete every entry stored under `"{prefix}:"`.
    ///
    /// Returns the number of entries removed.
    #[instrument(skip(self))]
    pub async fn clear_all(&self, prefix: &str) -> usize {
        let namespace = format!("{}:", prefix);
        let removed = self
            .remove_where(|key| key.starts_with(&namespace))
            .await
            .len();

        debug!(prefix, removed, "Cleared cache namespace");
        removed
    }

    /// Delete every entry whose key belongs to one of `families`: the bare
    /// family key or any `"{family}_{scope}"` key.
    ///
    /// Returns the removed keys without this manager's prefix.
    #[instrument(skip(self))]
    pub async fn remove_families(&self, families: &[&str]) -> Vec<String> {
        let namespace = format!("{}:", self.config.prefix);
        let removed = self
            .remove_where(|key| {
                key.strip_prefix(&namespace).is_some_and(|logical| {
                    families.iter().any(|family| {
                        logical == *family
                            || logical
                                .strip_prefix(*family)
                                .is_some_and(|rest| rest.starts_with('_'))
                    })
                })
            })
            .await;

        removed
            .into_iter()
            .filter_map(|key| key.strip_prefix(&namespace).map(str::to_string))
            .collect()
    }

    async fn remove_where(&self, matches: impl Fn(&str) -> bool) -> Vec<String> {
        let keys = match self.store.list_keys().await {
            Ok(keys) => keys,
            Err(e) => {
                self.stats.lock().store_failures += 1;
                warn!(error = %e, "Failed to enumerate cache keys");
                return Vec::new();
            }
        };

        let mut removed = Vec::new();
        for key in keys.into_iter().filter(|k| matches(k)) {
            match self.store.delete(&key).await {
                Ok(()) => removed.push(key),
                Err(e) => {
                    self.stats.lock().store_failures += 1;
                    warn!(key = %key, error = %e, "Failed to delete cache entry");
                }
            }
        }
        removed
    }

    /// Delete every entry under this manager's own prefix.
    pub async fn clear(&self) -> usize {
        let prefix = self.config.prefix.clone();
        self.clear_all(&prefix).await
    }

    /// Return the cached value for `key`, or run `compute` and cache its
    /// result. Errors from `compute` are returned as-is and nothing is cached.
    pub async fn get_or_compute<T, E, F>(&self, key: &str, compute: F) -> std::result::Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: Future<Output = std::result::Result<T, E>>,
    {
        if let Some(cached) = self.load::<T>(key).await {
            return Ok(cached);
        }

        let value = compute.await?;
        self.save(key, &value).await;
        Ok(value)
    }

    async fn try_save<T: Serialize + ?Sized>(&self, storage_key: &str, payload: &T) -> Result<()> {
        let envelope = CacheEnvelope::new(payload, self.clock.unix_timestamp_millis());
        let raw = serde_json::to_string(&envelope)?;
        self.store.set(storage_key, &raw).await?;
        Ok(())
    }

    async fn try_load<T: DeserializeOwned>(&self, storage_key: &str) -> Result<Lookup<T>> {
        let Some(raw) = self.store.get(storage_key).await? else {
            return Ok(Lookup::Absent);
        };

        let corruption = |e: serde_json::Error| CacheError::Corruption {
            key: storage_key.to_string(),
            message: e.to_string(),
        };

        let envelope: CacheEnvelope<serde_json::Value> =
            serde_json::from_str(&raw).map_err(corruption)?;

        let now = self.clock.unix_timestamp_millis();
        if envelope.is_expired(now, self.config.max_age_millis()) {
            return Ok(Lookup::Expired {
                age_ms: envelope.age_millis(now),
            });
        }

        let value = serde_json::from_value(envelope.data).map_err(corruption)?;
        Ok(Lookup::Hit(value))
    }

    async fn evict(&self, storage_key: &str) {
        if let Err(e) = self.store.delete(storage_key).await {
            self.stats.lock().store_failures += 1;
            warn!(key = %storage_key, error = %e, "Failed to evict cache entry");
        }
    }
}

impl std::fmt::Debug for TtlCacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCacheManager")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use bridge_traits::time::ManualClock;
    use std::collections::BTreeMap;

    const T0: i64 = 1_700_000_000_000;

    #[derive(Default)]
    struct MemoryStore {
        entries: Mutex<BTreeMap<String, String>>,
    }

    impl MemoryStore {
        fn raw(&self, key: &str) -> Option<String> {
            self.entries.lock().get(key).cloned()
        }

        fn put_raw(&self, key: &str, value: &str) {
            self.entries.lock().insert(key.to_string(), value.to_string());
        }
    }

    #[async_trait]
    impl KeyValueStore for MemoryStore {
        async fn get(&self, key: &str) -> BridgeResult<Option<String>> {
            Ok(self.entries.lock().get(key).cloned())
        }

        async fn set(&self, key: &str, value: &str) -> BridgeResult<()> {
            self.entries.lock().insert(key.to_string(), value.to_string());
            Ok(())
        }

        async fn delete(&self, key: &str) -> BridgeResult<()> {
            self.entries.lock().remove(key);
            Ok(())
        }

        async fn list_keys(&self) -> BridgeResult<Vec<String>> {
            Ok(self.entries.lock().keys().cloned().collect())
        }
    }

    fn manager() -> (TtlCacheManager, Arc<MemoryStore>, Arc<ManualClock>) {
        let store = Arc::new(MemoryStore::default());
        let clock = Arc::new(ManualClock::new(T0));
        let cache = TtlCacheManager::new(store.clone(), clock.clone(), TtlCacheConfig::default());
        (cache, store, clock)
    }

    #[tokio::test]
    async fn test_save_writes_envelope_under_prefixed_key() {
        let (cache, store, _clock) = manager();

        cache.save("catalog", &vec!["s1", "s2"]).await;

        let raw = store.raw("query-cache:catalog").unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["data"], serde_json::json!(["s1", "s2"]));
        assert_eq!(value["timestamp"], serde_json::json!(T0));
    }

    #[tokio::test]
    async fn test_entry_expires_after_max_age() {
        let (cache, store, clock) = manager();
        cache.save("catalog", &vec![1, 2, 3]).await;

        clock.set_millis(T0 + 1_000);
        assert_eq!(cache.load::<Vec<i32>>("catalog").await, Some(vec![1, 2, 3]));

        clock.set_millis(T0 + 7_200_000);
        assert_eq!(cache.load::<Vec<i32>>("catalog").await, None);
        assert!(store.raw("query-cache:catalog").is_none());

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.expired_evictions, 1);
    }

    #[tokio::test]
    async fn test_entry_at_exact_max_age_is_still_fresh() {
        let (cache, _store, clock) = manager();
        cache.save("k", &"v").await;

        clock.set_millis(T0 + 3_600_000);
        assert_eq!(cache.load::<String>("k").await.as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn test_corrupted_entries_are_evicted() {
        let (cache, store, _clock) = manager();
        store.put_raw("query-cache:broken", "{not json");
        store.put_raw("query-cache:no-timestamp", r#"{"data": 1}"#);

        assert_eq!(cache.load::<i32>("broken").await, None);
        assert_eq!(cache.load::<i32>("no-timestamp").await, None);
        assert!(store.raw("query-cache:broken").is_none());
        assert!(store.raw("query-cache:no-timestamp").is_none());
        assert_eq!(cache.stats().corrupt_evictions, 2);
    }

    #[tokio::test]
    async fn test_payload_of_wrong_shape_is_treated_as_corrupt() {
        let (cache, store, _clock) = manager();
        cache.save("k", &"text").await;

        assert_eq!(cache.load::<Vec<i32>>("k").await, None);
        assert!(store.raw("query-cache:k").is_none());
    }

    #[tokio::test]
    async fn test_clear_all_only_touches_namespace() {
        let (cache, store, _clock) = manager();
        cache.save("a", &1).await;
        cache.save("b", &2).await;
        store.put_raw("query-cache-other:a", "x");
        store.put_raw("settings", "y");

        assert_eq!(cache.clear_all("query-cache").await, 2);
        assert!(store.raw("query-cache-other:a").is_some());
        assert!(store.raw("settings").is_some());
        assert_eq!(cache.clear().await, 0);
    }

    #[tokio::test]
    async fn test_remove_families_matches_bare_and_scoped_keys() {
        let (cache, store, _clock) = manager();
        cache.save("catalog", &1).await;
        cache.save("catalog_u1", &2).await;
        cache.save("trending_day", &3).await;
        cache.save("catalogue", &4).await;
        cache.save("likes_u1", &5).await;
        store.put_raw("other:catalog", "x");

        let mut removed = cache.remove_families(&["catalog", "trending"]).await;
        removed.sort();

        assert_eq!(removed, vec!["catalog", "catalog_u1", "trending_day"]);
        assert_eq!(cache.load::<i32>("catalogue").await, Some(4));
        assert_eq!(cache.load::<i32>("likes_u1").await, Some(5));
        assert!(store.raw("other:catalog").is_some());
    }

    #[tokio::test]
    async fn test_remove() {
        let (cache, _store, _clock) = manager();
        cache.save("k", &1).await;
        cache.remove("k").await;
        assert_eq!(cache.load::<i32>("k").await, None);
    }

    #[tokio::test]
    async fn test_get_or_compute() {
        let (cache, _store, _clock) = manager();

        let first: std::result::Result<i32, String> =
            cache.get_or_compute("answer", async { Ok(42) }).await;
        assert_eq!(first, Ok(42));

        let second: std::result::Result<i32, String> = cache
            .get_or_compute("answer", async { Err("should not run".to_string()) })
            .await;
        assert_eq!(second, Ok(42));

        let failed: std::result::Result<i32, String> = cache
            .get_or_compute("other", async { Err("boom".to_string()) })
            .await;
        assert_eq!(failed, Err("boom".to_string()));
        assert_eq!(cache.load::<i32>("other").await, None);
    }

    mockall::mock! {
        Store {}

        #[async_trait]
        impl KeyValueStore for Store {
            async fn get(&self, key: &str) -> BridgeResult<Option<String>>;
            async fn set(&self, key: &str, value: &str) -> BridgeResult<()>;
            async fn delete(&self, key: &str) -> BridgeResult<()>;
            async fn list_keys(&self) -> BridgeResult<Vec<String>>;
        }
    }

    #[tokio::test]
    async fn test_store_failures_are_absorbed() {
        let mut store = MockStore::new();
        store
            .expect_get()
            .returning(|_| Err(BridgeError::DatabaseError("disk full".to_string())));
        store
            .expect_set()
            .returning(|_, _| Err(BridgeError::DatabaseError("disk full".to_string())));
        store
            .expect_list_keys()
            .returning(|| Err(BridgeError::NotAvailable("kv".to_string())));

        let cache = TtlCacheManager::new(
            Arc::new(store),
            Arc::new(ManualClock::new(T0)),
            TtlCacheConfig::default(),
        );

        cache.save("k", &1).await;
        assert_eq!(cache.load::<i32>("k").await, None);
        assert_eq!(cache.clear().await, 0);
        assert_eq!(cache.stats().store_failures, 3);
    }
}
