//! # Core Configuration Module
//!
//! Builder-based configuration for the sync core.
//!
//! ## Overview
//!
//! `CoreConfigBuilder` collects every host bridge and tunable the core needs and
//! validates them in `build()`, failing fast with a descriptive error when a
//! required capability is missing.
//!
//! ## Required Dependencies
//!
//! - `RemoteStoreClient` - the remote source of truth
//! - `IdentityProvider` - which user is signed in
//! - `KeyValueStore` - persistence for the query cache
//! - `OfflineFileStore` - lookup of downloaded media
//!
//! When the `desktop-shims` feature is enabled, desktop defaults for
//! `KeyValueStore` and `OfflineFileStore` are injected if not provided.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .database_path("/path/to/library.db")
//!     .remote_client(Arc::new(MyRemoteClient))
//!     .identity(Arc::new(MySession))
//!     .media_base_url("https://cdn.example.com/storage/v1/object/public/")
//!     .cache_max_age_ms(60 * 60 * 1000)
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::{
    Clock, IdentityProvider, KeyValueStore, OfflineFileStore, RemoteStoreClient, SystemClock,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Database path value that selects an in-memory database.
pub const IN_MEMORY_DATABASE: &str = ":memory:";

/// Query cache settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    /// Key namespace; entries live at `"{prefix}:{key}"`
    pub prefix: String,
    /// Entries older than this are treated as misses
    pub max_age_ms: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            prefix: "query-cache".to_string(),
            max_age_ms: 60 * 60 * 1000,
        }
    }
}

/// Sync tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// Deadline for one remote fetch attempt
    pub fetch_timeout_ms: u64,
    /// Retries after the first failed attempt
    pub max_retries: u32,
    /// First retry delay; doubles per attempt
    pub retry_base_delay_ms: u64,
    /// Upper bound for a single retry delay
    pub retry_max_delay_ms: u64,
    /// Interval between background sync rounds
    pub background_interval_secs: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            fetch_timeout_ms: 30_000,
            max_retries: 3,
            retry_base_delay_ms: 500,
            retry_max_delay_ms: 10_000,
            background_interval_secs: 15 * 60,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeatureFlags {
    /// Run the periodic sync scheduler
    pub enable_background_sync: bool,
}

/// Fully validated core configuration
#[derive(Clone)]
pub struct CoreConfig {
    /// SQLite file for the local mirror, or [`IN_MEMORY_DATABASE`]
    pub database_path: PathBuf,

    pub remote_client: Arc<dyn RemoteStoreClient>,

    pub identity: Arc<dyn IdentityProvider>,

    pub kv_store: Arc<dyn KeyValueStore>,

    pub offline_files: Arc<dyn OfflineFileStore>,

    pub clock: Arc<dyn Clock>,

    /// Base URL that relative storage paths are joined onto
    pub media_base_url: Option<String>,

    pub cache: CacheSettings,

    pub sync: SyncSettings,

    pub event_buffer_size: usize,

    pub features: FeatureFlags,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("database_path", &self.database_path)
            .field("remote_client", &"RemoteStoreClient { ... }")
            .field("identity", &"IdentityProvider { ... }")
            .field("kv_store", &"KeyValueStore { ... }")
            .field("offline_files", &"OfflineFileStore { ... }")
            .field("media_base_url", &self.media_base_url)
            .field("cache", &self.cache)
            .field("sync", &self.sync)
            .field("event_buffer_size", &self.event_buffer_size)
            .field("features", &self.features)
            .finish()
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    pub fn is_in_memory(&self) -> bool {
        self.database_path.as_os_str() == IN_MEMORY_DATABASE
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.database_path.as_os_str().is_empty() {
            return Err(Error::Config("Database path cannot be empty".to_string()));
        }

        if self.cache.prefix.is_empty() {
            return Err(Error::Config("Cache prefix cannot be empty".to_string()));
        }

        if self.cache.prefix.contains(':') {
            return Err(Error::Config(
                "Cache prefix cannot contain ':' (used as key separator)".to_string(),
            ));
        }

        if self.cache.max_age_ms == 0 {
            return Err(Error::Config(
                "Cache max age must be greater than 0ms".to_string(),
            ));
        }

        if self.sync.fetch_timeout_ms == 0 {
            return Err(Error::Config(
                "Fetch timeout must be greater than 0ms".to_string(),
            ));
        }

        if self.sync.retry_base_delay_ms > self.sync.retry_max_delay_ms {
            return Err(Error::Config(
                "Retry base delay cannot exceed the maximum retry delay".to_string(),
            ));
        }

        if self.features.enable_background_sync && self.sync.background_interval_secs == 0 {
            return Err(Error::Config(
                "Background sync enabled with a zero interval".to_string(),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        if let Some(base) = &self.media_base_url {
            let parsed = url::Url::parse(base)
                .map_err(|e| Error::Config(format!("Invalid media base URL '{}': {}", base, e)))?;
            if parsed.cannot_be_a_base() {
                return Err(Error::Config(format!(
                    "Media base URL '{}' cannot be used as a base",
                    base
                )));
            }
        }

        Ok(())
    }
}

fn remote_client_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "RemoteStoreClient".to_string(),
        message: "A RemoteStoreClient is required to fetch remote snapshots. \
                 Inject the host's API client adapter."
            .to_string(),
    }
}

fn identity_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "IdentityProvider".to_string(),
        message: "An IdentityProvider is required to scope user data. \
                 Inject the host's session adapter or a StaticIdentity."
            .to_string(),
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn kv_store_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "KeyValueStore".to_string(),
        message: "A KeyValueStore is required for the query cache. \
                 Desktop: enable the 'desktop-shims' feature to use SqliteKeyValueStore. \
                 Mobile: inject the platform key-value store (MMKV/UserDefaults/SharedPreferences)."
            .to_string(),
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn offline_files_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "OfflineFileStore".to_string(),
        message: "An OfflineFileStore is required to resolve downloaded media. \
                 Desktop: enable the 'desktop-shims' feature to use DirectoryOfflineFileStore. \
                 Mobile: inject the platform download index."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_kv_store(database_path: &Path) -> Result<Arc<dyn KeyValueStore>> {
    use bridge_desktop::SqliteKeyValueStore;
    use std::thread;
    use tokio::runtime::{Handle, Runtime};

    let in_memory = database_path.as_os_str() == IN_MEMORY_DATABASE;
    let candidate = database_path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map(|parent| parent.join("kv_store.db"))
        .unwrap_or_else(|| PathBuf::from("kv_store.db"));

    let init_store = move || -> Result<SqliteKeyValueStore> {
        let runtime = Runtime::new().map_err(|e| {
            Error::Internal(format!(
                "Failed to create Tokio runtime for default KeyValueStore: {}",
                e
            ))
        })?;

        let created = if in_memory {
            runtime.block_on(SqliteKeyValueStore::in_memory())
        } else {
            runtime.block_on(SqliteKeyValueStore::new(candidate))
        };
        created.map_err(|e| {
            Error::Internal(format!("Failed to initialize default KeyValueStore: {}", e))
        })
    };

    // block_on panics inside a runtime, so build on a helper thread there
    let store = match Handle::try_current() {
        Ok(_) => thread::spawn(init_store).join().map_err(|_| {
            Error::Internal("Thread panicked while creating default KeyValueStore".to_string())
        })??,
        Err(_) => init_store()?,
    };

    let store: Arc<dyn KeyValueStore> = Arc::new(store);
    Ok(store)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_kv_store(_database_path: &Path) -> Result<Arc<dyn KeyValueStore>> {
    Err(kv_store_missing_error())
}

#[cfg(feature = "desktop-shims")]
fn provide_default_offline_files() -> Result<Arc<dyn OfflineFileStore>> {
    use bridge_desktop::DirectoryOfflineFileStore;

    let store: Arc<dyn OfflineFileStore> = Arc::new(DirectoryOfflineFileStore::new());
    Ok(store)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_offline_files() -> Result<Arc<dyn OfflineFileStore>> {
    Err(offline_files_missing_error())
}

#[derive(Default)]
pub struct CoreConfigBuilder {
    database_path: Option<PathBuf>,
    remote_client: Option<Arc<dyn RemoteStoreClient>>,
    identity: Option<Arc<dyn IdentityProvider>>,
    kv_store: Option<Arc<dyn KeyValueStore>>,
    offline_files: Option<Arc<dyn OfflineFileStore>>,
    clock: Option<Arc<dyn Clock>>,
    media_base_url: Option<String>,
    cache: CacheSettings,
    sync: SyncSettings,
    event_buffer_size: Option<usize>,
    features: FeatureFlags,
}

impl CoreConfigBuilder {
    pub fn database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.database_path = Some(path.into());
        self
    }

    /// Use an in-memory database for the local mirror
    pub fn in_memory_database(mut self) -> Self {
        self.database_path = Some(PathBuf::from(IN_MEMORY_DATABASE));
        self
    }

    pub fn remote_client(mut self, client: Arc<dyn RemoteStoreClient>) -> Self {
        self.remote_client = Some(client);
        self
    }

    pub fn identity(mut self, identity: Arc<dyn IdentityProvider>) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn kv_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.kv_store = Some(store);
        self
    }

    pub fn offline_files(mut self, store: Arc<dyn OfflineFileStore>) -> Self {
        self.offline_files = Some(store);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn media_base_url(mut self, url: impl Into<String>) -> Self {
        self.media_base_url = Some(url.into());
        self
    }

    pub fn cache_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.cache.prefix = prefix.into();
        self
    }

    pub fn cache_max_age_ms(mut self, max_age_ms: u64) -> Self {
        self.cache.max_age_ms = max_age_ms;
        self
    }

    pub fn sync_settings(mut self, settings: SyncSettings) -> Self {
        self.sync = settings;
        self
    }

    pub fn fetch_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.sync.fetch_timeout_ms = timeout_ms;
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.sync.max_retries = retries;
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    pub fn enable_background_sync(mut self, enabled: bool) -> Self {
        self.features.enable_background_sync = enabled;
        self
    }

    pub fn build(self) -> Result<CoreConfig> {
        let database_path = self.database_path.ok_or_else(|| {
            Error::Config(
                "Database path is required. Use .database_path() or .in_memory_database()."
                    .to_string(),
            )
        })?;

        let remote_client = self.remote_client.ok_or_else(remote_client_missing_error)?;
        let identity = self.identity.ok_or_else(identity_missing_error)?;

        let kv_store = match self.kv_store {
            Some(store) => store,
            None => provide_default_kv_store(&database_path)?,
        };

        let offline_files = match self.offline_files {
            Some(store) => store,
            None => provide_default_offline_files()?,
        };

        let config = CoreConfig {
            database_path,
            remote_client,
            identity,
            kv_store,
            offline_files,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            media_base_url: self.media_base_url,
            cache: self.cache,
            sync: self.sync,
            event_buffer_size: self
                .event_buffer_size
                .unwrap_or(crate::events::DEFAULT_EVENT_BUFFER_SIZE),
            features: self.features,
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::{RemoteRow, SelectRequest, StaticIdentity};
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct NullRemote;

    #[async_trait]
    impl RemoteStoreClient for NullRemote {
        async fn select(&self, _request: SelectRequest) -> BridgeResult<Vec<RemoteRow>> {
            Ok(Vec::new())
        }

        async fn rpc(&self, _name: &str, _args: serde_json::Value) -> BridgeResult<Vec<RemoteRow>> {
            Ok(Vec::new())
        }
    }

    #[derive(Default)]
    struct MemoryKv {
        values: Mutex<HashMap<String, String>>,
    }

    #[async_trait]
    impl KeyValueStore for MemoryKv {
        async fn get(&self, key: &str) -> BridgeResult<Option<String>> {
            Ok(self.values.lock().unwrap().get(key).cloned())
        }

        async fn set(&self, key: &str, value: &str) -> BridgeResult<()> {
            self.values
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }

        async fn delete(&self, key: &str) -> BridgeResult<()> {
            self.values.lock().unwrap().remove(key);
            Ok(())
        }

        async fn list_keys(&self) -> BridgeResult<Vec<String>> {
            Ok(self.values.lock().unwrap().keys().cloned().collect())
        }
    }

    struct NoOffline;

    #[async_trait]
    impl OfflineFileStore for NoOffline {
        async fn local_path(&self, _media_id: &str) -> BridgeResult<Option<PathBuf>> {
            Ok(None)
        }
    }

    fn complete_builder() -> CoreConfigBuilder {
        CoreConfig::builder()
            .in_memory_database()
            .remote_client(Arc::new(NullRemote))
            .identity(Arc::new(StaticIdentity::signed_in("user-1")))
            .kv_store(Arc::new(MemoryKv::default()))
            .offline_files(Arc::new(NoOffline))
    }

    #[test]
    fn test_build_with_defaults() {
        let config = complete_builder().build().unwrap();

        assert!(config.is_in_memory());
        assert_eq!(config.cache, CacheSettings::default());
        assert_eq!(config.cache.prefix, "query-cache");
        assert_eq!(config.cache.max_age_ms, 3_600_000);
        assert_eq!(config.sync, SyncSettings::default());
        assert_eq!(config.event_buffer_size, 100);
        assert!(!config.features.enable_background_sync);
    }

    #[test]
    fn test_builder_requires_database_path() {
        let result = CoreConfig::builder()
            .remote_client(Arc::new(NullRemote))
            .identity(Arc::new(StaticIdentity::default()))
            .build();

        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Database path is required"));
    }

    #[test]
    fn test_builder_requires_remote_client() {
        let result = CoreConfig::builder()
            .in_memory_database()
            .identity(Arc::new(StaticIdentity::default()))
            .build();

        match result {
            Err(Error::CapabilityMissing { capability, .. }) => {
                assert_eq!(capability, "RemoteStoreClient")
            }
            other => panic!("expected CapabilityMissing, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_builder_requires_identity() {
        let result = CoreConfig::builder()
            .in_memory_database()
            .remote_client(Arc::new(NullRemote))
            .build();

        assert!(matches!(
            result,
            Err(Error::CapabilityMissing { ref capability, .. }) if capability == "IdentityProvider"
        ));
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[test]
    fn test_builder_requires_kv_store_without_shims() {
        let result = CoreConfig::builder()
            .in_memory_database()
            .remote_client(Arc::new(NullRemote))
            .identity(Arc::new(StaticIdentity::default()))
            .offline_files(Arc::new(NoOffline))
            .build();

        assert!(matches!(
            result,
            Err(Error::CapabilityMissing { ref capability, .. }) if capability == "KeyValueStore"
        ));
    }

    #[cfg(feature = "desktop-shims")]
    #[test]
    fn test_build_with_desktop_defaults() {
        let config = CoreConfig::builder()
            .in_memory_database()
            .remote_client(Arc::new(NullRemote))
            .identity(Arc::new(StaticIdentity::default()))
            .build()
            .expect("desktop defaults should succeed");

        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            config.kv_store.set("k", "v").await.unwrap();
            assert_eq!(config.kv_store.get("k").await.unwrap().as_deref(), Some("v"));
        });
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(complete_builder().cache_prefix("").build().is_err());
        assert!(complete_builder().cache_prefix("a:b").build().is_err());
        assert!(complete_builder().cache_max_age_ms(0).build().is_err());
        assert!(complete_builder().fetch_timeout_ms(0).build().is_err());
        assert!(complete_builder().event_buffer_size(0).build().is_err());
        assert!(complete_builder().media_base_url("not a url").build().is_err());
        assert!(complete_builder()
            .sync_settings(SyncSettings {
                retry_base_delay_ms: 20_000,
                ..SyncSettings::default()
            })
            .build()
            .is_err());
    }

    #[test]
    fn test_background_sync_needs_interval() {
        let result = complete_builder()
            .enable_background_sync(true)
            .sync_settings(SyncSettings {
                background_interval_secs: 0,
                ..SyncSettings::default()
            })
            .build();
        assert!(result.is_err());

        let config = complete_builder().enable_background_sync(true).build().unwrap();
        assert!(config.features.enable_background_sync);
    }

    #[test]
    fn test_media_base_url_accepted() {
        let config = complete_builder()
            .media_base_url("https://cdn.example.com/storage/")
            .build()
            .unwrap();
        assert_eq!(
            config.media_base_url.as_deref(),
            Some("https://cdn.example.com/storage/")
        );
    }

    #[test]
    fn test_debug_hides_bridges() {
        let config = complete_builder().build().unwrap();
        let debug = format!("{:?}", config);
        assert!(debug.contains("RemoteStoreClient { ... }"));
        assert!(debug.contains("query-cache"));
    }
}
