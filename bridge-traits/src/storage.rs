//! Storage Abstractions
//!
//! Device-local persistence capabilities the core depends on: a plain
//! string key-value store used by the TTL cache, and an index of media files
//! already downloaded for offline playback.

use async_trait::async_trait;
use std::path::PathBuf;

use crate::error::Result;

/// Key-value storage trait
///
/// Backed by:
/// - **iOS**: UserDefaults / MMKV
/// - **Android**: SharedPreferences / MMKV
/// - **Desktop**: SQLite table
///
/// Values are opaque strings; callers serialize their own payloads.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::KeyValueStore;
///
/// async fn remember(store: &dyn KeyValueStore) -> Result<()> {
///     store.set("query-cache:catalog", "{\"data\":[],\"timestamp\":0}").await?;
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Retrieve a value
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store a value, replacing any previous one
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Delete a value; deleting a missing key is not an error
    async fn delete(&self, key: &str) -> Result<()>;

    /// List all stored keys
    async fn list_keys(&self) -> Result<Vec<String>>;
}

/// Offline media index
///
/// Answers whether a media item has a locally downloaded copy. The core never
/// downloads or writes files itself; it only asks where a cached file lives.
#[async_trait]
pub trait OfflineFileStore: Send + Sync {
    /// Path of the locally cached media file, if one exists
    async fn local_path(&self, media_id: &str) -> Result<Option<PathBuf>>;
}
