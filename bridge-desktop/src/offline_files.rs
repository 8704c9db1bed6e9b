//! Offline media index backed by a directory

use async_trait::async_trait;
use bridge_traits::{error::Result, storage::OfflineFileStore};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

const DEFAULT_EXTENSIONS: &[&str] = &["mp3", "m4a", "aac", "flac", "ogg", "wav", "audio"];

/// Directory-backed offline file store
///
/// The download collaborator writes each media file as
/// `<cache_dir>/<media id>.<ext>`. Lookups only check existence; this type
/// never writes or removes files.
pub struct DirectoryOfflineFileStore {
    root: PathBuf,
    extensions: Vec<String>,
}

impl DirectoryOfflineFileStore {
    /// Store rooted at the platform cache directory
    pub fn new() -> Self {
        let root = dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("media-sync-core")
            .join("offline");
        Self::with_root(root)
    }

    /// Store rooted at a custom directory
    pub fn with_root(root: PathBuf) -> Self {
        Self {
            root,
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }

    /// Restrict the file extensions probed on lookup
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path a media file for `media_id` would have with the given extension
    pub fn file_path(&self, media_id: &str, extension: &str) -> PathBuf {
        self.root
            .join(format!("{}.{}", sanitize_file_component(media_id), extension))
    }
}

impl Default for DirectoryOfflineFileStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OfflineFileStore for DirectoryOfflineFileStore {
    async fn local_path(&self, media_id: &str) -> Result<Option<PathBuf>> {
        for extension in &self.extensions {
            let candidate = self.file_path(media_id, extension);
            match fs::metadata(&candidate).await {
                Ok(meta) if meta.is_file() && meta.len() > 0 => {
                    debug!(media_id, path = ?candidate, "Found offline copy");
                    return Ok(Some(candidate));
                }
                Ok(_) => continue,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(None)
    }
}

fn sanitize_file_component(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "unknown".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_file_component() {
        assert_eq!(sanitize_file_component("song-1"), "song-1");
        assert_eq!(sanitize_file_component("../etc/passwd"), "___etc_passwd");
        assert_eq!(sanitize_file_component(""), "unknown");
    }

    #[tokio::test]
    async fn test_lookup_finds_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryOfflineFileStore::with_root(dir.path().to_path_buf());

        let path = store.file_path("song-1", "mp3");
        tokio::fs::write(&path, b"audio").await.unwrap();

        assert_eq!(store.local_path("song-1").await.unwrap(), Some(path));
        assert_eq!(store.local_path("song-2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_empty_file_is_not_a_cached_copy() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryOfflineFileStore::with_root(dir.path().to_path_buf())
            .with_extensions(["mp3"]);

        tokio::fs::write(store.file_path("song-1", "mp3"), b"")
            .await
            .unwrap();

        assert_eq!(store.local_path("song-1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_missing_root_directory_reports_absent() {
        let store = DirectoryOfflineFileStore::with_root(PathBuf::from(
            "/nonexistent/media-sync-core/offline",
        ));
        assert_eq!(store.local_path("song-1").await.unwrap(), None);
    }
}
