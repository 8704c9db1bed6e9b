//! # Track Resolver
//!
//! Turns a [`MediaRecord`] into something the player can open: a local file
//! when one has been downloaded, otherwise a remote URL built from the
//! record's canonical storage path.
//!
//! Resolution never fails. Offline-store errors are logged and treated as
//! "not cached".

use crate::error::{PlaybackError, Result};
use bridge_traits::storage::OfflineFileStore;
use core_library::models::MediaRecord;
use core_runtime::logging::strip_path;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use url::Url;

/// Builds playable URLs from canonical storage paths
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaUrlBuilder {
    base: Option<Url>,
}

impl MediaUrlBuilder {
    /// Builder rooted at `base`. Without a base only absolute URLs resolve.
    ///
    /// # Errors
    /// `InvalidBaseUrl` if `base` is not an absolute URL.
    pub fn new(base: Option<&str>) -> Result<Self> {
        let base = match base.map(str::trim).filter(|b| !b.is_empty()) {
            None => None,
            Some(raw) => {
                // Url::join replaces the last segment unless the base ends in '/'.
                let normalized = if raw.ends_with('/') {
                    raw.to_string()
                } else {
                    format!("{}/", raw)
                };
                let url = Url::parse(&normalized).map_err(|e| PlaybackError::InvalidBaseUrl {
                    url: raw.to_string(),
                    reason: e.to_string(),
                })?;
                if url.cannot_be_a_base() {
                    return Err(PlaybackError::InvalidBaseUrl {
                        url: raw.to_string(),
                        reason: "cannot be used as a base".to_string(),
                    });
                }
                Some(url)
            }
        };
        Ok(Self { base })
    }

    pub fn base(&self) -> Option<&Url> {
        self.base.as_ref()
    }

    /// URL for a stored path, or `None` for an empty path or missing base.
    pub fn url_for(&self, path: &str) -> Option<String> {
        let path = path.trim();
        if path.is_empty() {
            return None;
        }
        if let Ok(absolute) = Url::parse(path) {
            if matches!(absolute.scheme(), "http" | "https") {
                return Some(path.to_string());
            }
        }
        let base = self.base.as_ref()?;
        base.join(path.trim_start_matches('/'))
            .ok()
            .map(String::from)
    }
}

/// Where a track should be played from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayableRef {
    Local {
        path: PathBuf,
        /// Remote URL to fall back to if the local file cannot be opened
        fallback_url: Option<String>,
        record: MediaRecord,
    },
    Remote {
        /// `None` when the record has no usable remote path
        url: Option<String>,
        record: MediaRecord,
    },
}

impl PlayableRef {
    pub fn record(&self) -> &MediaRecord {
        match self {
            PlayableRef::Local { record, .. } | PlayableRef::Remote { record, .. } => record,
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, PlayableRef::Local { .. })
    }

    /// String form the player can open: a filesystem path or a URL.
    pub fn uri(&self) -> Option<String> {
        match self {
            PlayableRef::Local { path, .. } => Some(path.to_string_lossy().into_owned()),
            PlayableRef::Remote { url, .. } => url.clone(),
        }
    }
}

pub struct TrackResolver {
    offline: Arc<dyn OfflineFileStore>,
    urls: MediaUrlBuilder,
}

impl TrackResolver {
    pub fn new(offline: Arc<dyn OfflineFileStore>, urls: MediaUrlBuilder) -> Self {
        Self { offline, urls }
    }

    pub fn url_builder(&self) -> &MediaUrlBuilder {
        &self.urls
    }

    /// Resolve a record to a local file or remote URL.
    ///
    /// Lookup order: the offline store, then the record's own
    /// `local_media_path` if that file still exists, then the remote URL.
    #[instrument(skip(self, record), fields(media_id = %record.id))]
    pub async fn resolve(&self, record: &MediaRecord) -> PlayableRef {
        let fallback_url = self.urls.url_for(&record.media_path);

        let offline = match self.offline.local_path(&record.id).await {
            Ok(path) => path,
            Err(e) => {
                warn!(error = %e, "Offline store lookup failed; using remote");
                None
            }
        };

        let local = match offline {
            Some(path) => Some(path),
            None => match record.local_media_path.as_deref() {
                Some(path) if file_exists(Path::new(path)).await => Some(PathBuf::from(path)),
                _ => None,
            },
        };

        match local {
            Some(path) => {
                debug!(file = %strip_path(&path.to_string_lossy()), "Resolved to local file");
                PlayableRef::Local {
                    path,
                    fallback_url,
                    record: record.clone(),
                }
            }
            None => {
                if fallback_url.is_none() {
                    warn!("Record has no playable location");
                } else {
                    debug!("Resolved to remote URL");
                }
                PlayableRef::Remote {
                    url: fallback_url,
                    record: record.clone(),
                }
            }
        }
    }

    /// Artwork location: a `file://` URL for a downloaded copy, otherwise the
    /// remote URL.
    pub async fn artwork_url(&self, record: &MediaRecord) -> Option<String> {
        if let Some(local) = record.local_artwork_path.as_deref() {
            let path = Path::new(local);
            if path.is_absolute() && file_exists(path).await {
                if let Ok(url) = Url::from_file_path(path) {
                    return Some(url.into());
                }
            }
        }
        self.urls.url_for(&record.artwork_path)
    }
}

async fn file_exists(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}
