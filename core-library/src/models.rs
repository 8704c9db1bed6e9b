//! Domain models for the local mirror
//!
//! Every struct maps onto one table created by the migrations in
//! `core-library/migrations`. Timestamps are Unix epoch milliseconds.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Scope value stored for records that are not scoped to a user.
pub const GLOBAL_SCOPE: &str = "";

/// A media item mirrored from the remote catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct MediaRecord {
    /// Remote identifier
    pub id: String,
    /// Uploading user
    pub owner_id: String,
    pub title: String,
    pub author: String,
    /// Canonical remote media path; never replaced once non-empty
    pub media_path: String,
    /// Canonical remote artwork path; never replaced once non-empty
    pub artwork_path: String,
    /// Device-local copy of the media, maintained by the download collaborator
    pub local_media_path: Option<String>,
    /// Device-local copy of the artwork
    pub local_artwork_path: Option<String>,
    pub lyrics: Option<String>,
    pub genre: Option<String>,
    pub play_count: i64,
    pub like_count: i64,
    pub created_at: i64,
    /// When the last sync wrote this row
    pub synced_at: i64,
}

impl MediaRecord {
    /// Minimal record with the required fields set; optional fields empty
    pub fn new(
        id: impl Into<String>,
        owner_id: impl Into<String>,
        title: impl Into<String>,
        author: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            owner_id: owner_id.into(),
            title: title.into(),
            author: author.into(),
            media_path: String::new(),
            artwork_path: String::new(),
            local_media_path: None,
            local_artwork_path: None,
            lyrics: None,
            genre: None,
            play_count: 0,
            like_count: 0,
            created_at: 0,
            synced_at: 0,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("Media id cannot be empty".to_string());
        }

        if self.play_count < 0 || self.like_count < 0 {
            return Err(format!("Media {} has a negative counter", self.id));
        }

        Ok(())
    }
}

/// A playlist mirrored from the remote store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct PlaylistRecord {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub is_public: bool,
    pub artwork_path: Option<String>,
    pub created_at: i64,
    pub synced_at: i64,
}

impl PlaylistRecord {
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("Playlist id cannot be empty".to_string());
        }

        if self.owner_id.trim().is_empty() {
            return Err(format!("Playlist {} has no owner", self.id));
        }

        Ok(())
    }
}

/// A user's like of a media item, unique per (user, media)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct LikeRecord {
    pub user_id: String,
    pub media_id: String,
    pub liked_at: i64,
    pub synced_at: i64,
}

impl LikeRecord {
    pub fn validate(&self) -> Result<(), String> {
        if self.user_id.trim().is_empty() || self.media_id.trim().is_empty() {
            return Err("Like requires both a user id and a media id".to_string());
        }
        Ok(())
    }
}

/// Ordered id list backing a ranked view such as `trend_day`
///
/// Always replaced wholesale. Ids point at `media_records` and are resolved at
/// read time; ids without a local record are skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionCacheEntry {
    pub key: String,
    pub media_ids: Vec<String>,
    pub updated_at: i64,
}

impl SectionCacheEntry {
    pub fn new(key: impl Into<String>, media_ids: Vec<String>, updated_at: i64) -> Self {
        Self {
            key: key.into(),
            media_ids,
            updated_at,
        }
    }
}

/// Storage shape of a section; ids are a JSON array in a TEXT column
#[derive(Debug, Clone, FromRow)]
pub(crate) struct SectionCacheRow {
    pub key: String,
    pub media_ids: String,
    pub updated_at: i64,
}

/// Local write that has not been confirmed by the remote store yet
///
/// Recorded by optimistic writers; the next successful sync of the same
/// domain and scope resolves it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct PendingReconciliation {
    pub id: i64,
    pub domain: String,
    /// [`GLOBAL_SCOPE`] when the domain is not user-scoped
    pub scope: String,
    pub entity_id: String,
    pub reason: String,
    pub created_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_record_validation() {
        let record = MediaRecord::new("song-1", "user-1", "Title", "Author");
        assert!(record.validate().is_ok());

        let mut missing_id = record.clone();
        missing_id.id = "  ".to_string();
        assert!(missing_id.validate().is_err());

        let mut negative = record;
        negative.play_count = -1;
        assert!(negative.validate().is_err());
    }

    #[test]
    fn test_like_record_validation() {
        let like = LikeRecord {
            user_id: "user-1".to_string(),
            media_id: String::new(),
            liked_at: 0,
            synced_at: 0,
        };
        assert!(like.validate().is_err());
    }

    #[test]
    fn test_playlist_record_validation() {
        let playlist = PlaylistRecord {
            id: "pl-1".to_string(),
            owner_id: String::new(),
            title: "Mix".to_string(),
            is_public: false,
            artwork_path: None,
            created_at: 0,
            synced_at: 0,
        };
        assert!(playlist.validate().is_err());
    }
}
