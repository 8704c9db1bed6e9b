//! # Snapshot Reconciliation
//!
//! Decodes remote rows into mirror records and applies a decoded snapshot to
//! the local database inside a caller-owned transaction.
//!
//! Remote rows are snake_case JSON objects. Unknown fields are ignored and
//! missing optional fields become NULL. `created_at` is accepted either as an
//! RFC 3339 string or as epoch milliseconds.

use crate::domain::{DomainKind, SyncDomain};
use bridge_traits::remote::RemoteRow;
use chrono::{DateTime, NaiveDateTime};
use core_library::models::{LikeRecord, MediaRecord, PlaylistRecord, SectionCacheEntry};
use core_library::repositories::{
    SqliteLikeRepository, SqliteMediaRepository, SqlitePendingReconciliationRepository,
    SqlitePlaylistRepository, SqliteSectionCacheRepository,
};
use serde::Deserialize;
use sqlx::{Sqlite, Transaction};
use std::collections::HashSet;
use tracing::debug;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Millis(i64),
    Fractional(f64),
    Text(String),
}

impl RawTimestamp {
    fn to_millis(&self) -> Result<i64, String> {
        match self {
            RawTimestamp::Millis(ms) => Ok(*ms),
            RawTimestamp::Fractional(ms) => Ok(ms.round() as i64),
            RawTimestamp::Text(text) => parse_timestamp_text(text),
        }
    }
}

fn parse_timestamp_text(text: &str) -> Result<i64, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.timestamp_millis());
    }
    // Postgres style: "2024-05-01 10:00:00.123+00"
    if let Ok(dt) = DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Ok(dt.timestamp_millis());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(naive.and_utc().timestamp_millis());
    }
    if let Ok(ms) = text.parse::<i64>() {
        return Ok(ms);
    }
    Err(format!("unrecognised timestamp '{}'", text))
}

fn timestamp_or(raw: &Option<RawTimestamp>, fallback: i64) -> Result<i64, String> {
    match raw {
        Some(raw) => raw.to_millis(),
        None => Ok(fallback),
    }
}

/// Owner of a row in the slice `scope`. A row naming another user is
/// rejected so it cannot land outside the slice this sync prunes. An empty
/// scope accepts any owner.
fn scoped_owner(user_id: Option<String>, scope: &str) -> Result<String, String> {
    match user_id {
        id if scope.is_empty() => Ok(id.unwrap_or_default()),
        None => Ok(scope.to_string()),
        Some(id) if id == scope => Ok(id),
        Some(_) => Err("user_id belongs to another scope".to_string()),
    }
}

#[derive(Debug, Deserialize)]
struct RemoteSong {
    id: String,
    user_id: Option<String>,
    title: Option<String>,
    author: Option<String>,
    song_path: Option<String>,
    image_path: Option<String>,
    lyrics: Option<String>,
    genre: Option<String>,
    play_count: Option<i64>,
    like_count: Option<i64>,
    created_at: Option<RawTimestamp>,
}

impl RemoteSong {
    /// `owner_scope` is the catalog owner filter; empty for unscoped reads.
    fn into_record(self, owner_scope: &str, synced_at: i64) -> Result<MediaRecord, String> {
        let created_at = timestamp_or(&self.created_at, synced_at)?;
        Ok(MediaRecord {
            id: self.id,
            owner_id: scoped_owner(self.user_id, owner_scope)?,
            title: self.title.unwrap_or_default(),
            author: self.author.unwrap_or_default(),
            media_path: self.song_path.unwrap_or_default(),
            artwork_path: self.image_path.unwrap_or_default(),
            local_media_path: None,
            local_artwork_path: None,
            lyrics: self.lyrics,
            genre: self.genre,
            play_count: self.play_count.unwrap_or(0),
            like_count: self.like_count.unwrap_or(0),
            created_at,
            synced_at,
        })
    }
}

#[derive(Debug, Deserialize)]
struct RemotePlaylist {
    id: String,
    user_id: Option<String>,
    title: Option<String>,
    is_public: Option<bool>,
    image_path: Option<String>,
    created_at: Option<RawTimestamp>,
}

impl RemotePlaylist {
    fn into_record(self, scope: &str, synced_at: i64) -> Result<PlaylistRecord, String> {
        let created_at = timestamp_or(&self.created_at, synced_at)?;
        Ok(PlaylistRecord {
            id: self.id,
            owner_id: scoped_owner(self.user_id, scope)?,
            title: self.title.unwrap_or_default(),
            is_public: self.is_public.unwrap_or(false),
            artwork_path: self.image_path,
            created_at,
            synced_at,
        })
    }
}

#[derive(Debug, Deserialize)]
struct RemoteLike {
    user_id: Option<String>,
    song_id: String,
    created_at: Option<RawTimestamp>,
}

impl RemoteLike {
    fn into_record(self, scope: &str, synced_at: i64) -> Result<LikeRecord, String> {
        let liked_at = timestamp_or(&self.created_at, synced_at)?;
        Ok(LikeRecord {
            user_id: scoped_owner(self.user_id, scope)?,
            media_id: self.song_id,
            liked_at,
            synced_at,
        })
    }
}

/// A fully decoded remote snapshot
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Snapshot {
    Media(Vec<MediaRecord>),
    Playlists(Vec<PlaylistRecord>),
    Likes(Vec<LikeRecord>),
}

impl Snapshot {
    pub fn len(&self) -> usize {
        match self {
            Snapshot::Media(records) => records.len(),
            Snapshot::Playlists(records) => records.len(),
            Snapshot::Likes(records) => records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn decode_rows<T, R>(
    rows: Vec<RemoteRow>,
    mut convert: impl FnMut(T) -> Result<R, String>,
) -> Result<Vec<R>, String>
where
    T: for<'de> Deserialize<'de>,
{
    rows.into_iter()
        .enumerate()
        .map(|(index, row)| {
            let parsed: T = serde_json::from_value(row)
                .map_err(|e| format!("row {}: {}", index, e))?;
            convert(parsed).map_err(|e| format!("row {}: {}", index, e))
        })
        .collect()
}

/// Decode remote rows for `domain`. Any malformed row fails the whole
/// snapshot.
pub(crate) fn decode_snapshot(
    domain: SyncDomain,
    scope: &str,
    rows: Vec<RemoteRow>,
    synced_at: i64,
) -> Result<Snapshot, String> {
    match domain {
        SyncDomain::Playlists => decode_rows(rows, |p: RemotePlaylist| {
            p.into_record(scope, synced_at)
        })
        .map(Snapshot::Playlists),
        SyncDomain::Likes => {
            decode_rows(rows, |l: RemoteLike| l.into_record(scope, synced_at)).map(Snapshot::Likes)
        }
        SyncDomain::Catalog => {
            decode_rows(rows, |s: RemoteSong| s.into_record(scope, synced_at)).map(Snapshot::Media)
        }
        SyncDomain::Recommendations | SyncDomain::Trending | SyncDomain::Spotlight => {
            decode_rows(rows, |s: RemoteSong| s.into_record("", synced_at)).map(Snapshot::Media)
        }
    }
}

/// Row counts produced by applying a snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ApplyStats {
    pub synced: u64,
    pub pruned: u64,
    pub resolved_pending: u64,
}

/// Apply `snapshot` to the local slice of `domain`/`scope`.
///
/// Mirror domains upsert every record and prune in-scope rows missing from
/// the snapshot. Derived domains upsert records and replace the section entry
/// with the snapshot's ids in remote order. Pending markers for the slice are
/// resolved in both cases.
pub(crate) async fn apply_snapshot(
    tx: &mut Transaction<'_, Sqlite>,
    domain: SyncDomain,
    scope: &str,
    snapshot: &Snapshot,
    synced_at: i64,
) -> core_library::Result<ApplyStats> {
    let mut stats = ApplyStats {
        synced: snapshot.len() as u64,
        ..Default::default()
    };

    match (domain.kind(), snapshot) {
        (DomainKind::Mirror, Snapshot::Media(records)) => {
            for record in records {
                SqliteMediaRepository::upsert(tx, record).await?;
            }
            let keep: HashSet<String> = records.iter().map(|r| r.id.clone()).collect();
            let owner = (!scope.is_empty()).then_some(scope);
            stats.pruned = SqliteMediaRepository::delete_missing(tx, owner, &keep).await?;
        }
        (DomainKind::Mirror, Snapshot::Playlists(records)) => {
            for record in records {
                SqlitePlaylistRepository::upsert(tx, record).await?;
            }
            let keep: HashSet<String> = records.iter().map(|r| r.id.clone()).collect();
            stats.pruned = SqlitePlaylistRepository::delete_missing(tx, scope, &keep).await?;
        }
        (DomainKind::Mirror, Snapshot::Likes(records)) => {
            for record in records {
                SqliteLikeRepository::upsert(tx, record).await?;
            }
            let keep: HashSet<String> = records.iter().map(|r| r.media_id.clone()).collect();
            stats.pruned = SqliteLikeRepository::delete_missing(tx, scope, &keep).await?;
        }
        (DomainKind::Derived, Snapshot::Media(records)) => {
            let mut seen = HashSet::new();
            let mut ordered_ids = Vec::with_capacity(records.len());
            for record in records {
                SqliteMediaRepository::upsert(tx, record).await?;
                if seen.insert(record.id.as_str()) {
                    ordered_ids.push(record.id.clone());
                }
            }
            if let Some(key) = domain.section_key(scope) {
                let entry = SectionCacheEntry::new(key, ordered_ids, synced_at);
                SqliteSectionCacheRepository::replace(tx, &entry).await?;
            }
        }
        (kind, _) => {
            return Err(core_library::LibraryError::InvalidInput {
                field: "snapshot".to_string(),
                message: format!("{:?} snapshot does not match {} domain", kind, domain),
            });
        }
    }

    stats.resolved_pending =
        SqlitePendingReconciliationRepository::resolve(tx, domain.as_str(), scope).await?;

    debug!(
        domain = %domain,
        scope,
        synced = stats.synced,
        pruned = stats.pruned,
        "Applied remote snapshot"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_song_with_defaults() {
        let rows = vec![json!({
            "id": "s1",
            "user_id": "u1",
            "title": "Song",
            "author": "Artist",
            "song_path": "songs/s1.mp3",
            "image_path": "images/s1.jpg",
            "created_at": "2024-05-01T10:00:00Z",
            "unknown_column": true
        })];

        let Snapshot::Media(records) = decode_snapshot(SyncDomain::Catalog, "", rows, 99).unwrap()
        else {
            panic!("expected media snapshot");
        };
        let record = &records[0];
        assert_eq!(record.media_path, "songs/s1.mp3");
        assert_eq!(record.play_count, 0);
        assert_eq!(record.lyrics, None);
        assert_eq!(record.created_at, 1_714_557_600_000);
        assert_eq!(record.synced_at, 99);
    }

    #[test]
    fn test_timestamp_formats() {
        assert_eq!(parse_timestamp_text("2024-05-01T10:00:00Z").unwrap(), 1_714_557_600_000);
        assert_eq!(
            parse_timestamp_text("2024-05-01T10:00:00.500+00:00").unwrap(),
            1_714_557_600_500
        );
        assert_eq!(
            parse_timestamp_text("2024-05-01 10:00:00+00").unwrap(),
            1_714_557_600_000
        );
        assert_eq!(parse_timestamp_text("1714557600000").unwrap(), 1_714_557_600_000);
        assert!(parse_timestamp_text("yesterday").is_err());
    }

    #[test]
    fn test_numeric_created_at() {
        let rows = vec![json!({ "user_id": "u1", "song_id": "s1", "created_at": 1_714_557_600_000i64 })];
        let Snapshot::Likes(likes) = decode_snapshot(SyncDomain::Likes, "u1", rows, 1).unwrap()
        else {
            panic!("expected likes snapshot");
        };
        assert_eq!(likes[0].liked_at, 1_714_557_600_000);
    }

    #[test]
    fn test_malformed_row_fails_snapshot() {
        let rows = vec![json!({ "id": "s1" }), json!({ "title": "no id" })];
        let err = decode_snapshot(SyncDomain::Catalog, "", rows, 1).unwrap_err();
        assert!(err.starts_with("row 1"));
    }

    #[test]
    fn test_playlist_owner_defaults_to_scope() {
        let rows = vec![json!({ "id": "p1", "title": "Mix" })];
        let Snapshot::Playlists(playlists) =
            decode_snapshot(SyncDomain::Playlists, "u1", rows, 1).unwrap()
        else {
            panic!("expected playlist snapshot");
        };
        assert_eq!(playlists[0].owner_id, "u1");
        assert!(!playlists[0].is_public);
    }

    #[test]
    fn test_rows_outside_user_scope_are_rejected() {
        let likes = vec![
            json!({ "user_id": "u1", "song_id": "s1" }),
            json!({ "user_id": "u2", "song_id": "s2" }),
        ];
        let err = decode_snapshot(SyncDomain::Likes, "u1", likes, 1).unwrap_err();
        assert!(err.starts_with("row 1"));

        let playlists = vec![json!({ "id": "p1", "user_id": "u2" })];
        assert!(decode_snapshot(SyncDomain::Playlists, "u1", playlists, 1).is_err());

        let songs = vec![json!({ "id": "s1", "user_id": "u2" })];
        assert!(decode_snapshot(SyncDomain::Catalog, "u1", songs.clone(), 1).is_err());
        assert!(decode_snapshot(SyncDomain::Catalog, "", songs, 1).is_ok());
    }
}
