//! Playlist repository trait and implementation

use crate::error::{LibraryError, Result};
use crate::models::PlaylistRecord;
use async_trait::async_trait;
use sqlx::{query, query_as, Sqlite, SqlitePool, Transaction};
use std::collections::HashSet;

/// Playlist repository interface for data access operations
#[async_trait]
pub trait PlaylistRepository: Send + Sync {
    /// Find a playlist by its ID
    async fn find_by_id(&self, id: &str) -> Result<Option<PlaylistRecord>>;

    /// Playlists owned by `owner_id`, newest first
    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<PlaylistRecord>>;

    /// Count total playlists
    async fn count(&self) -> Result<i64>;
}

/// SQLite implementation of PlaylistRepository
pub struct SqlitePlaylistRepository {
    pool: SqlitePool,
}

impl SqlitePlaylistRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or fully replace a playlist inside a sync transaction
    pub async fn upsert(tx: &mut Transaction<'_, Sqlite>, playlist: &PlaylistRecord) -> Result<()> {
        playlist
            .validate()
            .map_err(|e| LibraryError::InvalidInput {
                field: "PlaylistRecord".to_string(),
                message: e,
            })?;

        query(
            r#"
            INSERT INTO playlists (id, owner_id, title, is_public, artwork_path, created_at, synced_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                owner_id = excluded.owner_id,
                title = excluded.title,
                is_public = excluded.is_public,
                artwork_path = excluded.artwork_path,
                created_at = excluded.created_at,
                synced_at = excluded.synced_at
            "#,
        )
        .bind(&playlist.id)
        .bind(&playlist.owner_id)
        .bind(&playlist.title)
        .bind(playlist.is_public)
        .bind(&playlist.artwork_path)
        .bind(playlist.created_at)
        .bind(playlist.synced_at)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Delete the owner's playlists whose id is not in `keep_ids`
    pub async fn delete_missing(
        tx: &mut Transaction<'_, Sqlite>,
        owner_id: &str,
        keep_ids: &HashSet<String>,
    ) -> Result<u64> {
        let existing: Vec<(String,)> = query_as("SELECT id FROM playlists WHERE owner_id = ?")
            .bind(owner_id)
            .fetch_all(&mut **tx)
            .await?;

        let mut deleted = 0;
        for (id,) in existing.into_iter().filter(|(id,)| !keep_ids.contains(id)) {
            deleted += query("DELETE FROM playlists WHERE id = ?")
                .bind(&id)
                .execute(&mut **tx)
                .await?
                .rows_affected();
        }

        Ok(deleted)
    }
}

#[async_trait]
impl PlaylistRepository for SqlitePlaylistRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<PlaylistRecord>> {
        let playlist = query_as::<_, PlaylistRecord>("SELECT * FROM playlists WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(playlist)
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<PlaylistRecord>> {
        let playlists = query_as::<_, PlaylistRecord>(
            "SELECT * FROM playlists WHERE owner_id = ? ORDER BY created_at DESC, id",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(playlists)
    }

    async fn count(&self) -> Result<i64> {
        let (count,): (i64,) = query_as("SELECT COUNT(*) FROM playlists")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;

    fn playlist(id: &str, owner: &str, created_at: i64) -> PlaylistRecord {
        PlaylistRecord {
            id: id.to_string(),
            owner_id: owner.to_string(),
            title: format!("Playlist {}", id),
            is_public: false,
            artwork_path: None,
            created_at,
            synced_at: 1,
        }
    }

    #[tokio::test]
    async fn test_upsert_and_list() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqlitePlaylistRepository::new(pool.clone());

        let mut tx = pool.begin().await.unwrap();
        SqlitePlaylistRepository::upsert(&mut tx, &playlist("p1", "u1", 1))
            .await
            .unwrap();
        SqlitePlaylistRepository::upsert(&mut tx, &playlist("p2", "u1", 2))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let ids: Vec<String> = repo
            .list_by_owner("u1")
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec!["p2", "p1"]);
    }

    #[tokio::test]
    async fn test_upsert_replaces_optional_fields_with_null() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqlitePlaylistRepository::new(pool.clone());

        let mut first = playlist("p1", "u1", 1);
        first.artwork_path = Some("images/p1.jpg".to_string());
        first.is_public = true;

        let mut tx = pool.begin().await.unwrap();
        SqlitePlaylistRepository::upsert(&mut tx, &first).await.unwrap();
        SqlitePlaylistRepository::upsert(&mut tx, &playlist("p1", "u1", 1))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let found = repo.find_by_id("p1").await.unwrap().unwrap();
        assert_eq!(found.artwork_path, None);
        assert!(!found.is_public);
    }

    #[tokio::test]
    async fn test_delete_missing_only_touches_owner() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqlitePlaylistRepository::new(pool.clone());

        let mut tx = pool.begin().await.unwrap();
        for p in [playlist("p1", "u1", 1), playlist("p2", "u1", 2), playlist("p3", "u2", 3)] {
            SqlitePlaylistRepository::upsert(&mut tx, &p).await.unwrap();
        }
        let keep: HashSet<String> = ["p2".to_string()].into_iter().collect();
        let deleted = SqlitePlaylistRepository::delete_missing(&mut tx, "u1", &keep)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(deleted, 1);
        assert_eq!(repo.count().await.unwrap(), 2);
        assert!(repo.find_by_id("p1").await.unwrap().is_none());
    }
}
