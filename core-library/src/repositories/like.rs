//! Like repository trait and implementation

use crate::error::{LibraryError, Result};
use crate::models::LikeRecord;
use async_trait::async_trait;
use sqlx::{query, query_as, Sqlite, SqlitePool, Transaction};
use std::collections::HashSet;

#[async_trait]
pub trait LikeRepository: Send + Sync {
    /// Likes of `user_id`, most recent first
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<LikeRecord>>;

    /// Whether `user_id` likes `media_id`
    async fn is_liked(&self, user_id: &str, media_id: &str) -> Result<bool>;

    /// Number of likes recorded for `user_id`
    async fn count_for_user(&self, user_id: &str) -> Result<i64>;
}

/// SQLite implementation of LikeRepository
pub struct SqliteLikeRepository {
    pool: SqlitePool,
}

impl SqliteLikeRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or update a like inside a sync transaction
    pub async fn upsert(tx: &mut Transaction<'_, Sqlite>, like: &LikeRecord) -> Result<()> {
        like.validate().map_err(|e| LibraryError::InvalidInput {
            field: "LikeRecord".to_string(),
            message: e,
        })?;

        query(
            r#"
            INSERT INTO likes (user_id, media_id, liked_at, synced_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(user_id, media_id) DO UPDATE SET
                liked_at = excluded.liked_at,
                synced_at = excluded.synced_at
            "#,
        )
        .bind(&like.user_id)
        .bind(&like.media_id)
        .bind(like.liked_at)
        .bind(like.synced_at)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Delete the user's likes for media ids not in `keep_media_ids`
    pub async fn delete_missing(
        tx: &mut Transaction<'_, Sqlite>,
        user_id: &str,
        keep_media_ids: &HashSet<String>,
    ) -> Result<u64> {
        let existing: Vec<(String,)> = query_as("SELECT media_id FROM likes WHERE user_id = ?")
            .bind(user_id)
            .fetch_all(&mut **tx)
            .await?;

        let mut deleted = 0;
        for (media_id,) in existing {
            if keep_media_ids.contains(&media_id) {
                continue;
            }
            deleted += query("DELETE FROM likes WHERE user_id = ? AND media_id = ?")
                .bind(user_id)
                .bind(&media_id)
                .execute(&mut **tx)
                .await?
                .rows_affected();
        }

        Ok(deleted)
    }
}

#[async_trait]
impl LikeRepository for SqliteLikeRepository {
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<LikeRecord>> {
        let likes = query_as::<_, LikeRecord>(
            "SELECT * FROM likes WHERE user_id = ? ORDER BY liked_at DESC, media_id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(likes)
    }

    async fn is_liked(&self, user_id: &str, media_id: &str) -> Result<bool> {
        let row: Option<(i64,)> =
            query_as("SELECT 1 FROM likes WHERE user_id = ? AND media_id = ?")
                .bind(user_id)
                .bind(media_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.is_some())
    }

    async fn count_for_user(&self, user_id: &str) -> Result<i64> {
        let (count,): (i64,) = query_as("SELECT COUNT(*) FROM likes WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;

    fn like(user: &str, media: &str, liked_at: i64) -> LikeRecord {
        LikeRecord {
            user_id: user.to_string(),
            media_id: media.to_string(),
            liked_at,
            synced_at: 1,
        }
    }

    #[tokio::test]
    async fn test_like_is_unique_per_user_and_media() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteLikeRepository::new(pool.clone());

        let mut tx = pool.begin().await.unwrap();
        SqliteLikeRepository::upsert(&mut tx, &like("u1", "s1", 1)).await.unwrap();
        SqliteLikeRepository::upsert(&mut tx, &like("u1", "s1", 5)).await.unwrap();
        SqliteLikeRepository::upsert(&mut tx, &like("u2", "s1", 2)).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(repo.count_for_user("u1").await.unwrap(), 1);
        assert_eq!(repo.list_for_user("u1").await.unwrap()[0].liked_at, 5);
        assert!(repo.is_liked("u2", "s1").await.unwrap());
        assert!(!repo.is_liked("u2", "s2").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_missing_prunes_only_that_user() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteLikeRepository::new(pool.clone());

        let mut tx = pool.begin().await.unwrap();
        for l in [like("u1", "a", 1), like("u1", "b", 2), like("u2", "b", 3)] {
            SqliteLikeRepository::upsert(&mut tx, &l).await.unwrap();
        }
        let keep: HashSet<String> = ["a".to_string()].into_iter().collect();
        let deleted = SqliteLikeRepository::delete_missing(&mut tx, "u1", &keep)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(deleted, 1);
        assert!(!repo.is_liked("u1", "b").await.unwrap());
        assert!(repo.is_liked("u2", "b").await.unwrap());
    }
}
