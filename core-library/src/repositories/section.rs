//! Section cache repository
//!
//! Ranked views (trending, recommendations, spotlight) are stored as ordered
//! id lists keyed by section name and resolved against `media_records` at
//! read time.

use crate::error::Result;
use crate::models::{SectionCacheEntry, SectionCacheRow};
use async_trait::async_trait;
use sqlx::{query, query_as, Sqlite, SqlitePool, Transaction};

#[async_trait]
pub trait SectionCacheRepository: Send + Sync {
    /// Stored entry for `key`, if any
    async fn get(&self, key: &str) -> Result<Option<SectionCacheEntry>>;

    /// All stored section keys
    async fn list_keys(&self) -> Result<Vec<String>>;

    /// Remove a section
    async fn delete(&self, key: &str) -> Result<bool>;
}

/// SQLite implementation of SectionCacheRepository
pub struct SqliteSectionCacheRepository {
    pool: SqlitePool,
}

impl SqliteSectionCacheRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Replace the whole entry for `entry.key` inside a sync transaction
    pub async fn replace(tx: &mut Transaction<'_, Sqlite>, entry: &SectionCacheEntry) -> Result<()> {
        let media_ids = serde_json::to_string(&entry.media_ids)?;

        query(
            r#"
            INSERT INTO section_cache (key, media_ids, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                media_ids = excluded.media_ids,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&entry.key)
        .bind(media_ids)
        .bind(entry.updated_at)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }
}

impl TryFrom<SectionCacheRow> for SectionCacheEntry {
    type Error = serde_json::Error;

    fn try_from(row: SectionCacheRow) -> std::result::Result<Self, Self::Error> {
        Ok(SectionCacheEntry {
            key: row.key,
            media_ids: serde_json::from_str(&row.media_ids)?,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl SectionCacheRepository for SqliteSectionCacheRepository {
    async fn get(&self, key: &str) -> Result<Option<SectionCacheEntry>> {
        let row = query_as::<_, SectionCacheRow>("SELECT * FROM section_cache WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(SectionCacheEntry::try_from).transpose()?)
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        let keys: Vec<(String,)> = query_as("SELECT key FROM section_cache ORDER BY key")
            .fetch_all(&self.pool)
            .await?;

        Ok(keys.into_iter().map(|(key,)| key).collect())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let result = query("DELETE FROM section_cache WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;
    use crate::error::LibraryError;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[tokio::test]
    async fn test_replace_overwrites_wholesale() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteSectionCacheRepository::new(pool.clone());

        let mut tx = pool.begin().await.unwrap();
        SqliteSectionCacheRepository::replace(
            &mut tx,
            &SectionCacheEntry::new("trend_day", ids(&["a", "b", "c"]), 1),
        )
        .await
        .unwrap();
        SqliteSectionCacheRepository::replace(
            &mut tx,
            &SectionCacheEntry::new("trend_day", ids(&["c", "a"]), 2),
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        let entry = repo.get("trend_day").await.unwrap().unwrap();
        assert_eq!(entry.media_ids, ids(&["c", "a"]));
        assert_eq!(entry.updated_at, 2);
        assert_eq!(repo.list_keys().await.unwrap(), vec!["trend_day"]);
    }

    #[tokio::test]
    async fn test_get_missing_and_delete() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteSectionCacheRepository::new(pool.clone());

        assert!(repo.get("spotlight").await.unwrap().is_none());
        assert!(!repo.delete("spotlight").await.unwrap());

        let mut tx = pool.begin().await.unwrap();
        SqliteSectionCacheRepository::replace(&mut tx, &SectionCacheEntry::new("spotlight", vec![], 1))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert!(repo.delete("spotlight").await.unwrap());
    }

    #[tokio::test]
    async fn test_malformed_ids_column_is_an_error() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteSectionCacheRepository::new(pool.clone());

        sqlx::query("INSERT INTO section_cache (key, media_ids, updated_at) VALUES ('bad', 'not json', 1)")
            .execute(&pool)
            .await
            .unwrap();

        assert!(matches!(
            repo.get("bad").await,
            Err(LibraryError::Serialization(_))
        ));
    }
}
