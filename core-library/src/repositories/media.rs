//! Media repository trait and implementation

use crate::error::{LibraryError, Result};
use crate::models::MediaRecord;
use async_trait::async_trait;
use sqlx::{query, query_as, Sqlite, SqlitePool, Transaction};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Read access to mirrored media plus the device-local path columns
#[async_trait]
pub trait MediaRepository: Send + Sync {
    /// Find a media record by its ID
    async fn find_by_id(&self, id: &str) -> Result<Option<MediaRecord>>;

    /// Fetch records for `ids`, preserving the order of `ids`
    ///
    /// Ids with no local record are skipped.
    async fn find_by_ids_ordered(&self, ids: &[String]) -> Result<Vec<MediaRecord>>;

    /// All records, newest first
    async fn list_all(&self) -> Result<Vec<MediaRecord>>;

    /// Records uploaded by `owner_id`, newest first
    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<MediaRecord>>;

    /// Record where the download collaborator stored local copies
    ///
    /// # Errors
    /// Returns `NotFound` if the record does not exist.
    async fn set_local_paths(
        &self,
        id: &str,
        local_media_path: Option<&str>,
        local_artwork_path: Option<&str>,
    ) -> Result<()>;

    /// Count total records
    async fn count(&self) -> Result<i64>;
}

/// SQLite implementation of MediaRepository
pub struct SqliteMediaRepository {
    pool: SqlitePool,
}

impl SqliteMediaRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or update a record inside a sync transaction
    ///
    /// Remote fields are replaced wholesale, except that a non-empty canonical
    /// path already stored is kept. Local path columns are never touched.
    pub async fn upsert(tx: &mut Transaction<'_, Sqlite>, record: &MediaRecord) -> Result<()> {
        record.validate().map_err(|e| LibraryError::InvalidInput {
            field: "MediaRecord".to_string(),
            message: e,
        })?;

        query(
            r#"
            INSERT INTO media_records (
                id, owner_id, title, author, media_path, artwork_path,
                lyrics, genre, play_count, like_count, created_at, synced_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                owner_id = excluded.owner_id,
                title = excluded.title,
                author = excluded.author,
                media_path = CASE
                    WHEN media_records.media_path <> '' THEN media_records.media_path
                    ELSE excluded.media_path
                END,
                artwork_path = CASE
                    WHEN media_records.artwork_path <> '' THEN media_records.artwork_path
                    ELSE excluded.artwork_path
                END,
                lyrics = excluded.lyrics,
                genre = excluded.genre,
                play_count = excluded.play_count,
                like_count = excluded.like_count,
                created_at = excluded.created_at,
                synced_at = excluded.synced_at
            "#,
        )
        .bind(&record.id)
        .bind(&record.owner_id)
        .bind(&record.title)
        .bind(&record.author)
        .bind(&record.media_path)
        .bind(&record.artwork_path)
        .bind(&record.lyrics)
        .bind(&record.genre)
        .bind(record.play_count)
        .bind(record.like_count)
        .bind(record.created_at)
        .bind(record.synced_at)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Delete records in scope whose id is not in `keep_ids`
    ///
    /// `owner_id = None` scopes to the whole table. Returns the number of
    /// rows deleted.
    pub async fn delete_missing(
        tx: &mut Transaction<'_, Sqlite>,
        owner_id: Option<&str>,
        keep_ids: &HashSet<String>,
    ) -> Result<u64> {
        let existing: Vec<(String,)> = match owner_id {
            Some(owner) => {
                query_as("SELECT id FROM media_records WHERE owner_id = ?")
                    .bind(owner)
                    .fetch_all(&mut **tx)
                    .await?
            }
            None => {
                query_as("SELECT id FROM media_records")
                    .fetch_all(&mut **tx)
                    .await?
            }
        };

        let mut deleted = 0;
        for (id,) in existing {
            if keep_ids.contains(&id) {
                continue;
            }
            deleted += query("DELETE FROM media_records WHERE id = ?")
                .bind(&id)
                .execute(&mut **tx)
                .await?
                .rows_affected();
        }

        if deleted > 0 {
            debug!(owner_id = ?owner_id, deleted, "Pruned media records");
        }
        Ok(deleted)
    }
}

#[async_trait]
impl MediaRepository for SqliteMediaRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<MediaRecord>> {
        let record = query_as::<_, MediaRecord>("SELECT * FROM media_records WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record)
    }

    async fn find_by_ids_ordered(&self, ids: &[String]) -> Result<Vec<MediaRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT * FROM media_records WHERE id IN ({})",
            placeholders
        );

        let mut statement = query_as::<_, MediaRecord>(&sql);
        for id in ids {
            statement = statement.bind(id);
        }
        let rows = statement.fetch_all(&self.pool).await?;

        let mut by_id: HashMap<String, MediaRecord> =
            rows.into_iter().map(|r| (r.id.clone(), r)).collect();

        // Duplicate ids in the section resolve once
        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    async fn list_all(&self) -> Result<Vec<MediaRecord>> {
        let records = query_as::<_, MediaRecord>(
            "SELECT * FROM media_records ORDER BY created_at DESC, id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<MediaRecord>> {
        let records = query_as::<_, MediaRecord>(
            "SELECT * FROM media_records WHERE owner_id = ? ORDER BY created_at DESC, id",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn set_local_paths(
        &self,
        id: &str,
        local_media_path: Option<&str>,
        local_artwork_path: Option<&str>,
    ) -> Result<()> {
        let result = query(
            "UPDATE media_records SET local_media_path = ?, local_artwork_path = ? WHERE id = ?",
        )
        .bind(local_media_path)
        .bind(local_artwork_path)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LibraryError::NotFound {
                entity_type: "MediaRecord".to_string(),
                id: id.to_string(),
            });
        }

        Ok(())
    }

    async fn count(&self) -> Result<i64> {
        let (count,): (i64,) = query_as("SELECT COUNT(*) FROM media_records")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}
