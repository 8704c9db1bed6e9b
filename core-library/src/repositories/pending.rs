//! Pending reconciliation markers
//!
//! An optimistic writer that updates the local mirror before the remote
//! store confirms records a marker here. The next successful sync of the same
//! domain and scope replaces local state with remote truth and resolves every
//! marker for that slice.

use crate::error::Result;
use crate::models::PendingReconciliation;
use async_trait::async_trait;
use sqlx::{query, query_as, Sqlite, SqlitePool, Transaction};
use tracing::debug;

#[async_trait]
pub trait PendingReconciliationRepository: Send + Sync {
    /// Record that `entity_id` in the domain/scope slice awaits confirmation
    ///
    /// Marking the same entity twice keeps the first marker.
    async fn mark(
        &self,
        domain: &str,
        scope: &str,
        entity_id: &str,
        reason: &str,
        created_at: i64,
    ) -> Result<()>;

    /// Outstanding markers for a slice, oldest first
    async fn list(&self, domain: &str, scope: &str) -> Result<Vec<PendingReconciliation>>;

    /// Outstanding markers across all slices
    async fn count(&self) -> Result<i64>;
}

/// SQLite implementation of PendingReconciliationRepository
pub struct SqlitePendingReconciliationRepository {
    pool: SqlitePool,
}

impl SqlitePendingReconciliationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Delete every marker for the slice inside a sync transaction
    pub async fn resolve(
        tx: &mut Transaction<'_, Sqlite>,
        domain: &str,
        scope: &str,
    ) -> Result<u64> {
        let resolved = query("DELETE FROM pending_reconciliation WHERE domain = ? AND scope = ?")
            .bind(domain)
            .bind(scope)
            .execute(&mut **tx)
            .await?
            .rows_affected();

        if resolved > 0 {
            debug!(domain, scope, resolved, "Resolved pending reconciliation markers");
        }
        Ok(resolved)
    }
}

#[async_trait]
impl PendingReconciliationRepository for SqlitePendingReconciliationRepository {
    async fn mark(
        &self,
        domain: &str,
        scope: &str,
        entity_id: &str,
        reason: &str,
        created_at: i64,
    ) -> Result<()> {
        query(
            r#"
            INSERT INTO pending_reconciliation (domain, scope, entity_id, reason, created_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(domain, scope, entity_id) DO NOTHING
            "#,
        )
        .bind(domain)
        .bind(scope)
        .bind(entity_id)
        .bind(reason)
        .bind(created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list(&self, domain: &str, scope: &str) -> Result<Vec<PendingReconciliation>> {
        let pending = query_as::<_, PendingReconciliation>(
            "SELECT * FROM pending_reconciliation WHERE domain = ? AND scope = ? ORDER BY created_at, id",
        )
        .bind(domain)
        .bind(scope)
        .fetch_all(&self.pool)
        .await?;

        Ok(pending)
    }

    async fn count(&self) -> Result<i64> {
        let (count,): (i64,) = query_as("SELECT COUNT(*) FROM pending_reconciliation")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;

    #[tokio::test]
    async fn test_mark_is_idempotent_and_resolve_is_scoped() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqlitePendingReconciliationRepository::new(pool.clone());

        repo.mark("likes", "u1", "s1", "like write unconfirmed", 10)
            .await
            .unwrap();
        repo.mark("likes", "u1", "s1", "retry", 20).await.unwrap();
        repo.mark("likes", "u2", "s1", "like write unconfirmed", 30)
            .await
            .unwrap();

        let pending = repo.list("likes", "u1").await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].reason, "like write unconfirmed");
        assert_eq!(repo.count().await.unwrap(), 2);

        let mut tx = pool.begin().await.unwrap();
        let resolved = SqlitePendingReconciliationRepository::resolve(&mut tx, "likes", "u1")
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(resolved, 1);
        assert!(repo.list("likes", "u1").await.unwrap().is_empty());
        assert_eq!(repo.list("likes", "u2").await.unwrap().len(), 1);
    }
}
