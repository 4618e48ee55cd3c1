use crate::application::ports::ChangeTracker;
use crate::domain::entities::{ChangeRecord, NewChange};
use crate::shared::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, QueryBuilder, Sqlite};

/// Change queue backed by the `change_log` table. Shares the database with
/// the replica store so a local edit and its change entry commit atomically.
pub struct SqliteChangeTracker {
    pool: Pool<Sqlite>,
}

impl SqliteChangeTracker {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }
}

/// Inserts one pending change. Generic over the executor so the replica store
/// can call it inside the transaction that writes the record row.
pub(crate) async fn insert_change<'e, E>(
    executor: E,
    change: &NewChange,
    created_at: DateTime<Utc>,
) -> Result<i64>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let payload = serde_json::to_string(&change.payload)?;
    let result = sqlx::query(
        r#"
        INSERT INTO change_log (
            entity_type, entity_id, op, payload, updated_at, origin,
            sync_status, attempts, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'pending', 0, ?7)
        "#,
    )
    .bind(change.entity_type.as_str())
    .bind(change.entity_id.to_string())
    .bind(change.op.as_str())
    .bind(payload)
    .bind(change.updated_at.timestamp_millis())
    .bind(change.origin.to_string())
    .bind(created_at.timestamp_millis())
    .execute(executor)
    .await?;

    Ok(result.last_insert_rowid())
}

#[async_trait]
impl ChangeTracker for SqliteChangeTracker {
    async fn enqueue(&self, change: NewChange) -> Result<i64> {
        insert_change(&self.pool, &change, Utc::now()).await
    }

    async fn pending_batch(&self, max: u32) -> Result<Vec<ChangeRecord>> {
        let rows = sqlx::query_as::<_, super::rows::ChangeRow>(
            r#"
            SELECT * FROM change_log
            WHERE sync_status IN ('pending', 'failed')
            ORDER BY updated_at ASC, entity_id ASC
            LIMIT ?1
            "#,
        )
        .bind(max as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ChangeRecord::try_from).collect()
    }

    async fn mark_syncing(&self, ids: &[i64]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let mut qb = QueryBuilder::new("UPDATE change_log SET sync_status = 'syncing' WHERE id IN (");
        let mut separated = qb.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        qb.push(")");
        qb.build().execute(&self.pool).await?;
        Ok(())
    }

    async fn mark_synced(&self, ids: &[i64]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let now = Utc::now().timestamp_millis();
        let mut qb = QueryBuilder::new(
            "UPDATE change_log SET sync_status = 'synced', error_message = NULL, synced_at = ",
        );
        qb.push_bind(now);
        qb.push(" WHERE id IN (");
        let mut separated = qb.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        qb.push(")");
        qb.build().execute(&self.pool).await?;
        Ok(())
    }

    async fn mark_failed(&self, ids: &[i64], error: Option<&str>) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let mut qb = QueryBuilder::new(
            "UPDATE change_log SET sync_status = 'failed', attempts = attempts + 1, error_message = ",
        );
        qb.push_bind(error);
        qb.push(" WHERE id IN (");
        let mut separated = qb.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        qb.push(")");
        qb.build().execute(&self.pool).await?;
        Ok(())
    }

    async fn pending_count(&self) -> Result<u64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM change_log WHERE sync_status != 'synced'")
                .fetch_one(&self.pool)
                .await?;
        Ok(count.max(0) as u64)
    }

    async fn compact_synced(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM change_log WHERE sync_status = 'synced'")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
