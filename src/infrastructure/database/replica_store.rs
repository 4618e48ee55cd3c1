use crate::application::ports::replica_store::{ChangeEvent, RecordFilter, ReplicaStore};
use crate::domain::conflict::{self, Winner};
use crate::domain::entities::{NewChange, Record};
use crate::domain::value_objects::{ChangeOp, DeviceId, EntityType};
use crate::shared::error::Result;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Sqlite};
use tokio::sync::broadcast;
use uuid::Uuid;

use super::change_tracker::insert_change;
use super::rows::RecordRow;

const CHANGE_EVENT_CAPACITY: usize = 256;

/// SQLite-backed replica. Local edits write the record row and its change-log
/// entry in one transaction, so the store and the queue can never disagree
/// about what changed last. Remote winners are applied without change-log
/// entries so pulled data never echoes back to the remote.
pub struct SqliteReplicaStore {
    pool: Pool<Sqlite>,
    device: DeviceId,
    events: broadcast::Sender<ChangeEvent>,
}

impl SqliteReplicaStore {
    pub fn new(pool: Pool<Sqlite>, device: DeviceId) -> Self {
        let (events, _) = broadcast::channel(CHANGE_EVENT_CAPACITY);
        Self {
            pool,
            device,
            events,
        }
    }

    pub fn device_id(&self) -> DeviceId {
        self.device
    }

    fn notify(&self, entity_type: EntityType, entity_id: Uuid, op: ChangeOp, local: bool) {
        // Nobody listening is fine; the change log is the durable record.
        let _ = self.events.send(ChangeEvent {
            entity_type,
            entity_id,
            op,
            local,
        });
    }

    async fn fetch_in_tx(
        tx: &mut sqlx::Transaction<'_, Sqlite>,
        entity_type: &EntityType,
        entity_id: Uuid,
    ) -> Result<Option<Record>> {
        let row = sqlx::query_as::<_, RecordRow>(
            "SELECT * FROM records WHERE entity_type = ?1 AND entity_id = ?2",
        )
        .bind(entity_type.as_str())
        .bind(entity_id.to_string())
        .fetch_optional(&mut **tx)
        .await?;

        row.map(Record::try_from).transpose()
    }

    async fn upsert_in_tx(
        tx: &mut sqlx::Transaction<'_, Sqlite>,
        record: &Record,
    ) -> Result<()> {
        let payload = serde_json::to_string(&record.payload)?;
        sqlx::query(
            r#"
            INSERT INTO records (entity_type, entity_id, payload, updated_at, deleted, origin)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(entity_type, entity_id) DO UPDATE SET
                payload = excluded.payload,
                updated_at = excluded.updated_at,
                deleted = excluded.deleted,
                origin = excluded.origin
            "#,
        )
        .bind(record.entity_type.as_str())
        .bind(record.entity_id.to_string())
        .bind(payload)
        .bind(record.updated_at.timestamp_millis())
        .bind(record.deleted as i64)
        .bind(record.origin.to_string())
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Writes a locally-originated record and its change entry atomically.
    async fn write_local(&self, record: Record, op: ChangeOp) -> Result<()> {
        let change = NewChange {
            entity_type: record.entity_type.clone(),
            entity_id: record.entity_id,
            op,
            payload: record.payload.clone(),
            updated_at: record.updated_at,
            origin: record.origin,
        };

        let mut tx = self.pool.begin().await?;
        Self::upsert_in_tx(&mut tx, &record).await?;
        insert_change(&mut *tx, &change, Utc::now()).await?;
        tx.commit().await?;

        self.notify(record.entity_type, record.entity_id, op, true);
        Ok(())
    }
}

#[async_trait]
impl ReplicaStore for SqliteReplicaStore {
    async fn get(&self, entity_type: &EntityType, entity_id: Uuid) -> Result<Option<Record>> {
        let row = sqlx::query_as::<_, RecordRow>(
            "SELECT * FROM records WHERE entity_type = ?1 AND entity_id = ?2",
        )
        .bind(entity_type.as_str())
        .bind(entity_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Record::try_from).transpose()
    }

    async fn put(&self, record: Record) -> Result<()> {
        self.write_local(record, ChangeOp::Upsert).await
    }

    async fn delete(&self, entity_type: &EntityType, entity_id: Uuid) -> Result<()> {
        let tombstone = Record::tombstone(entity_type.clone(), entity_id, Utc::now(), self.device);
        self.write_local(tombstone, ChangeOp::Delete).await
    }

    async fn list(&self, entity_type: &EntityType, filter: RecordFilter) -> Result<Vec<Record>> {
        let mut qb = sqlx::QueryBuilder::new("SELECT * FROM records WHERE entity_type = ");
        qb.push_bind(entity_type.as_str());
        if !filter.include_deleted {
            qb.push(" AND deleted = 0");
        }
        if let Some(since) = filter.updated_since {
            qb.push(" AND updated_at >= ");
            qb.push_bind(since.timestamp_millis());
        }
        qb.push(" ORDER BY updated_at DESC, entity_id ASC");
        if let Some(limit) = filter.limit {
            qb.push(" LIMIT ");
            qb.push_bind(limit as i64);
        }

        let rows = qb
            .build_query_as::<RecordRow>()
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Record::try_from).collect()
    }

    async fn apply_remote(&self, record: Record) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let remote_won = match Self::fetch_in_tx(&mut tx, &record.entity_type, record.entity_id)
            .await?
        {
            Some(local) => conflict::resolve(&local, &record) == Winner::Remote,
            None => true,
        };

        if remote_won {
            Self::upsert_in_tx(&mut tx, &record).await?;
        }
        tx.commit().await?;

        if remote_won {
            let op = if record.deleted {
                ChangeOp::Delete
            } else {
                ChangeOp::Upsert
            };
            self.notify(record.entity_type, record.entity_id, op, false);
        }
        Ok(remote_won)
    }

    async fn snapshot_as_changes(&self) -> Result<u64> {
        let now = Utc::now().timestamp_millis();
        let result = sqlx::query(
            r#"
            INSERT INTO change_log (
                entity_type, entity_id, op, payload, updated_at, origin,
                sync_status, attempts, created_at
            )
            SELECT
                r.entity_type,
                r.entity_id,
                CASE r.deleted WHEN 0 THEN 'upsert' ELSE 'delete' END,
                r.payload,
                r.updated_at,
                r.origin,
                'pending',
                0,
                ?1
            FROM records r
            WHERE NOT EXISTS (
                SELECT 1 FROM change_log c
                WHERE c.entity_type = r.entity_type
                  AND c.entity_id = r.entity_id
                  AND c.sync_status != 'synced'
            )
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::ChangeTracker;
    use crate::infrastructure::database::{ConnectionPool, SqliteChangeTracker};
    use chrono::TimeZone;
    use serde_json::json;

    async fn setup() -> (SqliteReplicaStore, SqliteChangeTracker) {
        let pool = ConnectionPool::from_memory().await.unwrap();
        pool.migrate().await.unwrap();
        let store = SqliteReplicaStore::new(pool.pool().clone(), DeviceId::generate());
        let tracker = SqliteChangeTracker::new(pool.pool().clone());
        (store, tracker)
    }

    fn entity_type() -> EntityType {
        EntityType::new("commitment".into()).unwrap()
    }

    fn record(store: &SqliteReplicaStore, entity: u128, ts_millis: i64) -> Record {
        Record::new(
            entity_type(),
            Uuid::from_u128(entity),
            json!({"title": "ship it", "ts": ts_millis}),
            Utc.timestamp_millis_opt(ts_millis).unwrap(),
            store.device_id(),
        )
    }

    #[tokio::test]
    async fn put_round_trips_through_get() {
        let (store, _) = setup().await;
        let rec = record(&store, 1, 1_000);
        store.put(rec.clone()).await.unwrap();

        let loaded = store.get(&entity_type(), rec.entity_id).await.unwrap().unwrap();
        assert_eq!(loaded, rec);
    }

    #[tokio::test]
    async fn put_enqueues_exactly_one_change_with_same_timestamp() {
        let (store, tracker) = setup().await;
        let rec = record(&store, 1, 1_000);
        store.put(rec.clone()).await.unwrap();

        let batch = tracker.pending_batch(10).await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].op, ChangeOp::Upsert);
        assert_eq!(batch[0].updated_at, rec.updated_at);
        assert_eq!(batch[0].entity_id, rec.entity_id);
    }

    #[tokio::test]
    async fn delete_writes_tombstone_and_delete_change() {
        let (store, tracker) = setup().await;
        let rec = record(&store, 1, 1_000);
        store.put(rec.clone()).await.unwrap();
        store.delete(&entity_type(), rec.entity_id).await.unwrap();

        let loaded = store.get(&entity_type(), rec.entity_id).await.unwrap().unwrap();
        assert!(loaded.deleted);

        let batch = tracker.pending_batch(10).await.unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[1].op, ChangeOp::Delete);

        // Tombstones are excluded from listings unless asked for.
        assert!(store
            .list(&entity_type(), RecordFilter::default())
            .await
            .unwrap()
            .is_empty());
        let all = store
            .list(
                &entity_type(),
                RecordFilter {
                    include_deleted: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn apply_remote_respects_lww_and_never_enqueues() {
        let (store, tracker) = setup().await;
        let local = record(&store, 1, 5_000);
        store.put(local.clone()).await.unwrap();

        let mut stale = record(&store, 1, 1_000);
        stale.origin = DeviceId::generate();
        assert!(!store.apply_remote(stale).await.unwrap());

        let mut newer = record(&store, 1, 9_000);
        newer.origin = DeviceId::generate();
        newer.payload = json!({"title": "remote edit"});
        assert!(store.apply_remote(newer.clone()).await.unwrap());

        let loaded = store.get(&entity_type(), local.entity_id).await.unwrap().unwrap();
        assert_eq!(loaded.payload, newer.payload);

        // Only the original local put is in the queue.
        assert_eq!(tracker.pending_batch(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn applying_the_same_batch_twice_is_idempotent() {
        let (store, _) = setup().await;
        let mut remote = record(&store, 1, 2_000);
        remote.origin = DeviceId::generate();

        assert!(store.apply_remote(remote.clone()).await.unwrap());
        // Replay after a crash-before-checkpoint: same record, same verdict.
        assert!(!store.apply_remote(remote.clone()).await.unwrap());

        let loaded = store.get(&entity_type(), remote.entity_id).await.unwrap().unwrap();
        assert_eq!(loaded, remote);
    }

    #[tokio::test]
    async fn remote_tombstone_removes_live_record() {
        let (store, _) = setup().await;
        let local = record(&store, 1, 1_000);
        store.put(local.clone()).await.unwrap();

        let tomb = Record::tombstone(
            entity_type(),
            local.entity_id,
            Utc.timestamp_millis_opt(2_000).unwrap(),
            DeviceId::generate(),
        );
        assert!(store.apply_remote(tomb).await.unwrap());

        let loaded = store.get(&entity_type(), local.entity_id).await.unwrap().unwrap();
        assert!(loaded.deleted);
    }

    #[tokio::test]
    async fn snapshot_skips_identities_with_outstanding_changes() {
        let (store, tracker) = setup().await;
        store.put(record(&store, 1, 1_000)).await.unwrap();
        store.put(record(&store, 2, 2_000)).await.unwrap();

        // Both identities already have pending changes from put().
        assert_eq!(store.snapshot_as_changes().await.unwrap(), 0);

        // Once the queue drains, a fresh enable re-seeds everything.
        let ids: Vec<i64> = tracker
            .pending_batch(10)
            .await
            .unwrap()
            .iter()
            .map(|c| c.id)
            .collect();
        tracker.mark_synced(&ids).await.unwrap();
        tracker.compact_synced().await.unwrap();

        assert_eq!(store.snapshot_as_changes().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn mutations_emit_change_events() {
        let (store, _) = setup().await;
        let mut events = store.subscribe();

        store.put(record(&store, 1, 1_000)).await.unwrap();
        let event = events.recv().await.unwrap();
        assert_eq!(event.op, ChangeOp::Upsert);
        assert!(event.local);

        let mut remote = record(&store, 2, 2_000);
        remote.origin = DeviceId::generate();
        store.apply_remote(remote).await.unwrap();
        let event = events.recv().await.unwrap();
        assert!(!event.local);
    }
}
