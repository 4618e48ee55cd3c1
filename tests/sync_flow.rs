//! End-to-end reconciliation over an in-memory remote: several replicas sync
//! against one canonical store and must converge on the same state.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tidemark::domain::conflict::{self, Winner};
use tidemark::{
    AppError, ChangeOp, ChangeRecord, Checkpoint, ConnectionPool, ConnectorFactory, EntityType,
    PullResponse, PushResult, Record, RejectedChange, RemoteConnector, ReplicaStore,
    SqliteChangeTracker, SqliteReplicaStore, SqliteSyncStateStore, SyncConfig, SyncService,
    SyncSettings, SyncStateStore,
};
use uuid::Uuid;

/// Canonical store: a map of current versions plus an append-only log whose
/// length doubles as the checkpoint. Pushes are resolved with the same
/// last-write-wins rule the replicas use, so the winner is the same no matter
/// which side judges the conflict.
#[derive(Default)]
struct RemoteState {
    records: HashMap<(String, Uuid), Record>,
    log: Vec<Record>,
}

impl RemoteState {
    fn commit(&mut self, record: Record) {
        self.records.insert(
            (record.entity_type.as_str().to_string(), record.entity_id),
            record.clone(),
        );
        self.log.push(record);
    }
}

#[derive(Clone, Default)]
struct InMemoryRemote {
    state: Arc<Mutex<RemoteState>>,
}

#[async_trait]
impl RemoteConnector for InMemoryRemote {
    async fn handshake(&self) -> tidemark::Result<()> {
        Ok(())
    }

    async fn pull(&self, since: Option<&Checkpoint>) -> tidemark::Result<PullResponse> {
        let state = self.state.lock().unwrap();
        let offset = match since {
            Some(checkpoint) => checkpoint
                .as_str()
                .parse::<usize>()
                .map_err(|_| AppError::Protocol("unknown checkpoint".into()))?,
            None => 0,
        };
        Ok(PullResponse {
            records: state.log[offset.min(state.log.len())..].to_vec(),
            checkpoint: Checkpoint::new(state.log.len().to_string()),
        })
    }

    async fn push(&self, changes: &[ChangeRecord]) -> tidemark::Result<PushResult> {
        let mut state = self.state.lock().unwrap();
        let mut result = PushResult::default();

        for change in changes {
            let incoming = match change.op {
                ChangeOp::Upsert => Record::new(
                    change.entity_type.clone(),
                    change.entity_id,
                    change.payload.clone(),
                    change.updated_at,
                    change.origin,
                ),
                ChangeOp::Delete => Record::tombstone(
                    change.entity_type.clone(),
                    change.entity_id,
                    change.updated_at,
                    change.origin,
                ),
            };

            let key = (
                incoming.entity_type.as_str().to_string(),
                incoming.entity_id,
            );
            match state.records.get(&key) {
                Some(stored) if conflict::resolve(stored, &incoming) == Winner::Local => {
                    result.conflicts.push(RejectedChange {
                        change_id: change.id,
                        current: stored.clone(),
                    });
                }
                _ => {
                    state.commit(incoming);
                    result.accepted.push(change.id);
                }
            }
        }

        Ok(result)
    }
}

struct InMemoryFactory {
    remote: InMemoryRemote,
}

impl ConnectorFactory for InMemoryFactory {
    fn connect(&self, _endpoint: &str) -> Arc<dyn RemoteConnector> {
        Arc::new(self.remote.clone())
    }
}

struct Device {
    service: SyncService,
    replica: Arc<SqliteReplicaStore>,
    pool: ConnectionPool,
}

async fn device_over(pool: ConnectionPool, remote: &InMemoryRemote) -> Device {
    pool.migrate().await.unwrap();

    let state = Arc::new(SqliteSyncStateStore::new(pool.pool().clone()));
    let device_id = state.device_id().await.unwrap();
    let replica = Arc::new(SqliteReplicaStore::new(pool.pool().clone(), device_id));
    let tracker = Arc::new(SqliteChangeTracker::new(pool.pool().clone()));

    let settings = SyncSettings {
        interval_secs: 3600, // ticks are driven by the tests
        ..Default::default()
    };
    let service = SyncService::new(
        replica.clone(),
        tracker,
        state,
        Arc::new(InMemoryFactory {
            remote: remote.clone(),
        }),
        settings,
    );
    service.resume().await.unwrap();

    Device {
        service,
        replica,
        pool,
    }
}

async fn device(remote: &InMemoryRemote) -> Device {
    device_over(ConnectionPool::from_memory().await.unwrap(), remote).await
}

fn note_type() -> EntityType {
    EntityType::new("note".into()).unwrap()
}

fn note(device: &Device, entity: u128, ts_millis: i64, title: &str) -> Record {
    Record::new(
        note_type(),
        Uuid::from_u128(entity),
        json!({"title": title}),
        Utc.timestamp_millis_opt(ts_millis).unwrap(),
        device.replica.device_id(),
    )
}

async fn enable(device: &Device) {
    device
        .service
        .enable(SyncConfig::new("https://sync.example.com".into()))
        .await
        .unwrap();
}

#[tokio::test]
async fn concurrent_edits_on_two_devices_converge_to_the_later_write() {
    let remote = InMemoryRemote::default();
    let alpha = device(&remote).await;
    let beta = device(&remote).await;

    let morning = Utc.with_ymd_and_hms(2026, 3, 14, 10, 0, 0).unwrap();
    let later = Utc.with_ymd_and_hms(2026, 3, 14, 10, 0, 5).unwrap();

    // Both devices edit the same entity while offline from each other.
    alpha
        .replica
        .put(Record::new(
            note_type(),
            Uuid::from_u128(1),
            json!({"title": "draft from alpha"}),
            morning,
            alpha.replica.device_id(),
        ))
        .await
        .unwrap();
    beta.replica
        .put(Record::new(
            note_type(),
            Uuid::from_u128(1),
            json!({"title": "revision from beta"}),
            later,
            beta.replica.device_id(),
        ))
        .await
        .unwrap();

    enable(&alpha).await;
    enable(&beta).await;
    alpha.service.force_sync().await.unwrap();
    beta.service.force_sync().await.unwrap();

    let on_alpha = alpha
        .replica
        .get(&note_type(), Uuid::from_u128(1))
        .await
        .unwrap()
        .unwrap();
    let on_beta = beta
        .replica
        .get(&note_type(), Uuid::from_u128(1))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(on_alpha.payload, json!({"title": "revision from beta"}));
    assert_eq!(on_alpha.payload, on_beta.payload);
    assert_eq!(on_alpha.updated_at, later);
    assert_eq!(on_alpha.origin, on_beta.origin);

    let canonical = remote.state.lock().unwrap().records
        [&(note_type().as_str().to_string(), Uuid::from_u128(1))]
        .clone();
    assert_eq!(canonical.payload, on_alpha.payload);
}

#[tokio::test]
async fn deletions_propagate_as_tombstones() {
    let remote = InMemoryRemote::default();
    let alpha = device(&remote).await;
    let beta = device(&remote).await;

    alpha.replica.put(note(&alpha, 2, 1_000, "to be removed")).await.unwrap();
    enable(&alpha).await;
    enable(&beta).await;
    assert!(beta
        .replica
        .get(&note_type(), Uuid::from_u128(2))
        .await
        .unwrap()
        .is_some());

    alpha
        .replica
        .delete(&note_type(), Uuid::from_u128(2))
        .await
        .unwrap();
    alpha.service.force_sync().await.unwrap();
    beta.service.force_sync().await.unwrap();

    // Default reads hide the tombstone on both devices.
    assert!(beta
        .replica
        .get(&note_type(), Uuid::from_u128(2))
        .await
        .unwrap()
        .is_none());
    assert!(alpha
        .replica
        .get(&note_type(), Uuid::from_u128(2))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn restart_resumes_from_the_persisted_checkpoint() {
    let remote = InMemoryRemote::default();
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}", dir.path().join("replica.db").display());

    // Seed the canonical store before the device ever connects.
    {
        let mut state = remote.state.lock().unwrap();
        for i in 10..13u128 {
            state.commit(Record::new(
                note_type(),
                Uuid::from_u128(i),
                json!({"title": format!("seed {i}")}),
                Utc.timestamp_millis_opt(i as i64).unwrap(),
                tidemark::DeviceId::generate(),
            ));
        }
    }

    let first_boot = device_over(
        ConnectionPool::new(&url, 1).await.unwrap(),
        &remote,
    )
    .await;
    let report = first_boot
        .service
        .enable(SyncConfig::new("https://sync.example.com".into()))
        .await
        .unwrap();
    assert_eq!(report.pulled, 3);
    assert_eq!(report.applied, 3);
    first_boot.pool.close().await;
    drop(first_boot);

    // One more remote write while the device is down.
    remote.state.lock().unwrap().commit(Record::new(
        note_type(),
        Uuid::from_u128(13),
        json!({"title": "while you were away"}),
        Utc.timestamp_millis_opt(99).unwrap(),
        tidemark::DeviceId::generate(),
    ));

    let second_boot = device_over(ConnectionPool::new(&url, 1).await.unwrap(), &remote).await;
    assert!(second_boot.service.status().await.enabled);

    let report = second_boot.service.force_sync().await.unwrap();
    // Only the delta past the persisted checkpoint comes down.
    assert_eq!(report.pulled, 1);
    assert_eq!(report.applied, 1);

    let listed = second_boot
        .replica
        .list(&note_type(), Default::default())
        .await
        .unwrap();
    assert_eq!(listed.len(), 4);
}

#[tokio::test]
async fn offline_history_reaches_the_remote_after_setup() {
    let remote = InMemoryRemote::default();
    let solo = device(&remote).await;

    for i in 20..25u128 {
        solo.replica
            .put(note(&solo, i, i as i64 * 100, "offline work"))
            .await
            .unwrap();
    }
    assert!(!solo.service.status().await.enabled);

    let report = solo
        .service
        .enable(SyncConfig::new("https://sync.example.com".into()))
        .await
        .unwrap();
    assert_eq!(report.pushed, 5);

    assert_eq!(remote.state.lock().unwrap().records.len(), 5);
    assert_eq!(solo.service.status().await.pending_count, 0);
}
