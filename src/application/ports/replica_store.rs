use crate::domain::entities::Record;
use crate::domain::value_objects::{ChangeOp, EntityType};
use crate::shared::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Notification emitted after every successful replica mutation, local or
/// remote-applied. Observers must tolerate lag; the change log, not this
/// channel, is the durable record.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub entity_type: EntityType,
    pub entity_id: Uuid,
    pub op: ChangeOp,
    /// False when the write came from the sync loop applying a remote winner.
    pub local: bool,
}

#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub include_deleted: bool,
    pub updated_since: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
}

/// The always-available local copy of the dataset. Every host read and write
/// goes through this regardless of sync state; none of these calls ever touch
/// the network.
#[async_trait]
pub trait ReplicaStore: Send + Sync {
    async fn get(&self, entity_type: &EntityType, entity_id: Uuid) -> Result<Option<Record>>;

    /// Durably writes a local edit and enqueues exactly one change-log entry
    /// carrying the same `updated_at`, in a single transaction.
    async fn put(&self, record: Record) -> Result<()>;

    /// Writes a tombstone for the identity and enqueues the matching delete.
    async fn delete(&self, entity_type: &EntityType, entity_id: Uuid) -> Result<()>;

    async fn list(&self, entity_type: &EntityType, filter: RecordFilter) -> Result<Vec<Record>>;

    /// Sync-loop path: resolves the remote version against the current local
    /// row inside one transaction and keeps the winner. Does NOT enqueue a
    /// change — remote-applied rows must never echo back to the remote.
    /// Returns true when the remote version won and was written.
    async fn apply_remote(&self, record: Record) -> Result<bool>;

    /// Enqueues every current row as a pending change unless an outstanding
    /// entry for its identity already exists. Run when sync is first enabled
    /// so data created before setup (or while offline) is never lost.
    /// Returns the number of changes enqueued.
    async fn snapshot_as_changes(&self) -> Result<u64>;

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent>;
}
