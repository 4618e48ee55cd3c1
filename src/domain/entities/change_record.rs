use crate::domain::value_objects::{ChangeOp, DeviceId, EntityType, SyncStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// One entry of the outbound change log: a local mutation not yet confirmed by
/// the remote store. `updated_at` is the same timestamp written to the replica
/// row, so the log and the store never disagree about what changed last.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub id: i64,
    pub entity_type: EntityType,
    pub entity_id: Uuid,
    pub op: ChangeOp,
    pub payload: Value,
    pub updated_at: DateTime<Utc>,
    pub origin: DeviceId,
    pub sync_status: SyncStatus,
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    pub synced_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

/// A change about to enter the log; the store assigns the row id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewChange {
    pub entity_type: EntityType,
    pub entity_id: Uuid,
    pub op: ChangeOp,
    pub payload: Value,
    pub updated_at: DateTime<Utc>,
    pub origin: DeviceId,
}
