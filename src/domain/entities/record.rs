use crate::domain::value_objects::{DeviceId, EntityType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// An opaque domain row. Identity is `(entity_type, entity_id)`; the store
/// holds at most one live record per identity. A record with `deleted` set is
/// a tombstone and takes part in conflict resolution like any other write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub entity_type: EntityType,
    pub entity_id: Uuid,
    pub payload: Value,
    pub updated_at: DateTime<Utc>,
    pub deleted: bool,
    pub origin: DeviceId,
}

impl Record {
    pub fn new(
        entity_type: EntityType,
        entity_id: Uuid,
        payload: Value,
        updated_at: DateTime<Utc>,
        origin: DeviceId,
    ) -> Self {
        Self {
            entity_type,
            entity_id,
            payload,
            updated_at,
            deleted: false,
            origin,
        }
    }

    pub fn tombstone(
        entity_type: EntityType,
        entity_id: Uuid,
        updated_at: DateTime<Utc>,
        origin: DeviceId,
    ) -> Self {
        Self {
            entity_type,
            entity_id,
            payload: Value::Null,
            updated_at,
            deleted: true,
            origin,
        }
    }

    pub fn identity(&self) -> (&EntityType, Uuid) {
        (&self.entity_type, self.entity_id)
    }
}
