use crate::domain::entities::{ChangeRecord, Record};
use crate::domain::value_objects::{DeviceId, EntityType};
use crate::shared::error::AppError;
use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

// Wire shapes for the canonical store's sync protocol. Timestamps travel as
// integer milliseconds so LWW comparisons survive the JSON round-trip exactly.

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordDto {
    pub entity_type: String,
    pub entity_id: Uuid,
    pub payload: Value,
    pub updated_at: i64,
    pub deleted: bool,
    pub origin: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeDto {
    pub change_id: i64,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub op: String,
    pub payload: Value,
    pub updated_at: i64,
    pub origin: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestBody {
    pub checkpoint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullResponseBody {
    pub records: Vec<RecordDto>,
    pub checkpoint: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushRequestBody {
    pub changes: Vec<ChangeDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictDto {
    pub change_id: i64,
    pub current: RecordDto,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushResponseBody {
    pub accepted: Vec<i64>,
    pub conflicts: Vec<ConflictDto>,
}

impl From<&Record> for RecordDto {
    fn from(record: &Record) -> Self {
        Self {
            entity_type: record.entity_type.as_str().to_string(),
            entity_id: record.entity_id,
            payload: record.payload.clone(),
            updated_at: record.updated_at.timestamp_millis(),
            deleted: record.deleted,
            origin: record.origin.as_uuid(),
        }
    }
}

impl TryFrom<RecordDto> for Record {
    type Error = AppError;

    fn try_from(dto: RecordDto) -> Result<Self, Self::Error> {
        let entity_type = EntityType::new(dto.entity_type)
            .map_err(|e| AppError::Protocol(format!("Bad record on wire: {e}")))?;
        let updated_at = DateTime::from_timestamp_millis(dto.updated_at).ok_or_else(|| {
            AppError::Protocol(format!("Bad record timestamp on wire: {}", dto.updated_at))
        })?;
        Ok(Record {
            entity_type,
            entity_id: dto.entity_id,
            payload: dto.payload,
            updated_at,
            deleted: dto.deleted,
            origin: DeviceId::from_uuid(dto.origin),
        })
    }
}

impl From<&ChangeRecord> for ChangeDto {
    fn from(change: &ChangeRecord) -> Self {
        Self {
            change_id: change.id,
            entity_type: change.entity_type.as_str().to_string(),
            entity_id: change.entity_id,
            op: change.op.as_str().to_string(),
            payload: change.payload.clone(),
            updated_at: change.updated_at.timestamp_millis(),
            origin: change.origin.as_uuid(),
        }
    }
}
