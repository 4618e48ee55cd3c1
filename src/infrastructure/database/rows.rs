use crate::domain::entities::{ChangeRecord, Record};
use crate::domain::value_objects::{ChangeOp, DeviceId, EntityType, SyncStatus};
use crate::shared::error::AppError;
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct RecordRow {
    pub entity_type: String,
    pub entity_id: String,
    pub payload: String,
    pub updated_at: i64,
    pub deleted: i64,
    pub origin: String,
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ChangeRow {
    pub id: i64,
    pub entity_type: String,
    pub entity_id: String,
    pub op: String,
    pub payload: String,
    pub updated_at: i64,
    pub origin: String,
    pub sync_status: String,
    pub attempts: i64,
    pub created_at: i64,
    pub synced_at: Option<i64>,
    pub error_message: Option<String>,
}

pub(crate) fn millis_to_datetime(millis: i64) -> Result<DateTime<Utc>, AppError> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| AppError::Database(format!("Timestamp out of range: {millis}")))
}

fn corrupt(context: &str, detail: impl std::fmt::Display) -> AppError {
    AppError::Database(format!("Corrupt {context} row: {detail}"))
}

impl TryFrom<RecordRow> for Record {
    type Error = AppError;

    fn try_from(row: RecordRow) -> Result<Self, Self::Error> {
        Ok(Record {
            entity_type: EntityType::new(row.entity_type).map_err(|e| corrupt("record", e))?,
            entity_id: Uuid::parse_str(&row.entity_id).map_err(|e| corrupt("record", e))?,
            payload: serde_json::from_str(&row.payload).map_err(|e| corrupt("record", e))?,
            updated_at: millis_to_datetime(row.updated_at)?,
            deleted: row.deleted != 0,
            origin: DeviceId::parse(&row.origin).map_err(|e| corrupt("record", e))?,
        })
    }
}

impl TryFrom<ChangeRow> for ChangeRecord {
    type Error = AppError;

    fn try_from(row: ChangeRow) -> Result<Self, Self::Error> {
        Ok(ChangeRecord {
            id: row.id,
            entity_type: EntityType::new(row.entity_type).map_err(|e| corrupt("change", e))?,
            entity_id: Uuid::parse_str(&row.entity_id).map_err(|e| corrupt("change", e))?,
            op: row.op.parse::<ChangeOp>().map_err(|e| corrupt("change", e))?,
            payload: serde_json::from_str(&row.payload).map_err(|e| corrupt("change", e))?,
            updated_at: millis_to_datetime(row.updated_at)?,
            origin: DeviceId::parse(&row.origin).map_err(|e| corrupt("change", e))?,
            sync_status: row
                .sync_status
                .parse::<SyncStatus>()
                .map_err(|e| corrupt("change", e))?,
            attempts: row.attempts.max(0) as u32,
            created_at: millis_to_datetime(row.created_at)?,
            synced_at: row.synced_at.map(millis_to_datetime).transpose()?,
            error_message: row.error_message,
        })
    }
}
