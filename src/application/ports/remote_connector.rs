use crate::domain::entities::{ChangeRecord, Record};
use crate::domain::value_objects::Checkpoint;
use crate::shared::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct PullResponse {
    pub records: Vec<Record>,
    pub checkpoint: Checkpoint,
}

/// A change the remote refused because it holds a newer version; the current
/// remote version rides along instead of the write being silently dropped.
#[derive(Debug, Clone)]
pub struct RejectedChange {
    pub change_id: i64,
    pub current: Record,
}

#[derive(Debug, Clone, Default)]
pub struct PushResult {
    pub accepted: Vec<i64>,
    pub conflicts: Vec<RejectedChange>,
}

/// Client for the remote canonical store. Implementations own timeouts,
/// auth-header injection and transport-level retry: transient failures are
/// retried internally with bounded exponential backoff, `Auth` errors are
/// surfaced immediately and never retried with the same credentials.
#[async_trait]
pub trait RemoteConnector: Send + Sync {
    /// No-op authenticated round-trip, used to validate a config before it is
    /// persisted. Must not disturb checkpoint state on either side.
    async fn handshake(&self) -> Result<()>;

    async fn pull(&self, since: Option<&Checkpoint>) -> Result<PullResponse>;

    async fn push(&self, changes: &[ChangeRecord]) -> Result<PushResult>;
}

/// Builds a connector bound to one endpoint. The sync service goes through
/// this when a config is enabled or restored, so tests can substitute an
/// in-memory remote.
pub trait ConnectorFactory: Send + Sync {
    fn connect(&self, endpoint: &str) -> Arc<dyn RemoteConnector>;
}
