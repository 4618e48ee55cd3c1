use crate::domain::entities::{ChangeRecord, NewChange};
use crate::shared::error::Result;
use async_trait::async_trait;

/// The outbound delta queue. Entries are only ever removed after the remote
/// store has confirmed them and the checkpoint has advanced; a failed push
/// marks them for retry, never drops them.
#[async_trait]
pub trait ChangeTracker: Send + Sync {
    async fn enqueue(&self, change: NewChange) -> Result<i64>;

    /// Oldest-first batch of outstanding changes, ordered by `updated_at`
    /// then `entity_id` so batch composition is deterministic. `max` bounds
    /// one push round's payload.
    async fn pending_batch(&self, max: u32) -> Result<Vec<ChangeRecord>>;

    async fn mark_syncing(&self, ids: &[i64]) -> Result<()>;

    async fn mark_synced(&self, ids: &[i64]) -> Result<()>;

    /// Returns the entries to a retriable state and increments `attempts`.
    async fn mark_failed(&self, ids: &[i64], error: Option<&str>) -> Result<()>;

    /// Number of changes not yet confirmed by the remote.
    async fn pending_count(&self) -> Result<u64>;

    /// Deletes confirmed entries. Called only after the checkpoint covering
    /// them has been persisted.
    async fn compact_synced(&self) -> Result<u64>;
}
