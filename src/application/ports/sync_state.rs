use crate::domain::entities::SyncConfig;
use crate::domain::value_objects::{Checkpoint, DeviceId};
use crate::shared::error::Result;
use async_trait::async_trait;

/// Persistence for the engine's own state: the sync config, the checkpoint
/// cursor and the device id. Mutated exclusively by the sync service; the
/// config is always written as one value, never field-by-field.
#[async_trait]
pub trait SyncStateStore: Send + Sync {
    async fn load_config(&self) -> Result<Option<SyncConfig>>;
    async fn store_config(&self, config: &SyncConfig) -> Result<()>;
    async fn clear_config(&self) -> Result<()>;

    async fn load_checkpoint(&self) -> Result<Option<Checkpoint>>;
    async fn store_checkpoint(&self, checkpoint: &Checkpoint) -> Result<()>;
    async fn clear_checkpoint(&self) -> Result<()>;

    /// The replica's stable identifier, minted on first use.
    async fn device_id(&self) -> Result<DeviceId>;
}
