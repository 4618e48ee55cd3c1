mod change_op;
mod checkpoint;
mod device_id;
mod entity_type;
mod sync_status;

pub use change_op::ChangeOp;
pub use checkpoint::Checkpoint;
pub use device_id::DeviceId;
pub use entity_type::EntityType;
pub use sync_status::SyncStatus;
