mod change_tracker;
mod connection_pool;
mod replica_store;
mod rows;
mod sync_state;

pub use change_tracker::SqliteChangeTracker;
pub use connection_pool::ConnectionPool;
pub use replica_store::SqliteReplicaStore;
pub use sync_state::SqliteSyncStateStore;
