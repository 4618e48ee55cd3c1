pub mod change_tracker;
pub mod credentials;
pub mod remote_connector;
pub mod replica_store;
pub mod sync_state;

pub use change_tracker::ChangeTracker;
pub use credentials::{Credentials, CredentialsProvider};
pub use remote_connector::{
    ConnectorFactory, PullResponse, PushResult, RejectedChange, RemoteConnector,
};
pub use replica_store::{ChangeEvent, RecordFilter, ReplicaStore};
pub use sync_state::SyncStateStore;
