//! Local-first replica with background reconciliation against a remote
//! canonical store.
//!
//! Reads and writes always go to the local store and succeed offline; a
//! background service reconciles with the remote on an interval, resolving
//! conflicts last-write-wins. Hosts embed [`SyncService`] together with the
//! SQLite-backed stores and an HTTP connector, or substitute their own
//! implementations of the port traits.

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod shared;

pub use application::ports::{
    ChangeEvent, ChangeTracker, ConnectorFactory, Credentials, CredentialsProvider, PullResponse,
    PushResult, RecordFilter, RejectedChange, RemoteConnector, ReplicaStore, SyncStateStore,
};
pub use application::services::{SyncService, SyncStatusSnapshot};
pub use domain::entities::{ChangeRecord, NewChange, Record, SyncConfig, SyncReport};
pub use domain::value_objects::{ChangeOp, Checkpoint, DeviceId, EntityType, SyncStatus};
pub use infrastructure::database::{
    ConnectionPool, SqliteChangeTracker, SqliteReplicaStore, SqliteSyncStateStore,
};
pub use infrastructure::remote::{HttpConnectorFactory, StaticCredentials};
pub use shared::config::{AppConfig, SyncSettings};
pub use shared::error::{AppError, Result};
