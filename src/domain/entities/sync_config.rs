use serde::{Deserialize, Serialize};

/// Remote-store binding, persisted atomically as a single JSON value. Created
/// by `sync setup`, mutated only by enable/disable, never partially written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    pub remote_endpoint: String,
    pub enabled: bool,
}

impl SyncConfig {
    pub fn new(remote_endpoint: String) -> Self {
        Self {
            remote_endpoint,
            enabled: true,
        }
    }
}
