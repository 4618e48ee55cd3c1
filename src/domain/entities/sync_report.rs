use serde::{Deserialize, Serialize};

/// Outcome of one reconciliation tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    /// Records received from the remote pull.
    pub pulled: u64,
    /// Pulled records that won conflict resolution and were applied locally.
    pub applied: u64,
    /// Local changes accepted by the remote push.
    pub pushed: u64,
    /// Local changes the remote rejected with a newer version; the remote
    /// version was applied locally.
    pub conflicted: u64,
}
