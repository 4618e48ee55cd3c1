use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub sync: SyncSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Tuning knobs for the reconciliation loop and the remote connector. The
/// remote endpoint itself is not here: it is runtime state owned by the sync
/// service and persisted alongside the checkpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Seconds between background reconciliation ticks.
    pub interval_secs: u64,
    /// Upper bound on one push round's payload.
    pub batch_size: u32,
    /// Transient-failure retry budget inside the connector.
    pub max_retry: u32,
    /// Bound on every network call. A call never blocks past this.
    pub request_timeout_secs: u64,
    /// Base delay for exponential backoff between connector retries.
    pub retry_base_millis: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite:data/tidemark.db".to_string(),
                max_connections: 5,
            },
            sync: SyncSettings::default(),
        }
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            interval_secs: 300, // 5 minutes
            batch_size: 100,
            max_retry: 3,
            request_timeout_secs: 30,
            retry_base_millis: 500,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("TIDEMARK_DATABASE_URL") {
            if !v.trim().is_empty() {
                cfg.database.url = v;
            }
        }
        if let Ok(v) = std::env::var("TIDEMARK_DATABASE_MAX_CONNECTIONS") {
            if let Some(value) = parse_u32(&v) {
                cfg.database.max_connections = value;
            }
        }
        if let Ok(v) = std::env::var("TIDEMARK_SYNC_INTERVAL_SECS") {
            if let Some(value) = parse_u64(&v) {
                cfg.sync.interval_secs = value.max(1);
            }
        }
        if let Ok(v) = std::env::var("TIDEMARK_SYNC_BATCH_SIZE") {
            if let Some(value) = parse_u32(&v) {
                cfg.sync.batch_size = value;
            }
        }
        if let Ok(v) = std::env::var("TIDEMARK_SYNC_MAX_RETRY") {
            if let Some(value) = parse_u32(&v) {
                cfg.sync.max_retry = value;
            }
        }
        if let Ok(v) = std::env::var("TIDEMARK_REQUEST_TIMEOUT_SECS") {
            if let Some(value) = parse_u64(&v) {
                cfg.sync.request_timeout_secs = value.max(1);
            }
        }
        if let Ok(v) = std::env::var("TIDEMARK_RETRY_BASE_MILLIS") {
            if let Some(value) = parse_u64(&v) {
                cfg.sync.retry_base_millis = value.max(1);
            }
        }

        cfg
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.database.url.trim().is_empty() {
            return Err("Database url must not be empty".to_string());
        }
        if self.database.max_connections == 0 {
            return Err("Database max_connections must be greater than 0".to_string());
        }
        if self.sync.interval_secs == 0 {
            return Err("Sync interval_secs must be greater than 0".to_string());
        }
        if self.sync.batch_size == 0 {
            return Err("Sync batch_size must be greater than 0".to_string());
        }
        if self.sync.max_retry == 0 {
            return Err("Sync max_retry must be greater than 0".to_string());
        }
        if self.sync.request_timeout_secs == 0 {
            return Err("Sync request_timeout_secs must be greater than 0".to_string());
        }
        Ok(())
    }
}

fn parse_u32(value: &str) -> Option<u32> {
    value.trim().parse::<u32>().ok()
}

fn parse_u64(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok()
}
