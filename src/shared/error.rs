use thiserror::Error;

/// Engine-wide error taxonomy.
///
/// `Connectivity` and `Protocol` are transient: the connector retries them with
/// backoff and a failed tick is retried on the next schedule. `Auth` is never
/// retried with the same credentials; it is surfaced so the host can re-acquire
/// them. Conflicts are not errors and never appear here.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Connectivity error: {0}")]
    Connectivity(String),

    #[error("Auth error: {0}")]
    Auth(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("sync is disabled")]
    Disabled,
}

impl AppError {
    /// Transient failures are safe to retry without operator intervention.
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::Connectivity(_) | AppError::Protocol(_))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            AppError::Protocol(err.to_string())
        } else {
            // Timeouts, refused connections, DNS failures and friends.
            AppError::Connectivity(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
