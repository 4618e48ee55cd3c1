use crate::shared::error::Result;
use async_trait::async_trait;

#[derive(Debug, Clone)]
pub struct Credentials {
    pub bearer: String,
}

/// Capability consumed from the external auth collaborator. The connector
/// calls this before every network round; refresh policy lives entirely on
/// the other side of this trait.
#[async_trait]
pub trait CredentialsProvider: Send + Sync {
    async fn get_valid_credentials(&self, remote_id: &str) -> Result<Credentials>;
}
