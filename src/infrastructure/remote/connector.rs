use crate::application::ports::{
    ConnectorFactory, Credentials, CredentialsProvider, PullResponse, PushResult, RejectedChange,
    RemoteConnector,
};
use crate::domain::entities::{ChangeRecord, Record};
use crate::domain::value_objects::Checkpoint;
use crate::shared::config::SyncSettings;
use crate::shared::error::{AppError, Result};
use async_trait::async_trait;
use rand::Rng;
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;

use super::wire::{
    ChangeDto, PullRequestBody, PullResponseBody, PushRequestBody, PushResponseBody,
};

const BACKOFF_CAP: Duration = Duration::from_secs(30);

/// HTTP client for the canonical store. Owns the request timeout, the bearer
/// header on every round and the transient-failure retry budget; `Auth`
/// rejections are surfaced immediately so the host can re-acquire credentials.
pub struct HttpRemoteConnector {
    client: reqwest::Client,
    endpoint: String,
    credentials: Arc<dyn CredentialsProvider>,
    max_attempts: u32,
    retry_base: Duration,
}

impl HttpRemoteConnector {
    pub fn new(
        client: reqwest::Client,
        endpoint: &str,
        credentials: Arc<dyn CredentialsProvider>,
        settings: &SyncSettings,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            credentials,
            max_attempts: settings.max_retry.max(1),
            retry_base: Duration::from_millis(settings.retry_base_millis.max(1)),
        }
    }

    async fn send(&self, path: &str, body: &serde_json::Value) -> Result<reqwest::Response> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.try_send(path, body).await {
                Ok(response) => return Ok(response),
                Err(err @ AppError::Connectivity(_)) if attempt < self.max_attempts => {
                    let delay = backoff_delay(self.retry_base, attempt);
                    tracing::debug!(
                        path,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient failure, backing off before retry"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn try_send(&self, path: &str, body: &serde_json::Value) -> Result<reqwest::Response> {
        let Credentials { bearer } = self
            .credentials
            .get_valid_credentials(&self.endpoint)
            .await?;

        let url = format!("{}/v1/sync/{}", self.endpoint, path);
        let response = self
            .client
            .post(&url)
            .bearer_auth(bearer)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let payload = response.text().await.unwrap_or_default();
        Err(classify_status(status, &payload))
    }
}

fn classify_status(status: StatusCode, payload: &str) -> AppError {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        AppError::Auth(format!("Remote rejected credentials ({status})"))
    } else if status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
    {
        AppError::Connectivity(format!("Remote unavailable ({status})"))
    } else {
        // Unexpected statuses carry the payload so the response can be diagnosed.
        AppError::Protocol(format!("Unexpected response ({status}): {payload}"))
    }
}

fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let exp = base.saturating_mul(1u32 << attempt.saturating_sub(1).min(10));
    let capped = exp.min(BACKOFF_CAP);
    let jitter_ceiling = (base.as_millis() as u64 / 2).max(1);
    let jitter = rand::thread_rng().gen_range(0..=jitter_ceiling);
    capped + Duration::from_millis(jitter)
}

#[async_trait]
impl RemoteConnector for HttpRemoteConnector {
    async fn handshake(&self) -> Result<()> {
        // Status-only round-trip: success means reachable and authenticated.
        self.send("handshake", &serde_json::json!({})).await?;
        Ok(())
    }

    async fn pull(&self, since: Option<&Checkpoint>) -> Result<PullResponse> {
        let body = serde_json::to_value(PullRequestBody {
            checkpoint: since.map(|c| c.as_str().to_string()),
        })?;
        let response = self.send("pull", &body).await?;
        let parsed: PullResponseBody = response.json().await?;

        let records = parsed
            .records
            .into_iter()
            .map(Record::try_from)
            .collect::<Result<Vec<_>>>()?;

        Ok(PullResponse {
            records,
            checkpoint: Checkpoint::new(parsed.checkpoint),
        })
    }

    async fn push(&self, changes: &[ChangeRecord]) -> Result<PushResult> {
        let body = serde_json::to_value(PushRequestBody {
            changes: changes.iter().map(ChangeDto::from).collect(),
        })?;
        let response = self.send("push", &body).await?;
        let parsed: PushResponseBody = response.json().await?;

        let conflicts = parsed
            .conflicts
            .into_iter()
            .map(|c| {
                Ok(RejectedChange {
                    change_id: c.change_id,
                    current: Record::try_from(c.current)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(PushResult {
            accepted: parsed.accepted,
            conflicts,
        })
    }
}

/// Builds HTTP connectors sharing one reqwest client; the client carries the
/// request timeout that bounds every call.
pub struct HttpConnectorFactory {
    client: reqwest::Client,
    credentials: Arc<dyn CredentialsProvider>,
    settings: SyncSettings,
}

impl HttpConnectorFactory {
    pub fn new(credentials: Arc<dyn CredentialsProvider>, settings: SyncSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .connect_timeout(Duration::from_secs(settings.request_timeout_secs.min(10)))
            .build()?;
        Ok(Self {
            client,
            credentials,
            settings,
        })
    }
}

impl ConnectorFactory for HttpConnectorFactory {
    fn connect(&self, endpoint: &str) -> Arc<dyn RemoteConnector> {
        Arc::new(HttpRemoteConnector::new(
            self.client.clone(),
            endpoint,
            self.credentials.clone(),
            &self.settings,
        ))
    }
}

/// Fixed-token credentials, for hosts that hand the engine an already-acquired
/// bearer token. Real refresh flows live behind their own provider.
pub struct StaticCredentials {
    token: String,
}

impl StaticCredentials {
    pub fn new(token: String) -> Self {
        Self { token }
    }
}

#[async_trait]
impl CredentialsProvider for StaticCredentials {
    async fn get_valid_credentials(&self, _remote_id: &str) -> Result<Credentials> {
        if self.token.is_empty() {
            return Err(AppError::Auth("No credentials configured".to_string()));
        }
        Ok(Credentials {
            bearer: self.token.clone(),
        })
    }
}
