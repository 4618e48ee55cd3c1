use crate::application::ports::SyncStateStore;
use crate::domain::entities::SyncConfig;
use crate::domain::value_objects::{Checkpoint, DeviceId};
use crate::shared::error::{AppError, Result};
use async_trait::async_trait;
use sqlx::{Pool, Sqlite};

const KEY_CONFIG: &str = "sync.config";
const KEY_CHECKPOINT: &str = "sync.checkpoint";
const KEY_DEVICE_ID: &str = "sync.device_id";

/// Key/value persistence for the engine's own state. The config is one JSON
/// value under one key, so enable/disable can never leave it half-written.
pub struct SqliteSyncStateStore {
    pool: Pool<Sqlite>,
}

impl SqliteSyncStateStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    async fn kv_get(&self, key: &str) -> Result<Option<String>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT value FROM sync_state WHERE key = ?1")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(value,)| value))
    }

    async fn kv_set(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sync_state (key, value) VALUES (?1, ?2)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn kv_delete(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM sync_state WHERE key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl SyncStateStore for SqliteSyncStateStore {
    async fn load_config(&self) -> Result<Option<SyncConfig>> {
        match self.kv_get(KEY_CONFIG).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn store_config(&self, config: &SyncConfig) -> Result<()> {
        let raw = serde_json::to_string(config)?;
        self.kv_set(KEY_CONFIG, &raw).await
    }

    async fn clear_config(&self) -> Result<()> {
        self.kv_delete(KEY_CONFIG).await
    }

    async fn load_checkpoint(&self) -> Result<Option<Checkpoint>> {
        Ok(self.kv_get(KEY_CHECKPOINT).await?.map(Checkpoint::new))
    }

    async fn store_checkpoint(&self, checkpoint: &Checkpoint) -> Result<()> {
        self.kv_set(KEY_CHECKPOINT, checkpoint.as_str()).await
    }

    async fn clear_checkpoint(&self) -> Result<()> {
        self.kv_delete(KEY_CHECKPOINT).await
    }

    async fn device_id(&self) -> Result<DeviceId> {
        if let Some(raw) = self.kv_get(KEY_DEVICE_ID).await? {
            return DeviceId::parse(&raw).map_err(AppError::Database);
        }

        // INSERT OR IGNORE keeps the first writer's id if two tasks race here.
        let minted = DeviceId::generate();
        sqlx::query("INSERT OR IGNORE INTO sync_state (key, value) VALUES (?1, ?2)")
            .bind(KEY_DEVICE_ID)
            .bind(minted.to_string())
            .execute(&self.pool)
            .await?;

        let raw = self
            .kv_get(KEY_DEVICE_ID)
            .await?
            .ok_or_else(|| AppError::Database("Device id vanished after insert".to_string()))?;
        DeviceId::parse(&raw).map_err(AppError::Database)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database::ConnectionPool;

    async fn setup() -> SqliteSyncStateStore {
        let pool = ConnectionPool::from_memory().await.unwrap();
        pool.migrate().await.unwrap();
        SqliteSyncStateStore::new(pool.pool().clone())
    }

    #[tokio::test]
    async fn config_round_trips_and_clears() {
        let store = setup().await;
        assert!(store.load_config().await.unwrap().is_none());

        let config = SyncConfig::new("https://sync.example.com".into());
        store.store_config(&config).await.unwrap();
        assert_eq!(store.load_config().await.unwrap(), Some(config));

        store.clear_config().await.unwrap();
        assert!(store.load_config().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn checkpoint_round_trips() {
        let store = setup().await;
        assert!(store.load_checkpoint().await.unwrap().is_none());

        store
            .store_checkpoint(&Checkpoint::new("cp-17".into()))
            .await
            .unwrap();
        assert_eq!(
            store.load_checkpoint().await.unwrap().unwrap().as_str(),
            "cp-17"
        );

        store.clear_checkpoint().await.unwrap();
        assert!(store.load_checkpoint().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn device_id_is_minted_once_and_stable() {
        let store = setup().await;
        let first = store.device_id().await.unwrap();
        let second = store.device_id().await.unwrap();
        assert_eq!(first, second);
    }
}
