use crate::application::ports::{
    ChangeTracker, ConnectorFactory, RemoteConnector, ReplicaStore, SyncStateStore,
};
use crate::domain::entities::{SyncConfig, SyncReport};
use crate::shared::config::SyncSettings;
use crate::shared::error::{AppError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;

/// Read-only view of the engine, safe to poll from any foreground surface.
/// Built from cached state; never touches the database or the network.
#[derive(Debug, Clone, Serialize)]
pub struct SyncStatusSnapshot {
    pub enabled: bool,
    pub connected: bool,
    pub needs_reauth: bool,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub pending_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Disabled,
    Configuring,
    Idle,
    Syncing,
}

struct Inner {
    lifecycle: Lifecycle,
    connector: Option<Arc<dyn RemoteConnector>>,
    connected: bool,
    needs_reauth: bool,
    last_sync_at: Option<DateTime<Utc>>,
    pending: u64,
    loop_handle: Option<JoinHandle<()>>,
}

/// Orchestrates reconciliation between the local replica and the remote
/// canonical store.
///
/// Owns the sync config and the checkpoint exclusively; no other component
/// writes them. At most one tick runs at a time: the background loop and
/// `force_sync` serialize on the same tick mutex, so overlapping pushes can
/// never double-count attempts or race the checkpoint.
pub struct SyncService {
    replica: Arc<dyn ReplicaStore>,
    tracker: Arc<dyn ChangeTracker>,
    state: Arc<dyn SyncStateStore>,
    connectors: Arc<dyn ConnectorFactory>,
    settings: SyncSettings,
    inner: Arc<RwLock<Inner>>,
    tick_lock: Arc<Mutex<()>>,
}

impl Clone for SyncService {
    fn clone(&self) -> Self {
        Self {
            replica: self.replica.clone(),
            tracker: self.tracker.clone(),
            state: self.state.clone(),
            connectors: self.connectors.clone(),
            settings: self.settings.clone(),
            inner: self.inner.clone(),
            tick_lock: self.tick_lock.clone(),
        }
    }
}

impl SyncService {
    pub fn new(
        replica: Arc<dyn ReplicaStore>,
        tracker: Arc<dyn ChangeTracker>,
        state: Arc<dyn SyncStateStore>,
        connectors: Arc<dyn ConnectorFactory>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            replica,
            tracker,
            state,
            connectors,
            settings,
            inner: Arc::new(RwLock::new(Inner {
                lifecycle: Lifecycle::Disabled,
                connector: None,
                connected: false,
                needs_reauth: false,
                last_sync_at: None,
                pending: 0,
                loop_handle: None,
            })),
            tick_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Restores persisted state after process start: primes the pending
    /// counter, starts watching replica mutations, and if a persisted config
    /// says sync is enabled, reconnects and resumes the background loop.
    pub async fn resume(&self) -> Result<()> {
        {
            let mut inner = self.inner.write().await;
            inner.pending = self.tracker.pending_count().await?;
        }
        self.spawn_pending_watcher();

        if let Some(config) = self.state.load_config().await? {
            if config.enabled {
                let connector = self.connectors.connect(&config.remote_endpoint);
                {
                    let mut inner = self.inner.write().await;
                    inner.connector = Some(connector);
                    inner.lifecycle = Lifecycle::Idle;
                }
                self.spawn_loop().await;
                tracing::info!(endpoint = %config.remote_endpoint, "sync resumed from persisted config");
            }
        }
        Ok(())
    }

    /// Validates the config with one no-op round-trip before persisting it.
    /// On validation failure nothing is stored and the prior state stands.
    /// On success, pre-existing local data is seeded into the change queue
    /// and an initial full sync runs before this returns.
    pub async fn enable(&self, config: SyncConfig) -> Result<SyncReport> {
        let connector = self.connectors.connect(&config.remote_endpoint);

        let previous = {
            let mut inner = self.inner.write().await;
            let previous = inner.lifecycle;
            inner.lifecycle = Lifecycle::Configuring;
            previous
        };

        if let Err(err) = connector.handshake().await {
            let mut inner = self.inner.write().await;
            inner.lifecycle = previous;
            tracing::warn!(endpoint = %config.remote_endpoint, error = %err, "sync setup validation failed");
            return Err(err);
        }

        let config = SyncConfig {
            enabled: true,
            ..config
        };
        self.state.store_config(&config).await?;

        // Anything created before setup (or while offline) becomes pending.
        let seeded = self.replica.snapshot_as_changes().await?;

        {
            let mut inner = self.inner.write().await;
            inner.connector = Some(connector);
            inner.lifecycle = Lifecycle::Idle;
            inner.needs_reauth = false;
        }
        tracing::info!(endpoint = %config.remote_endpoint, seeded, "sync enabled");

        let report = self.run_tick().await;
        self.spawn_loop().await;
        report
    }

    /// Stops syncing and forgets the remote binding. Local data and queued
    /// changes stay untouched and fully usable. Returns false when sync was
    /// already disabled.
    pub async fn disable(&self) -> Result<bool> {
        // Wait out any in-flight tick so it cannot persist a checkpoint after
        // we clear it.
        let _tick = self.tick_lock.lock().await;

        {
            let mut inner = self.inner.write().await;
            if inner.lifecycle == Lifecycle::Disabled {
                return Ok(false);
            }
            if let Some(handle) = inner.loop_handle.take() {
                handle.abort();
            }
            inner.connector = None;
            inner.lifecycle = Lifecycle::Disabled;
            inner.connected = false;
            inner.needs_reauth = false;
        }

        self.state.clear_config().await?;
        self.state.clear_checkpoint().await?;
        tracing::info!("sync disabled; local data untouched");
        Ok(true)
    }

    /// Runs one reconciliation tick now. If a scheduled tick is in flight,
    /// waits for it to finish and then runs once more.
    pub async fn force_sync(&self) -> Result<SyncReport> {
        if self.inner.read().await.lifecycle == Lifecycle::Disabled {
            return Err(AppError::Disabled);
        }
        self.run_tick().await
    }

    pub async fn status(&self) -> SyncStatusSnapshot {
        let inner = self.inner.read().await;
        SyncStatusSnapshot {
            enabled: inner.lifecycle != Lifecycle::Disabled,
            connected: inner.connected,
            needs_reauth: inner.needs_reauth,
            last_sync_at: inner.last_sync_at,
            pending_count: inner.pending,
        }
    }

    async fn run_tick(&self) -> Result<SyncReport> {
        let _guard = self.tick_lock.lock().await;

        let connector = {
            let mut inner = self.inner.write().await;
            match inner.connector.clone() {
                Some(connector) if inner.lifecycle != Lifecycle::Disabled => {
                    inner.lifecycle = Lifecycle::Syncing;
                    connector
                }
                _ => return Err(AppError::Disabled),
            }
        };

        let outcome = self.tick_inner(connector.as_ref()).await;

        let mut inner = self.inner.write().await;
        if inner.lifecycle == Lifecycle::Syncing {
            inner.lifecycle = Lifecycle::Idle;
        }
        inner.pending = self.tracker.pending_count().await?;

        match &outcome {
            Ok(report) => {
                inner.connected = true;
                inner.needs_reauth = false;
                inner.last_sync_at = Some(Utc::now());
                tracing::info!(
                    pulled = report.pulled,
                    applied = report.applied,
                    pushed = report.pushed,
                    conflicted = report.conflicted,
                    "sync tick complete"
                );
            }
            Err(AppError::Auth(msg)) => {
                inner.connected = false;
                inner.needs_reauth = true;
                tracing::warn!(error = %msg, "sync needs re-authentication");
            }
            Err(err) => {
                // Protocol errors land here too: logged, retried next tick.
                inner.connected = false;
                tracing::warn!(error = %err, "sync tick failed; pending changes retained");
            }
        }

        outcome
    }

    /// One reconciliation round. The checkpoint is persisted last, only after
    /// every pulled record is durably applied and the push round resolved, so
    /// a crash anywhere in here replays the same range harmlessly.
    async fn tick_inner(&self, connector: &dyn RemoteConnector) -> Result<SyncReport> {
        let since = self.state.load_checkpoint().await?;
        let pull = connector.pull(since.as_ref()).await?;

        let pulled = pull.records.len() as u64;
        let mut applied = 0u64;
        for record in pull.records {
            if self.replica.apply_remote(record).await? {
                applied += 1;
            }
        }

        let batch = self.tracker.pending_batch(self.settings.batch_size).await?;
        let mut pushed = 0u64;
        let mut conflicted = 0u64;

        if !batch.is_empty() {
            let ids: Vec<i64> = batch.iter().map(|c| c.id).collect();
            self.tracker.mark_syncing(&ids).await?;

            match connector.push(&batch).await {
                Ok(result) => {
                    pushed = result.accepted.len() as u64;
                    self.tracker.mark_synced(&result.accepted).await?;

                    let mut settled: Vec<i64> = result.accepted.clone();
                    for rejected in result.conflicts {
                        // The remote holds a newer version; it is authoritative.
                        self.replica.apply_remote(rejected.current).await?;
                        self.tracker.mark_synced(&[rejected.change_id]).await?;
                        settled.push(rejected.change_id);
                        conflicted += 1;
                    }

                    // A response that drops entries would otherwise strand
                    // them in `syncing`.
                    let unsettled: Vec<i64> = ids
                        .iter()
                        .copied()
                        .filter(|id| !settled.contains(id))
                        .collect();
                    if !unsettled.is_empty() {
                        tracing::warn!(
                            count = unsettled.len(),
                            "push response omitted changes; requeueing them"
                        );
                        self.tracker
                            .mark_failed(&unsettled, Some("missing from push response"))
                            .await?;
                    }
                }
                Err(err) => {
                    self.tracker
                        .mark_failed(&ids, Some(&err.to_string()))
                        .await?;
                    return Err(err);
                }
            }
        }

        self.state.store_checkpoint(&pull.checkpoint).await?;
        self.tracker.compact_synced().await?;

        Ok(SyncReport {
            pulled,
            applied,
            pushed,
            conflicted,
        })
    }

    async fn spawn_loop(&self) {
        let service = self.clone();
        let interval = Duration::from_secs(self.settings.interval_secs);
        let handle = tokio::spawn(async move {
            let mut timer = tokio::time::interval(interval);
            timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The enable/resume path owns the first sync; skip the immediate tick.
            timer.tick().await;
            loop {
                timer.tick().await;
                match service.run_tick().await {
                    Ok(_) => {}
                    Err(AppError::Disabled) => break,
                    Err(err) => {
                        tracing::warn!(error = %err, "scheduled sync tick failed");
                    }
                }
            }
        });

        let mut inner = self.inner.write().await;
        if let Some(old) = inner.loop_handle.replace(handle) {
            old.abort();
        }
    }

    /// Keeps the cached pending counter current between ticks by watching
    /// replica change events. Each tick replaces the count with the queue's
    /// own number, so a lagged event stream self-corrects.
    fn spawn_pending_watcher(&self) {
        let mut events = self.replica.subscribe();
        let inner = self.inner.clone();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) if event.local => {
                        inner.write().await.pending += 1;
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }
}
