use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::info;

use tidemark::{
    AppConfig, ConnectionPool, HttpConnectorFactory, SqliteChangeTracker, SqliteReplicaStore,
    SqliteSyncStateStore, StaticCredentials, SyncConfig, SyncService, SyncStateStore,
    SyncStatusSnapshot,
};

#[derive(Parser)]
#[command(name = "tidemark")]
#[command(about = "Local-first replica with background sync", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", env = "TIDEMARK_LOG_LEVEL")]
    log_level: String,

    /// Enable JSON logging
    #[arg(long, env = "TIDEMARK_JSON_LOGS")]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage synchronization with a remote store
    Sync {
        #[command(subcommand)]
        command: SyncCommands,
    },
}

#[derive(Subcommand)]
enum SyncCommands {
    /// Bind this replica to a remote endpoint and run an initial sync
    Setup {
        /// Remote endpoint URL
        #[arg(long)]
        endpoint: String,
        /// Bearer token for the remote
        #[arg(long, env = "TIDEMARK_TOKEN")]
        token: String,
    },
    /// Show the current sync state
    Status {
        /// Print the status as JSON
        #[arg(long)]
        json: bool,
    },
    /// Stop syncing and forget the remote binding; local data is kept
    Disable,
    /// Run one sync pass immediately
    Now,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level, cli.json_logs)?;

    let mut config = AppConfig::from_env();
    resolve_database_url(&mut config);
    config.validate().map_err(tidemark::AppError::Config)?;

    let pool = ConnectionPool::new(&config.database.url, config.database.max_connections)
        .await
        .with_context(|| format!("opening database at {}", config.database.url))?;
    pool.migrate().await.context("running migrations")?;

    let state = Arc::new(SqliteSyncStateStore::new(pool.pool().clone()));
    let device = state.device_id().await?;
    let replica = Arc::new(SqliteReplicaStore::new(pool.pool().clone(), device));
    let tracker = Arc::new(SqliteChangeTracker::new(pool.pool().clone()));

    let token = match &cli.command {
        Commands::Sync {
            command: SyncCommands::Setup { token, .. },
        } => token.clone(),
        _ => std::env::var("TIDEMARK_TOKEN").unwrap_or_default(),
    };
    let connectors = Arc::new(HttpConnectorFactory::new(
        Arc::new(StaticCredentials::new(token)),
        config.sync.clone(),
    )?);

    let service = SyncService::new(replica, tracker, state, connectors, config.sync.clone());
    service.resume().await?;

    match cli.command {
        Commands::Sync { command } => match command {
            SyncCommands::Setup { endpoint, .. } => {
                let report = service
                    .enable(SyncConfig::new(endpoint.clone()))
                    .await
                    .with_context(|| format!("setting up sync against {endpoint}"))?;
                info!(endpoint = %endpoint, "sync configured");
                println!(
                    "Sync enabled. Initial pass: pulled {}, applied {}, pushed {}, conflicts {}.",
                    report.pulled, report.applied, report.pushed, report.conflicted
                );
            }
            SyncCommands::Status { json } => {
                let status = service.status().await;
                if json {
                    println!("{}", serde_json::to_string_pretty(&status)?);
                } else {
                    print_status(&status);
                }
            }
            SyncCommands::Disable => {
                if service.disable().await? {
                    println!("Sync disabled. Local data is untouched.");
                } else {
                    println!("Sync is already disabled.");
                }
            }
            SyncCommands::Now => {
                let report = service.force_sync().await?;
                println!(
                    "Sync complete: pulled {}, applied {}, pushed {}, conflicts {}.",
                    report.pulled, report.applied, report.pushed, report.conflicted
                );
            }
        },
    }

    pool.close().await;
    Ok(())
}

fn print_status(status: &SyncStatusSnapshot) {
    println!(
        "Sync:      {}",
        if status.enabled { "enabled" } else { "disabled" }
    );
    if status.enabled {
        println!(
            "Remote:    {}",
            if status.connected {
                "reachable"
            } else {
                "unreachable"
            }
        );
        if status.needs_reauth {
            println!("Auth:      credentials expired, re-run `tidemark sync setup`");
        }
        match status.last_sync_at {
            Some(at) => println!("Last sync: {}", at.to_rfc3339()),
            None => println!("Last sync: never"),
        }
    }
    println!("Pending:   {} change(s)", status.pending_count);
}

/// Without an explicit database url, the replica lives in the platform's
/// local data directory.
fn resolve_database_url(config: &mut AppConfig) {
    if std::env::var("TIDEMARK_DATABASE_URL").is_ok() {
        return;
    }
    if let Some(dir) = dirs::data_local_dir() {
        let path = dir.join("tidemark").join("tidemark.db");
        config.database.url = format!("sqlite:{}", path.display());
    }
}

fn init_logging(level: &str, json: bool) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let fmt_layer = if json {
        fmt::layer().json().with_current_span(false).boxed()
    } else {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    Ok(())
}
