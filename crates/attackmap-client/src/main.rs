//! Attack Map dashboard client entry point.
//!
//! Subscribes to the attack-map data server's `WebSocket` feed, caches
//! every hit locally, keeps the dashboard aggregates current, and serves
//! them through the snapshot API.
//!
//! # Architecture
//!
//! ```text
//! upstream WS --> transport --> Dashboard --> EventStore (SQLite | JSON)
//!                                   |
//!                                   +--> AggregationEngine --> snapshot API / ws
//! ```
//!
//! On startup the cache is trimmed and replayed into the aggregates while
//! the live feed is already flowing. Everything runs on one
//! `current_thread` runtime; shutdown on Ctrl-C aborts the background
//! tasks and closes the cache.

mod error;
mod transport;

use std::path::PathBuf;
use std::sync::Arc;

use attackmap_core::{Dashboard, DashboardConfig, ScheduledTasks, TaskIntervals};
use attackmap_observer::{AppState, ServerConfig, spawn_observer};
use attackmap_types::SystemClock;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::ClientError;

/// Config file used when none is given on the command line.
const DEFAULT_CONFIG_PATH: &str = "attackmap.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, the event cache, or the snapshot
/// API fails to initialise.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), ClientError> {
    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("ATTACKMAP_CONFIG").ok())
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    let config = DashboardConfig::from_file(&config_path)?;

    init_logging(&config);
    info!(
        config = %config_path.display(),
        ws_url = %config.upstream.ws_url,
        observer_port = config.observer.port,
        "attackmap-client starting"
    );

    let dashboard = Arc::new(Dashboard::open(&config, Arc::new(SystemClock)).await?);
    info!(backend = ?dashboard.store().backend_kind(), "Event cache ready");

    // Restore trims the cache itself before replaying; live ingestion runs alongside it.
    let mut tasks =
        ScheduledTasks::spawn_maintenance(&dashboard, TaskIntervals::from_config(&config));

    let d = Arc::clone(&dashboard);
    tasks.insert(
        "restore",
        tokio::spawn(async move {
            if let Err(e) = d.restore_all().await {
                tracing::warn!(error = %e, "Startup restore failed");
            }
        }),
    );

    let server_config = ServerConfig {
        host: config.observer.host.clone(),
        port: config.observer.port,
    };
    let (observer, addr) =
        spawn_observer(&server_config, Arc::new(AppState::new(Arc::clone(&dashboard)))).await?;
    tasks.insert("observer", observer);
    info!(%addr, "Snapshot API ready");

    tasks.insert(
        "transport",
        tokio::spawn(transport::run(
            Arc::clone(&dashboard),
            config.upstream.ws_url.clone(),
        )),
    );

    info!(tasks = ?tasks.running(), "Dashboard running, press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;

    info!("Shutdown requested");
    tasks.shutdown().await;
    dashboard.store().close().await;
    info!("attackmap-client stopped");
    Ok(())
}

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` wins over the configured level.
fn init_logging(config: &DashboardConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    if config.logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}
