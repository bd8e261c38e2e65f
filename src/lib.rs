//! Squeeze Shell - offline-capable shell for the short-squeeze tracker
//!
//! Hosts the dashboard's service worker: precaches the app shell, serves
//! it cache-first, refreshes signals in the background, and turns push
//! messages into notifications. A polling dashboard view-model keeps the
//! portfolio, opportunity and exit-signal panels current.

pub mod config;
pub mod dashboard;
pub mod db;
pub mod error;
pub mod net;
pub mod notify;
pub mod server;
pub mod worker;

use config::Config;
use dashboard::DashboardController;
use db::sqlite::SqliteDb;
use error::Result;
use net::{BackendClient, HttpNetwork, Network};
use notify::{ClientRegistry, NotificationCenter};
use server::{ShellServer, ShellState};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use worker::{Registration, WorkerContext};

/// Initialize tracing/logging
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "squeeze_shell=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Bring up the worker, the dashboard poller and the HTTP front, then
/// serve until ctrl-c
pub async fn run(config: Config) -> Result<()> {
    config.validate()?;
    tracing::info!("Starting Squeeze Shell ({})...", config.cache_version);

    std::fs::create_dir_all(&config.data_dir)?;
    let db = Arc::new(SqliteDb::new(&config.database_path())?);
    tracing::info!("Database ready at {}", config.database_path().display());

    let config = Arc::new(config);
    let network: Arc<dyn Network> = Arc::new(HttpNetwork::new(Duration::from_secs(
        config.http_timeout_secs,
    ))?);
    let notifications = Arc::new(NotificationCenter::new());
    let clients = Arc::new(ClientRegistry::new());

    let ctx = Arc::new(WorkerContext::new(
        config.clone(),
        db.clone(),
        network.clone(),
        notifications.clone(),
        clients.clone(),
    ));

    let mut registration = Registration::new();
    let worker = registration.register(ctx).await?;

    let backend = BackendClient::new(network, config.backend_url.clone());
    match backend.health().await {
        Ok(_) => tracing::info!("Backend reachable at {}", config.backend_url),
        // Offline start is fine: the shell is served from cache
        Err(e) => tracing::warn!("Backend not reachable at {}: {}", config.backend_url, e),
    }
    let dashboard = Arc::new(DashboardController::polling(
        backend,
        Duration::from_secs(config.poll_interval_secs),
    ));
    let poller = dashboard.clone();
    tokio::spawn(async move { poller.run().await });

    let mut server = ShellServer::new(ShellState {
        config: config.clone(),
        db,
        worker,
        notifications,
        dashboard: Some(dashboard),
    });
    server.start(config.listen_addr).await?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    server.stop();
    Ok(())
}
