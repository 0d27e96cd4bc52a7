use anyhow::Result;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};

mod api;
mod cluster;
mod config;
mod db;
mod events;
mod runner;
mod state;

#[cfg(test)]
mod tests;

use config::AppConfig;
use db::Database;
use events::EventHub;
pub use state::{AppState, DaemonState, DaemonStatus};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cluster_mapper=info,tower_http=info".into()),
        )
        .init();

    info!("cluster-mapper v{} starting up", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load()?;
    info!(
        "Configuration loaded: port={}, db_path={}, max_mappings={}, search_timeout={}s",
        config.port, config.db_path, config.max_mappings, config.search_timeout_secs
    );

    let db = Database::open(&config.db_path)?;
    db.run_migrations()?;
    info!("Database initialized at {}", config.db_path);

    let recovered = db.recover_stale_runs()?;
    if recovered > 0 {
        warn!("Marked {} interrupted run(s) as failed", recovered);
    }

    let event_hub = EventHub::new(256);
    let state = Arc::new(AppState::new(db, config.clone(), event_hub));

    let app = api::router(state.clone());

    let bind_addr = format!("127.0.0.1:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Listening on {}", bind_addr);

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal(state.clone())).await?;

    // Let an in-flight search observe the cancellation and record its outcome.
    let task = state.background_task.lock().await.take();
    if let Some(task) = task {
        let _ = task.await;
    }

    info!("cluster-mapper shut down cleanly");
    Ok(())
}

/// Wait for SIGTERM or SIGINT, then cancel any running search.
async fn shutdown_signal(state: Arc<AppState>) {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { warn!("Received Ctrl+C, shutting down..."); },
        () = terminate => { warn!("Received SIGTERM, shutting down..."); },
    }

    state.request_cancel().await;
}
