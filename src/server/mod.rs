//! HTTP API over the cached skin catalog.
//!
//! Handlers only read what refresh cycles left on disk. The server also
//! owns the periodic scheduler and kicks off a refresh at startup when the
//! catalog is empty.

mod error;
mod handlers;
mod routes;

pub use error::ApiError;
pub use routes::create_router;

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::info;

use crate::catalog::CatalogReader;
use crate::config::Settings;
use crate::refresh::{RefreshOrchestrator, TriggerOutcome};

/// Shared state for the web server.
#[derive(Clone)]
pub struct AppState {
    pub catalog: CatalogReader,
    pub orchestrator: Arc<RefreshOrchestrator>,
}

impl AppState {
    pub fn new(settings: &Settings) -> anyhow::Result<Self> {
        Ok(Self {
            catalog: CatalogReader::new(&settings.cache_dir),
            orchestrator: Arc::new(settings.create_orchestrator()?),
        })
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

/// Start the periodic scheduler, and an immediate background refresh if the
/// catalog on disk is empty. Returns the scheduler task.
pub fn start_background_tasks(state: &AppState) -> JoinHandle<()> {
    let scheduler = state.orchestrator.spawn_scheduler();
    info!(
        "Scheduler started, cache will refresh every {} hours",
        state.orchestrator.interval().as_secs() / 3600
    );

    if state.catalog.load_all().is_empty() {
        info!("Cache is empty, starting initial refresh");
        if let TriggerOutcome::AlreadyRunning(_) = state.orchestrator.trigger() {
            info!("Refresh already running");
        }
    }

    scheduler
}

/// Start the web server with the refresh scheduler.
pub async fn serve(settings: &Settings, host: &str, port: u16) -> anyhow::Result<()> {
    let state = AppState::new(settings)?;
    let scheduler = start_background_tasks(&state);

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind((host, port)).await?;
    info!("Starting server at http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.abort();
    Ok(())
}
