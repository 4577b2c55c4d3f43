//! Waypoint - local-first job application tracker
//!
//! Headless entry point: builds the application context, re-hydrates
//! reminder timers and keeps the reminder machinery alive until the
//! process is interrupted.

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use waypoint_app::AppContext;
use waypoint_domain::{Result, WaypointError};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(err) = run().await {
        error!(error = %err, "Waypoint failed to run");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let config = waypoint_infra::config::load()?;
    info!(data_dir = %config.database.data_dir, "Starting Waypoint");

    let context = Arc::new(AppContext::new_with_config(config).await?);

    let health = context.health_check().await;
    info!(score = health.score, healthy = health.is_healthy, "Startup health check");

    info!("Waypoint ready; press Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .map_err(|err| WaypointError::Internal(format!("failed to listen for shutdown: {err}")))?;

    info!("Shutdown signal received");
    context.shutdown().await?;
    Ok(())
}
