//! Stove Watch - A smart stove safety monitor.
//!
//! Runs the flame monitor in the background and serves the location API.
//!
//! # API Endpoints
//!
//! - `POST /location` - Report a position and get the alert assessment
//! - `GET /status` - Flame monitor state
//! - `GET /health` - Health check

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use stove_watch::api::{AppState, router};
use stove_watch::config::Config;
use stove_watch::monitor::spawn_monitor;
use stove_watch::state::FlameCell;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing with environment filter
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("stove_watch=info".parse()?))
        .init();

    let config = Config::from_env()?;

    info!(
        port = config.port,
        home_lat = config.home.latitude,
        home_lon = config.home.longitude,
        distance_limit_m = config.distance_limit_m,
        video_path = %config.video_path.display(),
        "Starting Stove Watch"
    );

    let verdicts = FlameCell::new();
    let cancel = CancellationToken::new();

    let monitor = spawn_monitor(config.monitor(), verdicts.clone(), cancel.clone());

    let state = AppState {
        verdicts,
        evaluator: config.evaluator(),
        pixel_threshold: config.pixel_threshold,
    };
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;

    info!(%addr, "Stove Watch is listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await?;

    cancel.cancel();
    if let Err(e) = monitor.await {
        warn!(error = %e, "Flame monitor task ended abnormally");
    }

    info!("Stove Watch stopped");
    Ok(())
}

/// Resolves on Ctrl-C, cancelling the monitor as well.
async fn shutdown_signal(cancel: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        // Keep serving rather than shutting down immediately
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
    cancel.cancel();
}
