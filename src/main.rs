// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Route-Sync API Server
//!
//! Keeps a local store of simplified workout routes in sync with Strava and
//! serves them over HTTP.

use anyhow::Context;
use route_sync::{
    config::Config,
    db::{FileWatermarkStore, RouteStore, SqliteRouteStore, WatermarkStore},
    services::{ActivitySource, StravaSource, SyncCoordinator},
    AppState,
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!(port = config.port, "Starting Route-Sync API");

    // Open the route store
    let store = Arc::new(
        SqliteRouteStore::open(&config.database_path).context("Failed to open route store")?,
    );
    tracing::info!(path = %config.database_path, "Route store opened");

    let watermark: Arc<dyn WatermarkStore> =
        Arc::new(FileWatermarkStore::new(&config.settings_path));

    let source = Arc::new(StravaSource::new(
        config.strava_access_token.clone(),
        config.strava_api_url.clone(),
    ));

    match source.request_authorization().await {
        Ok(true) => {}
        Ok(false) => tracing::warn!("Strava refused access, syncs will fail until re-authorized"),
        Err(e) => tracing::warn!(error = %e, "Could not reach Strava, continuing"),
    }

    let settings = config.sync_settings();
    tracing::info!(
        concurrency = settings.concurrency,
        tolerance_meters = settings.tolerance_meters,
        deadline_secs = settings.deadline.as_secs(),
        "Sync settings"
    );
    let sync = Arc::new(
        SyncCoordinator::new(source, store, watermark, settings)
            .context("Failed to initialize sync coordinator")?,
    );

    // Initial import and periodic sync run alongside the server
    tokio::spawn(run_sync_loop(
        Arc::clone(&sync),
        config.sync_min_interval,
        config.sync_poll_interval,
    ));

    // Build shared state
    let state = Arc::new(AppState::new(config.clone(), sync));

    // Build router
    let app = route_sync::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Load history once, then check on every tick whether a sync is due.
async fn run_sync_loop<A: ActivitySource, S: RouteStore>(
    sync: Arc<SyncCoordinator<A, S>>,
    min_interval: Duration,
    poll_interval: Duration,
) {
    match sync.ensure_initial_data().await {
        Ok(_) => tracing::info!("Initial data ready"),
        Err(e) => tracing::error!(error = %e, "Initial import failed, will retry on schedule"),
    }

    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        if let Err(e) = sync.sync_if_due(min_interval).await {
            tracing::error!(error = %e, "Scheduled sync failed");
        }
    }
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("route_sync=debug,info"));

    tracing_subscriber::registry().with(filter).with(format).init();
}
