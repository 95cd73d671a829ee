// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Outdoor-Tracker API Server
//!
//! Runs the tracking engine and exposes it over HTTP so a phone or a
//! simulator can push fixes and drive the session lifecycle.

use outdoor_tracker::{
    config::Config,
    db::{MemoryStore, TrackStore},
    services::{BroadcastSink, PushSource, Tracker, TrackerEvent, TrackerSettings},
    AppState,
};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting Outdoor-Tracker API");

    let store: Arc<dyn TrackStore> = Arc::new(MemoryStore::new());

    // Event fan-out; the logger below is the only local subscriber
    let sink = BroadcastSink::new(256);
    tokio::spawn(log_events(sink.subscribe()));

    let source = Arc::new(PushSource::new());
    let settings = TrackerSettings::from_config(&config);
    let tracker = Tracker::builder(store.clone())
        .settings(settings)
        .location_source(source.clone())
        .heart_rate_source(source)
        .sink(Arc::new(sink))
        .spawn();
    tracing::info!(
        min_point_interval_ms = settings.ingest.min_point_interval_ms,
        jump_distance_m = settings.ingest.jump_distance_m,
        tick_interval_ms = settings.tick_interval.as_millis() as u64,
        "Tracking engine started"
    );

    // Pick up an activity left unfinished by a previous run
    match tracker.resume_last().await {
        Ok(Some(activity)) => {
            tracing::info!(activity_id = %activity.id, "Resumed unfinished activity")
        }
        Ok(None) => {}
        Err(e) => tracing::warn!(error = %e, "Could not check for unfinished activity"),
    }

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        store,
        tracker,
    });

    // Build router
    let app = outdoor_tracker::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Log tracker events until the engine goes away.
async fn log_events(mut events: tokio::sync::broadcast::Receiver<TrackerEvent>) {
    loop {
        match events.recv().await {
            Ok(TrackerEvent::StatusChanged(activity)) => tracing::info!(
                activity_id = %activity.id,
                status = ?activity.status(),
                "Activity status changed"
            ),
            Ok(TrackerEvent::PointReceived(point)) => tracing::trace!(
                activity_id = %point.activity_id,
                duration_ms = point.duration,
                distance_m = point.distance,
                "Live snapshot"
            ),
            Ok(TrackerEvent::HeartRateReceived(bpm)) => tracing::trace!(bpm, "Live heart rate"),
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Event logger fell behind")
            }
            Err(RecvError::Closed) => break,
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

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("outdoor_tracker=debug,info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(format)
        .init();
}
