// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request};
use outdoor_tracker::config::Config;
use outdoor_tracker::db::{MemoryStore, TrackStore};
use outdoor_tracker::error::AppError;
use outdoor_tracker::models::{Activity, HeartRatePoint, TrackPoint};
use outdoor_tracker::routes::create_router;
use outdoor_tracker::services::{BroadcastSink, PushSource, Tracker, TrackerHandle, TrackerSettings};
use outdoor_tracker::time_utils::ManualClock;
use outdoor_tracker::AppState;
use std::sync::Arc;

/// Fixed test epoch (2023-11-14T22:13:20Z).
#[allow(dead_code)]
pub const T0: i64 = 1_700_000_000_000;

/// Engine wired to in-memory collaborators and a manual clock.
#[allow(dead_code)]
pub struct TestTracker {
    pub tracker: TrackerHandle,
    pub store: MemoryStore,
    pub clock: ManualClock,
    pub sink: BroadcastSink,
    pub source: PushSource,
}

/// Create a tracker over the given store.
#[allow(dead_code)]
pub fn test_tracker_with_store(store: MemoryStore) -> TestTracker {
    let clock = ManualClock::new(T0);
    let sink = BroadcastSink::new(64);
    let source = PushSource::new();

    let tracker = Tracker::builder(Arc::new(store.clone()))
        .settings(TrackerSettings::from_config(&Config::test_default()))
        .clock(Arc::new(clock.clone()))
        .location_source(Arc::new(source.clone()))
        .heart_rate_source(Arc::new(source.clone()))
        .sink(Arc::new(sink.clone()))
        .rng_seed(42)
        .spawn();

    TestTracker {
        tracker,
        store,
        clock,
        sink,
        source,
    }
}

#[allow(dead_code)]
pub fn test_tracker() -> TestTracker {
    test_tracker_with_store(MemoryStore::new())
}

/// Create a test app backed by a fresh in-memory store.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    create_test_app_with_store(MemoryStore::new())
}

#[allow(dead_code)]
pub fn create_test_app_with_store(store: MemoryStore) -> (axum::Router, Arc<AppState>) {
    let harness = test_tracker_with_store(store.clone());
    let store: Arc<dyn TrackStore> = Arc::new(store);

    let state = Arc::new(AppState {
        config: Config::test_default(),
        store,
        tracker: harness.tracker,
    });

    (create_router(state.clone()), state)
}

/// Create a test app over any store.
#[allow(dead_code)]
pub fn create_test_app_with_backend(store: Arc<dyn TrackStore>) -> (axum::Router, Arc<AppState>) {
    let tracker = Tracker::builder(store.clone())
        .settings(TrackerSettings::from_config(&Config::test_default()))
        .clock(Arc::new(ManualClock::new(T0)))
        .rng_seed(42)
        .spawn();

    let state = Arc::new(AppState {
        config: Config::test_default(),
        store,
        tracker,
    });

    (create_router(state.clone()), state)
}

/// Store whose track point writes always fail; everything else works.
#[allow(dead_code)]
#[derive(Clone, Default)]
pub struct FailingPointStore {
    pub inner: MemoryStore,
}

#[async_trait]
impl TrackStore for FailingPointStore {
    async fn upsert_activity(&self, activity: &Activity) -> Result<(), AppError> {
        self.inner.upsert_activity(activity).await
    }

    async fn get_activity(&self, activity_id: &str) -> Result<Option<Activity>, AppError> {
        self.inner.get_activity(activity_id).await
    }

    async fn last_activity(&self) -> Result<Option<Activity>, AppError> {
        self.inner.last_activity().await
    }

    async fn activities_to_sync(&self) -> Result<Vec<Activity>, AppError> {
        self.inner.activities_to_sync().await
    }

    async fn activity_by_server_id(
        &self,
        server_id: &str,
    ) -> Result<Option<Activity>, AppError> {
        self.inner.activity_by_server_id(server_id).await
    }

    async fn delete_activity(&self, activity_id: &str) -> Result<(), AppError> {
        self.inner.delete_activity(activity_id).await
    }

    async fn upsert_point(&self, _point: &TrackPoint) -> Result<(), AppError> {
        Err(AppError::Database("point table unavailable".to_string()))
    }

    async fn upsert_points(&self, _points: &[TrackPoint]) -> Result<(), AppError> {
        Err(AppError::Database("point table unavailable".to_string()))
    }

    async fn recent_points(
        &self,
        activity_id: &str,
        count: usize,
    ) -> Result<Vec<TrackPoint>, AppError> {
        self.inner.recent_points(activity_id, count).await
    }

    async fn points(&self, activity_id: &str) -> Result<Vec<TrackPoint>, AppError> {
        self.inner.points(activity_id).await
    }

    async fn add_heart_rate_point(&self, point: &HeartRatePoint) -> Result<(), AppError> {
        self.inner.add_heart_rate_point(point).await
    }

    async fn add_heart_rate_points(&self, points: &[HeartRatePoint]) -> Result<(), AppError> {
        self.inner.add_heart_rate_points(points).await
    }

    async fn heart_rate_points(
        &self,
        activity_id: &str,
    ) -> Result<Vec<HeartRatePoint>, AppError> {
        self.inner.heart_rate_points(activity_id).await
    }
}

/// JSON POST request.
#[allow(dead_code)]
pub fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Bodyless request.
#[allow(dead_code)]
pub fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Read a response body as JSON.
#[allow(dead_code)]
pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}
