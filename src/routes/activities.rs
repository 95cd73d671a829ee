// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Stored activity history.

use crate::error::{AppError, Result};
use crate::models::{Activity, HeartRatePoint, TrackPoint};
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/activities/last", get(get_last_activity))
        .route("/api/activities/unsynced", get(get_unsynced))
        .route(
            "/api/activities/{id}",
            get(get_activity).delete(delete_activity),
        )
        .route("/api/activities/{id}/points", get(get_points))
        .route("/api/activities/{id}/heart-rate", get(get_heart_rate))
}

async fn get_last_activity(State(state): State<Arc<AppState>>) -> Result<Json<Activity>> {
    state
        .store
        .last_activity()
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("No activities recorded".to_string()))
}

async fn get_unsynced(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Activity>>> {
    Ok(Json(state.store.activities_to_sync().await?))
}

async fn find_activity(state: &AppState, id: &str) -> Result<Activity> {
    state
        .store
        .get_activity(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Activity {} not found", id)))
}

async fn get_activity(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Activity>> {
    Ok(Json(find_activity(&state, &id).await?))
}

async fn get_points(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<TrackPoint>>> {
    find_activity(&state, &id).await?;
    Ok(Json(state.store.points(&id).await?))
}

async fn get_heart_rate(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<HeartRatePoint>>> {
    find_activity(&state, &id).await?;
    Ok(Json(state.store.heart_rate_points(&id).await?))
}

/// Delete a finished activity with its samples.
///
/// The activity being tracked cannot be deleted.
async fn delete_activity(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    find_activity(&state, &id).await?;

    let tracked = state.tracker.current_activity().await?;
    if tracked.is_some_and(|activity| activity.id == id) {
        return Err(AppError::Precondition(format!(
            "Activity {} is being tracked, stop it first",
            id
        )));
    }

    state.store.delete_activity(&id).await?;
    tracing::info!(activity_id = %id, "Activity deleted");
    Ok(StatusCode::NO_CONTENT)
}
