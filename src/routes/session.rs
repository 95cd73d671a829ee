// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Live session routes: lifecycle, fixes and heart rate.

use crate::error::{AppError, Result};
use crate::models::{Activity, ActivityType, LocationFix, TrackPoint};
use crate::AppState;
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/session", get(get_session).post(create_session))
        .route("/api/session/start", post(start_or_resume))
        .route("/api/session/pause", post(pause))
        .route("/api/session/stop", post(stop))
        .route("/api/session/resume-last", post(resume_last))
        .route("/api/session/fix", post(submit_fix))
        .route("/api/session/heart-rate", post(submit_heart_rate))
        .route("/api/session/heart-rate-device", post(connect_heart_rate))
}

// ─── Lifecycle ───────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct CreateSessionRequest {
    /// kg
    #[validate(range(exclusive_min = 0.0, max = 500.0))]
    pub user_weight: f64,
    pub activity_type: ActivityType,
}

/// Current activity plus the last stored point.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub activity: Activity,
    pub last_point: Option<TrackPoint>,
}

async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<Json<Activity>> {
    request
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let activity = state
        .tracker
        .start(request.user_weight, request.activity_type)
        .await?;
    Ok(Json(activity))
}

async fn get_session(State(state): State<Arc<AppState>>) -> Result<Json<SessionResponse>> {
    let activity = state
        .tracker
        .current_activity()
        .await?
        .ok_or_else(|| AppError::NotFound("No current activity".to_string()))?;
    let last_point = state.tracker.last_point().await?;

    Ok(Json(SessionResponse {
        activity,
        last_point,
    }))
}

async fn start_or_resume(State(state): State<Arc<AppState>>) -> Result<Json<Activity>> {
    Ok(Json(state.tracker.start_or_resume().await?))
}

async fn pause(State(state): State<Arc<AppState>>) -> Result<Json<Activity>> {
    Ok(Json(state.tracker.pause().await?))
}

async fn stop(State(state): State<Arc<AppState>>) -> Result<Json<Activity>> {
    Ok(Json(state.tracker.stop().await?))
}

async fn resume_last(State(state): State<Arc<AppState>>) -> Result<Json<Activity>> {
    state
        .tracker
        .resume_last()
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("No unfinished activity".to_string()))
}

// ─── Samples ─────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct FixResponse {
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub point: Option<TrackPoint>,
}

async fn submit_fix(
    State(state): State<Arc<AppState>>,
    Json(fix): Json<LocationFix>,
) -> Result<Json<FixResponse>> {
    let outcome = state.tracker.location_changed(fix).await?;
    Ok(Json(FixResponse {
        outcome: outcome.label(),
        point: outcome.stored_point().cloned(),
    }))
}

#[derive(Debug, Deserialize, Validate)]
pub struct HeartRateRequest {
    #[validate(range(max = 300))]
    pub bpm: u16,
}

#[derive(Debug, Serialize)]
pub struct HeartRateResponse {
    pub stored: bool,
}

async fn submit_heart_rate(
    State(state): State<Arc<AppState>>,
    Json(request): Json<HeartRateRequest>,
) -> Result<Json<HeartRateResponse>> {
    request
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let stored = state.tracker.heart_rate_changed(request.bpm).await?;
    Ok(Json(HeartRateResponse { stored }))
}

#[derive(Debug, Deserialize, Validate)]
pub struct HeartRateDeviceRequest {
    #[validate(length(min = 1, max = 64))]
    pub address: String,
}

#[derive(Debug, Serialize)]
pub struct HeartRateDeviceResponse {
    pub connected: bool,
}

async fn connect_heart_rate(
    State(state): State<Arc<AppState>>,
    Json(request): Json<HeartRateDeviceRequest>,
) -> Result<Json<HeartRateDeviceResponse>> {
    request
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let connected = state.tracker.connect_heart_rate(request.address).await?;
    Ok(Json(HeartRateDeviceResponse { connected }))
}
