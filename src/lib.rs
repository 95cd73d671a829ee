// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Outdoor-Tracker: track walks, runs and rides from GPS fixes
//!
//! This crate provides the activity-tracking engine (session lifecycle,
//! point ingestion, calorie and power formulas) and a small HTTP API that
//! lets a phone or simulator drive it.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::TrackStore;
use services::TrackerHandle;
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn TrackStore>,
    pub tracker: TrackerHandle,
}
