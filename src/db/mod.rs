// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Persistence layer for activities, track points and heart-rate readings.

pub mod memory;

pub use memory::MemoryStore;

use crate::error::AppError;
use crate::models::{Activity, HeartRatePoint, TrackPoint};
use async_trait::async_trait;

/// Durable storage used by the tracking engine.
///
/// Writes are idempotent on record id: writing a record whose id already
/// exists replaces it.
#[async_trait]
pub trait TrackStore: Send + Sync {
    /// Create or update an activity.
    async fn upsert_activity(&self, activity: &Activity) -> Result<(), AppError>;

    /// Get an activity by id.
    async fn get_activity(&self, activity_id: &str) -> Result<Option<Activity>, AppError>;

    /// Most recently created activity, whatever its status.
    async fn last_activity(&self) -> Result<Option<Activity>, AppError>;

    /// Activities not yet assigned a server id.
    async fn activities_to_sync(&self) -> Result<Vec<Activity>, AppError>;

    /// Activity already imported from the server under `server_id`.
    async fn activity_by_server_id(&self, server_id: &str)
        -> Result<Option<Activity>, AppError>;

    /// Delete an activity together with its points and heart-rate readings.
    async fn delete_activity(&self, activity_id: &str) -> Result<(), AppError>;

    /// Append a point, or replace the stored point with the same id.
    async fn upsert_point(&self, point: &TrackPoint) -> Result<(), AppError>;

    /// Bulk [`TrackStore::upsert_point`], used when importing a track.
    async fn upsert_points(&self, points: &[TrackPoint]) -> Result<(), AppError>;

    /// Up to `count` most recent points of an activity, newest first.
    async fn recent_points(
        &self,
        activity_id: &str,
        count: usize,
    ) -> Result<Vec<TrackPoint>, AppError>;

    /// All points of an activity ordered by timestamp.
    async fn points(&self, activity_id: &str) -> Result<Vec<TrackPoint>, AppError>;

    /// Append a heart-rate reading.
    async fn add_heart_rate_point(&self, point: &HeartRatePoint) -> Result<(), AppError>;

    /// Bulk [`TrackStore::add_heart_rate_point`].
    async fn add_heart_rate_points(&self, points: &[HeartRatePoint]) -> Result<(), AppError>;

    /// All heart-rate readings of an activity ordered by timestamp.
    async fn heart_rate_points(&self, activity_id: &str)
        -> Result<Vec<HeartRatePoint>, AppError>;
}
