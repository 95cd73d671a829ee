// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process store backed by concurrent maps.
//!
//! Keeps:
//! - Activities (keyed by activity id)
//! - Track points (per activity, ordered by timestamp)
//! - Heart-rate readings (per activity, ordered by timestamp)

use crate::db::TrackStore;
use crate::error::AppError;
use crate::models::{Activity, HeartRatePoint, TrackPoint};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Default)]
struct Tables {
    activities: DashMap<String, Activity>,
    points: DashMap<String, Vec<TrackPoint>>,
    heart_rate: DashMap<String, Vec<HeartRatePoint>>,
}

/// In-memory [`TrackStore`]. Clones share the same tables.
#[derive(Clone)]
pub struct MemoryStore {
    tables: Option<Arc<Tables>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: Some(Arc::new(Tables::default())),
        }
    }

    /// Store that fails every operation (offline mode).
    pub fn offline() -> Self {
        Self { tables: None }
    }

    /// Helper to get the tables or return an error if offline.
    fn tables(&self) -> Result<&Tables, AppError> {
        self.tables
            .as_deref()
            .ok_or_else(|| AppError::Database("Store not available (offline mode)".to_string()))
    }

    /// Write points without re-sorting; returns the activities touched.
    fn put_points<'a>(tables: &Tables, points: &'a [TrackPoint]) -> HashSet<&'a str> {
        let mut touched = HashSet::new();
        for point in points {
            let mut track = tables.points.entry(point.activity_id.clone()).or_default();
            put_row(track.value_mut(), point, point_id);
            touched.insert(point.activity_id.as_str());
        }
        touched
    }

    fn put_heart_rate<'a>(tables: &Tables, points: &'a [HeartRatePoint]) -> HashSet<&'a str> {
        let mut touched = HashSet::new();
        for point in points {
            let mut readings = tables
                .heart_rate
                .entry(point.activity_id.clone())
                .or_default();
            put_row(readings.value_mut(), point, reading_id);
            touched.insert(point.activity_id.as_str());
        }
        touched
    }
}

fn point_id(point: &TrackPoint) -> &str {
    &point.id
}

fn reading_id(point: &HeartRatePoint) -> &str {
    &point.id
}

/// Replace the row with the same id, or append it.
fn put_row<T: Clone>(rows: &mut Vec<T>, row: &T, id: fn(&T) -> &str) {
    let key = id(row);
    match rows.iter_mut().find(|existing| id(existing) == key) {
        Some(existing) => *existing = row.clone(),
        None => rows.push(row.clone()),
    }
}

#[async_trait]
impl TrackStore for MemoryStore {
    // ─── Activity Operations ─────────────────────────────────────

    async fn upsert_activity(&self, activity: &Activity) -> Result<(), AppError> {
        self.tables()?
            .activities
            .insert(activity.id.clone(), activity.clone());
        Ok(())
    }

    async fn get_activity(&self, activity_id: &str) -> Result<Option<Activity>, AppError> {
        Ok(self
            .tables()?
            .activities
            .get(activity_id)
            .map(|entry| entry.value().clone()))
    }

    async fn last_activity(&self) -> Result<Option<Activity>, AppError> {
        Ok(self
            .tables()?
            .activities
            .iter()
            .max_by_key(|entry| entry.value().created_at)
            .map(|entry| entry.value().clone()))
    }

    async fn activities_to_sync(&self) -> Result<Vec<Activity>, AppError> {
        let mut pending: Vec<Activity> = self
            .tables()?
            .activities
            .iter()
            .filter(|entry| !entry.value().is_synced())
            .map(|entry| entry.value().clone())
            .collect();
        pending.sort_by_key(|a| a.created_at);
        Ok(pending)
    }

    async fn activity_by_server_id(
        &self,
        server_id: &str,
    ) -> Result<Option<Activity>, AppError> {
        Ok(self
            .tables()?
            .activities
            .iter()
            .find(|entry| entry.value().server_id.as_deref() == Some(server_id))
            .map(|entry| entry.value().clone()))
    }

    async fn delete_activity(&self, activity_id: &str) -> Result<(), AppError> {
        let tables = self.tables()?;
        tables.activities.remove(activity_id);
        tables.points.remove(activity_id);
        tables.heart_rate.remove(activity_id);
        tracing::debug!(activity_id, "Deleted activity and its samples");
        Ok(())
    }

    // ─── Track Point Operations ──────────────────────────────────

    async fn upsert_point(&self, point: &TrackPoint) -> Result<(), AppError> {
        self.upsert_points(std::slice::from_ref(point)).await
    }

    async fn upsert_points(&self, points: &[TrackPoint]) -> Result<(), AppError> {
        let tables = self.tables()?;
        for activity_id in Self::put_points(tables, points) {
            if let Some(mut track) = tables.points.get_mut(activity_id) {
                track.sort_by_key(|p| p.timestamp);
            }
        }
        Ok(())
    }

    async fn recent_points(
        &self,
        activity_id: &str,
        count: usize,
    ) -> Result<Vec<TrackPoint>, AppError> {
        Ok(self
            .tables()?
            .points
            .get(activity_id)
            .map(|track| track.iter().rev().take(count).cloned().collect())
            .unwrap_or_default())
    }

    async fn points(&self, activity_id: &str) -> Result<Vec<TrackPoint>, AppError> {
        Ok(self
            .tables()?
            .points
            .get(activity_id)
            .map(|track| track.value().clone())
            .unwrap_or_default())
    }

    // ─── Heart Rate Operations ───────────────────────────────────

    async fn add_heart_rate_point(&self, point: &HeartRatePoint) -> Result<(), AppError> {
        self.add_heart_rate_points(std::slice::from_ref(point)).await
    }

    async fn add_heart_rate_points(&self, points: &[HeartRatePoint]) -> Result<(), AppError> {
        let tables = self.tables()?;
        for activity_id in Self::put_heart_rate(tables, points) {
            if let Some(mut readings) = tables.heart_rate.get_mut(activity_id) {
                readings.sort_by_key(|p| p.timestamp);
            }
        }
        Ok(())
    }

    async fn heart_rate_points(
        &self,
        activity_id: &str,
    ) -> Result<Vec<HeartRatePoint>, AppError> {
        Ok(self
            .tables()?
            .heart_rate
            .get(activity_id)
            .map(|readings| readings.value().clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ActivityConfig, ActivityType, LocationFix};
    use chrono::{Duration, Utc};

    fn point(activity_id: &str, timestamp: i64) -> TrackPoint {
        TrackPoint::seed(activity_id, &LocationFix::new(timestamp, 45.0, 9.0, 0.0))
    }

    #[tokio::test]
    async fn test_upsert_point_replaces_same_id() {
        let store = MemoryStore::new();
        let first = point("a", 1_000);
        let mut second = point("a", 4_000);
        store.upsert_point(&first).await.unwrap();
        store.upsert_point(&second).await.unwrap();

        second.timestamp = 7_000;
        second.distance = 12;
        store.upsert_point(&second).await.unwrap();

        let points = store.points("a").await.unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[1].timestamp, 7_000);
        assert_eq!(points[1].distance, 12);
    }

    #[tokio::test]
    async fn test_recent_points_are_newest_first() {
        let store = MemoryStore::new();
        for ts in [3_000, 1_000, 2_000] {
            store.upsert_point(&point("a", ts)).await.unwrap();
        }

        let recent = store.recent_points("a", 2).await.unwrap();
        let timestamps: Vec<i64> = recent.iter().map(|p| p.timestamp).collect();
        assert_eq!(timestamps, vec![3_000, 2_000]);
        assert!(store.recent_points("missing", 2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_last_activity_and_sync_queue() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let older = Activity::new(ActivityConfig::new(70.0, ActivityType::Walking), now);
        let mut newer = Activity::new(
            ActivityConfig::new(70.0, ActivityType::Bicycle),
            now + Duration::minutes(5),
        );
        newer.server_id = Some("srv-1".to_string());
        store.upsert_activity(&older).await.unwrap();
        store.upsert_activity(&newer).await.unwrap();

        let last = store.last_activity().await.unwrap().unwrap();
        assert_eq!(last.id, newer.id);

        let pending = store.activities_to_sync().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, older.id);
    }

    #[tokio::test]
    async fn test_delete_activity_cascades() {
        let store = MemoryStore::new();
        let activity = Activity::new(ActivityConfig::new(70.0, ActivityType::Running), Utc::now());
        store.upsert_activity(&activity).await.unwrap();
        store.upsert_point(&point(&activity.id, 1_000)).await.unwrap();
        store
            .add_heart_rate_point(&HeartRatePoint::new(&activity.id, 120, 1_000))
            .await
            .unwrap();

        store.delete_activity(&activity.id).await.unwrap();

        assert!(store.get_activity(&activity.id).await.unwrap().is_none());
        assert!(store.points(&activity.id).await.unwrap().is_empty());
        assert!(store.heart_rate_points(&activity.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_import_synced_activity() {
        let store = MemoryStore::new();
        let mut activity =
            Activity::new(ActivityConfig::new(65.0, ActivityType::Bicycle), Utc::now());
        activity.server_id = Some("remote-42".to_string());
        store.upsert_activity(&activity).await.unwrap();

        let track: Vec<TrackPoint> = [9_000, 3_000, 6_000]
            .into_iter()
            .map(|ts| point(&activity.id, ts))
            .collect();
        store.upsert_points(&track).await.unwrap();
        let readings = [
            HeartRatePoint::new(&activity.id, 140, 5_000),
            HeartRatePoint::new(&activity.id, 120, 2_000),
        ];
        store.add_heart_rate_points(&readings).await.unwrap();

        let found = store.activity_by_server_id("remote-42").await.unwrap().unwrap();
        assert_eq!(found.id, activity.id);
        assert!(store.activity_by_server_id("remote-7").await.unwrap().is_none());
        assert!(store.activities_to_sync().await.unwrap().is_empty());

        let timestamps: Vec<i64> = store
            .points(&activity.id)
            .await
            .unwrap()
            .iter()
            .map(|p| p.timestamp)
            .collect();
        assert_eq!(timestamps, vec![3_000, 6_000, 9_000]);

        let bpm: Vec<u16> = store
            .heart_rate_points(&activity.id)
            .await
            .unwrap()
            .iter()
            .map(|p| p.heart_rate)
            .collect();
        assert_eq!(bpm, vec![120, 140]);
    }

    #[tokio::test]
    async fn test_bulk_upsert_replaces_same_id() {
        let store = MemoryStore::new();
        let mut first = point("a", 1_000);
        store.upsert_points(&[first.clone(), point("a", 2_000)]).await.unwrap();

        first.distance = 40;
        store.upsert_points(&[first, point("b", 500)]).await.unwrap();

        let track = store.points("a").await.unwrap();
        assert_eq!(track.len(), 2);
        assert_eq!(track[0].distance, 40);
        assert_eq!(store.points("b").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_offline_store_fails() {
        let store = MemoryStore::offline();
        let result = store.points("a").await;
        assert!(matches!(result, Err(AppError::Database(_))));
    }
}
