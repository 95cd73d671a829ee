// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Point ingestion pipeline.
//!
//! Turns a raw [`LocationFix`] into a stored [`TrackPoint`]:
//! 1. Seed the track with the first fix
//! 2. Drop fixes that arrive too soon after the last stored point
//! 3. Re-anchor (no aggregates) on the first fix after a pause
//! 4. Compute distance, speed and energy for the segment
//! 5. Add a new vertex or slide the last one forward

use crate::db::TrackStore;
use crate::models::{ActivityStatus, ActivityType, LocationFix, TrackPoint};
use crate::services::formula::{
    bicycle_calories, calories_from_mets, mets_from_vo2, ms_to_kmh, segment_power, vo2_acsm,
};
use crate::services::session::Session;
use crate::services::simplify::{placement, Placement};
use geo::{Distance, Geodesic};
use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;

/// Tunables for the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestSettings {
    /// Minimum time between stored points, ms
    pub min_point_interval_ms: i64,
    /// Fix-to-fix distance that always adds a vertex, meters
    pub jump_distance_m: u32,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            min_point_interval_ms: 3_000,
            jump_distance_m: 1_000,
        }
    }
}

/// What happened to a fix.
#[derive(Debug, Clone, PartialEq)]
pub enum FixOutcome {
    /// No current activity; fix dropped.
    NoActivity,
    /// Activity exists but is not started; fix dropped.
    Inactive,
    /// First point of the track.
    Seeded(TrackPoint),
    /// Arrived less than the minimum interval after the last point.
    TooSoon { delta_ms: i64 },
    /// First point after a pause, aggregates carried over unchanged.
    Reanchored(TrackPoint),
    /// Appended as a new vertex.
    Added(TrackPoint),
    /// Overwrote the newest vertex.
    Replaced(TrackPoint),
    /// The point could not be stored; the track is unchanged.
    Dropped,
}

impl FixOutcome {
    /// The point written to the store, if any.
    pub fn stored_point(&self) -> Option<&TrackPoint> {
        match self {
            FixOutcome::Seeded(p)
            | FixOutcome::Reanchored(p)
            | FixOutcome::Added(p)
            | FixOutcome::Replaced(p) => Some(p),
            FixOutcome::NoActivity
            | FixOutcome::Inactive
            | FixOutcome::TooSoon { .. }
            | FixOutcome::Dropped => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FixOutcome::NoActivity => "no_activity",
            FixOutcome::Inactive => "inactive",
            FixOutcome::Seeded(_) => "seeded",
            FixOutcome::TooSoon { .. } => "too_soon",
            FixOutcome::Reanchored(_) => "reanchored",
            FixOutcome::Added(_) => "added",
            FixOutcome::Replaced(_) => "replaced",
            FixOutcome::Dropped => "dropped",
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum IngestError {
    #[error("Invalid coordinate ({latitude}, {longitude})")]
    InvalidCoordinate { latitude: f64, longitude: f64 },

    #[error("Invalid altitude {0}")]
    InvalidAltitude(f64),

    #[error("Fix at {fix} is older than last point at {last}")]
    OutOfOrder { last: i64, fix: i64 },

    #[error("Failed to store point: {0}")]
    Storage(String),
}

/// Reject fixes that cannot be placed on the globe.
pub fn validate_fix(fix: &LocationFix) -> Result<(), IngestError> {
    let lat_ok = fix.latitude.is_finite() && (-90.0..=90.0).contains(&fix.latitude);
    let lon_ok = fix.longitude.is_finite() && (-180.0..=180.0).contains(&fix.longitude);
    if !lat_ok || !lon_ok {
        return Err(IngestError::InvalidCoordinate {
            latitude: fix.latitude,
            longitude: fix.longitude,
        });
    }
    if !fix.altitude.is_finite() {
        return Err(IngestError::InvalidAltitude(fix.altitude));
    }
    Ok(())
}

/// Fix-to-fix distance in whole meters (truncated).
pub fn delta_distance_m(from: &TrackPoint, to: &LocationFix) -> u32 {
    let meters = Geodesic.distance(from.position(), to.position());
    if meters.is_finite() && meters > 0.0 {
        meters as u32
    } else {
        0
    }
}

/// Stateful ingestor; owns the RNG used for bicycle efficiency.
pub struct PointIngestor {
    settings: IngestSettings,
    rng: StdRng,
}

impl PointIngestor {
    pub fn new(settings: IngestSettings) -> Self {
        Self {
            settings,
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic ingestor for tests and benchmarks.
    pub fn with_seed(settings: IngestSettings, seed: u64) -> Self {
        Self {
            settings,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Run one fix through the pipeline.
    ///
    /// On success the stored point becomes the session's last point.
    pub async fn ingest(
        &mut self,
        session: &mut Session,
        fix: &LocationFix,
        store: &dyn TrackStore,
        now: i64,
    ) -> Result<FixOutcome, IngestError> {
        let Some(activity) = session.activity() else {
            return Ok(FixOutcome::NoActivity);
        };
        if activity.status() != ActivityStatus::Started {
            return Ok(FixOutcome::Inactive);
        }
        validate_fix(fix)?;

        let activity_id = activity.id.clone();
        let user_weight = activity.config.user_weight;
        let activity_type = activity.config.activity_type;
        let paused = activity.config.paused;

        let Some(last) = session.last_point().cloned() else {
            let seed = TrackPoint::seed(&activity_id, fix);
            persist_point(store, &seed).await?;
            tracing::debug!(activity_id = %activity_id, point_id = %seed.id, "Seeded track");
            session.set_last_point(seed.clone());
            return Ok(FixOutcome::Seeded(seed));
        };

        let delta_ms = fix.timestamp - last.timestamp;
        if delta_ms < 0 {
            return Err(IngestError::OutOfOrder {
                last: last.timestamp,
                fix: fix.timestamp,
            });
        }
        if delta_ms < self.settings.min_point_interval_ms {
            return Ok(FixOutcome::TooSoon { delta_ms });
        }

        if paused {
            let anchor = last.moved_to(fix);
            persist_point(store, &anchor).await?;
            session.set_last_point(anchor.clone());
            if let Some(updated) = session.clear_paused_flag(now) {
                if let Err(e) = store.upsert_activity(&updated).await {
                    tracing::warn!(
                        activity_id = %activity_id,
                        error = %e,
                        "Failed to persist activity after re-anchor"
                    );
                }
            }
            tracing::debug!(activity_id = %activity_id, "Re-anchored track after pause");
            return Ok(FixOutcome::Reanchored(anchor));
        }

        let delta_distance = delta_distance_m(&last, fix);
        let seconds = delta_ms / 1000;
        let speed = f64::from(delta_distance) / seconds.max(1) as f64;

        let delta_calories = match activity_type {
            ActivityType::Bicycle => {
                let power = segment_power(
                    f64::from(delta_distance),
                    fix.altitude - last.altitude,
                    user_weight,
                    speed,
                );
                bicycle_calories(power, seconds, &mut self.rng)
            }
            ActivityType::Walking | ActivityType::Running => {
                let mets = mets_from_vo2(vo2_acsm(ms_to_kmh(speed), 0.0));
                calories_from_mets(mets, seconds, user_weight)
            }
        };

        let mut candidate = TrackPoint {
            duration: last.duration + delta_ms,
            distance: last.distance + delta_distance,
            speed,
            calories: last.calories + f64::from(delta_calories),
            ..last.moved_to(fix)
        };

        let recent = store
            .recent_points(&activity_id, 2)
            .await
            .map_err(|e| IngestError::Storage(e.to_string()))?;

        let placed = placement(
            &recent,
            &candidate,
            delta_distance,
            self.settings.jump_distance_m,
        );
        if placed == Placement::Replace {
            candidate.id = last.id.clone();
        }

        persist_point(store, &candidate).await?;
        session.set_last_point(candidate.clone());

        Ok(match placed {
            Placement::Add => FixOutcome::Added(candidate),
            Placement::Replace => FixOutcome::Replaced(candidate),
        })
    }
}

async fn persist_point(store: &dyn TrackStore, point: &TrackPoint) -> Result<(), IngestError> {
    store
        .upsert_point(point)
        .await
        .map_err(|e| IngestError::Storage(e.to_string()))
}
