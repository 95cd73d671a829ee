// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Raw location fixes and the aggregated samples stored along a track.

use geo::Point;
use serde::{Deserialize, Serialize};

/// One raw location sample reported by the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationFix {
    /// Fix time (ms epoch)
    pub timestamp: i64,
    pub latitude: f64,
    pub longitude: f64,
    /// Altitude in meters
    #[serde(default)]
    pub altitude: f64,
    /// Horizontal accuracy in meters, when the platform reports it
    #[serde(default)]
    pub accuracy: Option<f32>,
}

impl LocationFix {
    pub fn new(timestamp: i64, latitude: f64, longitude: f64, altitude: f64) -> Self {
        Self {
            timestamp,
            latitude,
            longitude,
            altitude,
            accuracy: None,
        }
    }

    /// Position as a geo point (x = longitude, y = latitude).
    pub fn position(&self) -> Point<f64> {
        Point::new(self.longitude, self.latitude)
    }
}

/// Aggregated sample stored on an activity's path.
///
/// `duration`, `distance` and `calories` are cumulative from the start of
/// the track; `speed` is instantaneous.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    pub id: String,
    pub activity_id: String,
    /// Source fix time (ms epoch)
    pub timestamp: i64,
    /// Elapsed track time (ms)
    pub duration: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    /// Distance in meters
    pub distance: u32,
    /// Speed in m/s
    pub speed: f64,
    /// Energy in kcal
    pub calories: f64,
}

impl TrackPoint {
    /// First point of a track: the fix position with zeroed aggregates.
    pub fn seed(activity_id: &str, fix: &LocationFix) -> Self {
        Self {
            id: new_id(),
            activity_id: activity_id.to_string(),
            timestamp: fix.timestamp,
            duration: 0,
            latitude: fix.latitude,
            longitude: fix.longitude,
            altitude: fix.altitude,
            distance: 0,
            speed: 0.0,
            calories: 0.0,
        }
    }

    /// New point at the fix position carrying this point's aggregates unchanged.
    pub fn moved_to(&self, fix: &LocationFix) -> Self {
        Self {
            id: new_id(),
            activity_id: self.activity_id.clone(),
            timestamp: fix.timestamp,
            duration: self.duration,
            latitude: fix.latitude,
            longitude: fix.longitude,
            altitude: fix.altitude,
            distance: self.distance,
            speed: self.speed,
            calories: self.calories,
        }
    }

    /// Position as a geo point (x = longitude, y = latitude).
    pub fn position(&self) -> Point<f64> {
        Point::new(self.longitude, self.latitude)
    }
}

/// Heart-rate reading recorded while an activity is running.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartRatePoint {
    pub id: String,
    pub activity_id: String,
    /// Beats per minute
    pub heart_rate: u16,
    /// Reading time (ms epoch)
    pub timestamp: i64,
}

impl HeartRatePoint {
    pub fn new(activity_id: &str, heart_rate: u16, timestamp: i64) -> Self {
        Self {
            id: new_id(),
            activity_id: activity_id.to_string(),
            heart_rate,
            timestamp,
        }
    }
}

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
