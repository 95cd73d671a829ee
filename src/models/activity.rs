// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Tracked activity model and its per-session configuration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of outdoor activity. Selects the calorie model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    Walking,
    Running,
    Bicycle,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::Walking => "walking",
            ActivityType::Running => "running",
            ActivityType::Bicycle => "bicycle",
        }
    }
}

/// Lifecycle status persisted with the activity.
///
/// A freshly created activity is `Ended` until it is started for the
/// first time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityStatus {
    #[default]
    Ended,
    Started,
    Paused,
}

/// Per-session tracking configuration and timing bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityConfig {
    /// User weight in kg, fixed for the session
    pub user_weight: f64,
    /// Activity type, fixed for the session
    pub activity_type: ActivityType,
    /// Heart-rate device address, if one was connected
    #[serde(default)]
    pub hr_device_address: Option<String>,
    /// First start (ms epoch), 0 while unset
    #[serde(default)]
    pub start_time: i64,
    /// Start of the current pause (ms epoch), 0 when not paused
    #[serde(default)]
    pub pause_time: i64,
    /// Total time spent paused (ms)
    #[serde(default)]
    pub pause_duration: i64,
    /// Set on pause, cleared by the first fix after resuming
    #[serde(default)]
    pub paused: bool,
    #[serde(default)]
    pub status: ActivityStatus,
}

impl ActivityConfig {
    pub fn new(user_weight: f64, activity_type: ActivityType) -> Self {
        Self {
            user_weight,
            activity_type,
            hr_device_address: None,
            start_time: 0,
            pause_time: 0,
            pause_duration: 0,
            paused: false,
            status: ActivityStatus::Ended,
        }
    }

    /// Pause time accumulated up to `now`, including a pause still open.
    pub fn pause_duration_at(&self, now: i64) -> i64 {
        if self.pause_time != 0 {
            self.pause_duration + (now - self.pause_time)
        } else {
            self.pause_duration
        }
    }
}

/// Stored activity record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    /// UUID v4
    pub id: String,
    /// Identifier assigned by a remote backend once synced
    #[serde(default)]
    pub server_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Active time in ms (excludes pauses)
    #[serde(default)]
    pub duration: i64,
    /// Distance in meters
    #[serde(default)]
    pub distance: u32,
    /// Average speed in m/s
    #[serde(default)]
    pub avg_speed: f64,
    /// Energy in kcal
    #[serde(default)]
    pub calories: u32,
    pub config: ActivityConfig,
}

impl Activity {
    /// Create a new, not yet started activity.
    pub fn new(config: ActivityConfig, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            server_id: None,
            created_at: now,
            updated_at: now,
            duration: 0,
            distance: 0,
            avg_speed: 0.0,
            calories: 0,
            config,
        }
    }

    pub fn status(&self) -> ActivityStatus {
        self.config.status
    }

    /// True unless the activity has ended.
    pub fn is_running(&self) -> bool {
        self.config.status != ActivityStatus::Ended
    }

    /// Whether a remote backend already knows this activity.
    pub fn is_synced(&self) -> bool {
        self.server_id.as_deref().is_some_and(|id| !id.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_activity_is_ended_placeholder() {
        let activity = Activity::new(
            ActivityConfig::new(70.0, ActivityType::Running),
            Utc::now(),
        );
        assert_eq!(activity.status(), ActivityStatus::Ended);
        assert!(!activity.is_running());
        assert_eq!(activity.config.start_time, 0);
        assert!(!activity.is_synced());
    }

    #[test]
    fn test_pause_duration_includes_open_pause() {
        let mut config = ActivityConfig::new(70.0, ActivityType::Walking);
        config.pause_duration = 2_000;
        assert_eq!(config.pause_duration_at(50_000), 2_000);

        config.pause_time = 40_000;
        assert_eq!(config.pause_duration_at(50_000), 12_000);
    }

    #[test]
    fn test_activity_type_serializes_snake_case() {
        let json = serde_json::to_string(&ActivityType::Bicycle).unwrap();
        assert_eq!(json, "\"bicycle\"");
        let parsed: ActivityStatus = serde_json::from_str("\"paused\"").unwrap();
        assert_eq!(parsed, ActivityStatus::Paused);
    }

    #[test]
    fn test_empty_server_id_is_not_synced() {
        let mut activity = Activity::new(
            ActivityConfig::new(70.0, ActivityType::Walking),
            Utc::now(),
        );
        activity.server_id = Some(String::new());
        assert!(!activity.is_synced());
        activity.server_id = Some("remote-1".to_string());
        assert!(activity.is_synced());
    }
}
