// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session state machine.
//!
//! Owns the current activity and the last stored track point, and applies
//! the lifecycle transitions:
//!
//! ```text
//! (none) --begin--> Ended (placeholder) --start--> Started <--> Paused
//!                                                     |            |
//!                                                     +---stop-----+--> (none)
//! ```
//!
//! Every method takes the current time explicitly; no I/O happens here.

use crate::error::{AppError, Result};
use crate::models::{Activity, ActivityConfig, ActivityStatus, ActivityType, TrackPoint};
use crate::time_utils::millis_to_utc;

/// In-memory state of at most one live activity.
#[derive(Debug, Clone, Default)]
pub struct Session {
    activity: Option<Activity>,
    last_point: Option<TrackPoint>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn activity(&self) -> Option<&Activity> {
        self.activity.as_ref()
    }

    pub fn last_point(&self) -> Option<&TrackPoint> {
        self.last_point.as_ref()
    }

    /// True when there is a current activity that has not ended.
    pub fn has_activity_running(&self) -> bool {
        self.activity.as_ref().is_some_and(|a| a.is_running())
    }

    /// Remember the point just stored as the reference for the next fix.
    pub fn set_last_point(&mut self, point: TrackPoint) {
        self.last_point = Some(point);
    }

    /// Create a new activity as the current one.
    ///
    /// The activity stays in the `Ended` placeholder status until
    /// [`Session::start_or_resume`] is called.
    pub fn begin(
        &mut self,
        user_weight: f64,
        activity_type: ActivityType,
        now: i64,
    ) -> Result<Activity> {
        if let Some(current) = self.activity.as_ref().filter(|a| a.is_running()) {
            return Err(AppError::Precondition(format!(
                "Activity {} is still {:?}, stop it before starting a new one",
                current.id,
                current.status()
            )));
        }
        if !user_weight.is_finite() || user_weight <= 0.0 {
            return Err(AppError::BadRequest(format!(
                "User weight must be positive, got {}",
                user_weight
            )));
        }

        let activity = Activity::new(
            ActivityConfig::new(user_weight, activity_type),
            millis_to_utc(now),
        );
        self.activity = Some(activity.clone());
        self.last_point = None;
        Ok(activity)
    }

    /// Adopt a previously persisted, unfinished activity as the current one.
    ///
    /// `last_point` is the newest stored point of that activity, so the
    /// cumulative figures carry on from where they stopped.
    ///
    /// Adopting the activity that is already live returns the live copy
    /// unchanged; an older copy never rewinds its timing.
    pub fn adopt(&mut self, activity: Activity, last_point: Option<TrackPoint>) -> Result<Activity> {
        if !activity.is_running() {
            return Err(AppError::Precondition(format!(
                "Activity {} has ended, start a new one instead",
                activity.id
            )));
        }
        if let Some(current) = self.activity.as_ref().filter(|a| a.is_running()) {
            if current.id != activity.id {
                return Err(AppError::Precondition(format!(
                    "Activity {} is already being tracked",
                    current.id
                )));
            }
            return Ok(current.clone());
        }

        let same_activity = self.activity.as_ref().is_some_and(|a| a.id == activity.id);
        match last_point {
            Some(point) => self.last_point = Some(point),
            None if same_activity => {}
            None => self.last_point = None,
        }
        self.activity = Some(activity.clone());
        Ok(activity)
    }

    /// Start the current activity, or resume it from pause.
    ///
    /// Replaying this on an already started activity changes nothing but
    /// the update time.
    pub fn start_or_resume(&mut self, now: i64) -> Result<Activity> {
        let activity = self.activity.as_mut().ok_or_else(AppError::no_activity)?;
        let config = &mut activity.config;

        if config.pause_time != 0 {
            config.pause_duration += now - config.pause_time;
        } else if config.start_time == 0 {
            config.start_time = now;
        }
        config.pause_time = 0;
        config.status = ActivityStatus::Started;

        activity.updated_at = millis_to_utc(now);
        Ok(activity.clone())
    }

    /// Pause the current activity.
    ///
    /// Pausing an already paused activity keeps the original pause time.
    pub fn pause(&mut self, now: i64) -> Result<Activity> {
        let activity = self.activity.as_mut().ok_or_else(AppError::no_activity)?;

        match activity.config.status {
            ActivityStatus::Paused => return Ok(activity.clone()),
            ActivityStatus::Ended => {
                return Err(AppError::Precondition(format!(
                    "Activity {} is not started",
                    activity.id
                )))
            }
            ActivityStatus::Started => {}
        }

        activity.config.status = ActivityStatus::Paused;
        activity.config.paused = true;
        activity.config.pause_time = now;
        activity.updated_at = millis_to_utc(now);
        Ok(activity.clone())
    }

    /// End the current activity and clear the session.
    ///
    /// `last_stored` is the newest persisted point; it supplies the final
    /// distance and calories. Returns the final activity.
    pub fn stop(&mut self, now: i64, last_stored: Option<&TrackPoint>) -> Result<Activity> {
        let mut activity = self.activity.take().ok_or_else(AppError::no_activity)?;
        self.last_point = None;

        let config = &mut activity.config;
        if config.pause_time != 0 {
            config.pause_duration += now - config.pause_time;
            config.pause_time = 0;
        }

        activity.duration = if config.start_time != 0 {
            now - config.start_time - config.pause_duration
        } else {
            0
        };

        if let Some(point) = last_stored {
            activity.avg_speed = average_speed(point.distance, activity.duration);
            activity.calories = point.calories.max(0.0) as u32;
            activity.distance = point.distance;
        }

        activity.config.paused = false;
        activity.config.status = ActivityStatus::Ended;
        activity.updated_at = millis_to_utc(now);
        Ok(activity)
    }

    /// Clear the pause flag once the track has been re-anchored after a pause.
    pub fn clear_paused_flag(&mut self, now: i64) -> Option<Activity> {
        let activity = self.activity.as_mut()?;
        activity.config.paused = false;
        activity.updated_at = millis_to_utc(now);
        Some(activity.clone())
    }

    /// Remember the heart-rate device used by the current activity.
    pub fn set_heart_rate_device(&mut self, address: &str, now: i64) -> Result<Activity> {
        let activity = self.activity.as_mut().ok_or_else(AppError::no_activity)?;
        activity.config.hr_device_address = Some(address.to_string());
        activity.updated_at = millis_to_utc(now);
        Ok(activity.clone())
    }

    /// Active time of the current activity up to `now`, ms.
    pub fn elapsed(&self, now: i64) -> Result<i64> {
        let activity = self.activity.as_ref().ok_or_else(AppError::no_activity)?;
        let config = &activity.config;
        if config.start_time == 0 {
            return Ok(0);
        }
        Ok(now - config.start_time - config.pause_duration_at(now))
    }

    /// Live, non-persisted point for UI updates between fixes.
    ///
    /// Carries the live duration and the average speed so far; without a
    /// stored point yet it is an empty sample stamped `now`.
    pub fn snapshot(&self, now: i64) -> Result<TrackPoint> {
        let activity = self.activity.as_ref().ok_or_else(AppError::no_activity)?;
        let duration = self.elapsed(now)?;

        Ok(match &self.last_point {
            Some(last) => TrackPoint {
                duration,
                speed: average_speed(last.distance, duration),
                ..last.clone()
            },
            None => TrackPoint {
                id: String::new(),
                activity_id: activity.id.clone(),
                timestamp: now,
                duration,
                latitude: 0.0,
                longitude: 0.0,
                altitude: 0.0,
                distance: 0,
                speed: 0.0,
                calories: 0.0,
            },
        })
    }
}

/// Meters over whole elapsed seconds; zero when either is not positive.
pub fn average_speed(distance: u32, duration_ms: i64) -> f64 {
    let seconds = duration_ms / 1000;
    if duration_ms > 0 && distance > 0 && seconds > 0 {
        f64::from(distance) / seconds as f64
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T0: i64 = 1_700_000_000_000;

    fn started_session() -> Session {
        let mut session = Session::new();
        session.begin(70.0, ActivityType::Walking, T0).unwrap();
        session.start_or_resume(T0).unwrap();
        session
    }

    fn stored_point(distance: u32, calories: f64) -> TrackPoint {
        TrackPoint {
            id: "p".to_string(),
            activity_id: "a".to_string(),
            timestamp: T0,
            duration: 0,
            latitude: 0.0,
            longitude: 0.0,
            altitude: 0.0,
            distance,
            speed: 0.0,
            calories,
        }
    }

    #[test]
    fn test_begin_creates_placeholder() {
        let mut session = Session::new();
        let activity = session.begin(70.0, ActivityType::Running, T0).unwrap();

        assert_eq!(activity.status(), ActivityStatus::Ended);
        assert_eq!(activity.config.start_time, 0);
        assert!(!session.has_activity_running());
    }

    #[test]
    fn test_begin_over_live_activity_fails() {
        let mut session = started_session();
        let err = session.begin(70.0, ActivityType::Walking, T0).unwrap_err();
        assert!(matches!(err, AppError::Precondition(_)));
    }

    #[test]
    fn test_begin_replaces_unstarted_placeholder() {
        let mut session = Session::new();
        let first = session.begin(70.0, ActivityType::Running, T0).unwrap();
        let second = session.begin(70.0, ActivityType::Bicycle, T0).unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(session.activity().unwrap().id, second.id);
    }

    #[test]
    fn test_begin_rejects_bad_weight() {
        let mut session = Session::new();
        assert!(matches!(
            session.begin(0.0, ActivityType::Walking, T0),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_operations_without_activity_fail() {
        let mut session = Session::new();
        assert!(matches!(session.start_or_resume(T0), Err(AppError::Precondition(_))));
        assert!(matches!(session.pause(T0), Err(AppError::Precondition(_))));
        assert!(matches!(session.stop(T0, None), Err(AppError::Precondition(_))));
        assert!(matches!(session.snapshot(T0), Err(AppError::Precondition(_))));
    }

    #[test]
    fn test_pause_resume_stop_timing() {
        let mut session = started_session();
        assert_eq!(session.activity().unwrap().config.start_time, T0);

        let paused = session.pause(T0 + 10_000).unwrap();
        assert_eq!(paused.status(), ActivityStatus::Paused);
        assert!(paused.config.paused);
        assert_eq!(paused.config.pause_time, T0 + 10_000);

        let resumed = session.start_or_resume(T0 + 15_000).unwrap();
        assert_eq!(resumed.config.pause_duration, 5_000);
        assert_eq!(resumed.config.pause_time, 0);
        assert_eq!(resumed.status(), ActivityStatus::Started);

        let ended = session.stop(T0 + 20_000, None).unwrap();
        assert_eq!(ended.config.pause_duration, 5_000);
        assert_eq!(ended.duration, 15_000);
        assert_eq!(ended.status(), ActivityStatus::Ended);
        assert!(session.activity().is_none());
        assert!(session.last_point().is_none());
    }

    #[test]
    fn test_stop_while_paused_folds_open_pause() {
        let mut session = started_session();
        session.pause(T0 + 10_000).unwrap();

        let ended = session.stop(T0 + 25_000, None).unwrap();
        assert_eq!(ended.config.pause_duration, 15_000);
        assert_eq!(ended.config.pause_time, 0);
        assert_eq!(ended.duration, 10_000);
    }

    #[test]
    fn test_double_pause_keeps_first_pause_time() {
        let mut session = started_session();
        session.pause(T0 + 10_000).unwrap();
        let again = session.pause(T0 + 12_000).unwrap();
        assert_eq!(again.config.pause_time, T0 + 10_000);
    }

    #[test]
    fn test_pause_before_start_fails() {
        let mut session = Session::new();
        session.begin(70.0, ActivityType::Walking, T0).unwrap();
        assert!(matches!(session.pause(T0), Err(AppError::Precondition(_))));
    }

    #[test]
    fn test_stop_uses_last_stored_point() {
        let mut session = started_session();
        let ended = session
            .stop(T0 + 100_000, Some(&stored_point(250, 17.8)))
            .unwrap();

        assert_eq!(ended.distance, 250);
        assert_eq!(ended.calories, 17);
        assert_eq!(ended.avg_speed, 2.5);
    }

    #[test]
    fn test_stop_without_points_has_zero_aggregates() {
        let mut session = started_session();
        let ended = session.stop(T0 + 30_000, None).unwrap();

        assert_eq!(ended.avg_speed, 0.0);
        assert_eq!(ended.calories, 0);
        assert_eq!(ended.distance, 0);
    }

    #[test]
    fn test_adopt_rejects_ended_activity() {
        let mut session = started_session();
        let ended = session.stop(T0 + 1_000, None).unwrap();

        let err = session.adopt(ended, None).unwrap_err();
        assert!(matches!(err, AppError::Precondition(_)));
    }

    #[test]
    fn test_adopt_rejects_second_live_activity() {
        let mut first = started_session();
        let other = started_session();
        let foreign = other.activity().unwrap().clone();

        assert!(matches!(
            first.adopt(foreign, None),
            Err(AppError::Precondition(_))
        ));
    }

    #[test]
    fn test_replayed_resume_does_not_double_count_pause() {
        let mut session = started_session();
        session.pause(T0 + 10_000).unwrap();
        let resumed = session.start_or_resume(T0 + 15_000).unwrap();

        // App restart: adopt the persisted copy and start again.
        let mut restarted = Session::new();
        restarted.adopt(resumed.clone(), None).unwrap();
        let replayed = restarted.start_or_resume(T0 + 40_000).unwrap();
        assert_eq!(replayed.config.pause_duration, 5_000);
        assert_eq!(replayed.config.start_time, T0);

        restarted.adopt(replayed, None).unwrap();
        let again = restarted.start_or_resume(T0 + 41_000).unwrap();
        assert_eq!(again.config.pause_duration, 5_000);
    }

    #[test]
    fn test_adopting_stale_paused_copy_keeps_live_timing() {
        let mut session = started_session();
        session.set_last_point(stored_point(300, 12.0));
        let paused = session.pause(T0 + 10_000).unwrap();
        session.start_or_resume(T0 + 15_000).unwrap();

        let adopted = session.adopt(paused, None).unwrap();
        assert_eq!(adopted.status(), ActivityStatus::Started);
        assert_eq!(adopted.config.pause_time, 0);
        assert_eq!(session.last_point().unwrap().distance, 300);

        let replayed = session.start_or_resume(T0 + 30_000).unwrap();
        assert_eq!(replayed.config.pause_duration, 5_000);

        let ended = session.stop(T0 + 40_000, None).unwrap();
        assert_eq!(ended.duration, 35_000);
    }

    #[test]
    fn test_snapshot_uses_live_duration() {
        let mut session = started_session();
        let empty = session.snapshot(T0 + 2_000).unwrap();
        assert_eq!(empty.duration, 2_000);
        assert_eq!(empty.timestamp, T0 + 2_000);
        assert_eq!(empty.speed, 0.0);

        session.set_last_point(stored_point(100, 5.0));
        session.pause(T0 + 30_000).unwrap();
        let live = session.snapshot(T0 + 50_000).unwrap();
        // 20 s still paused
        assert_eq!(live.duration, 30_000);
        assert!((live.speed - 100.0 / 30.0).abs() < 1e-9);
        assert_eq!(live.distance, 100);
    }

    #[test]
    fn test_average_speed_guards() {
        assert_eq!(average_speed(100, 0), 0.0);
        assert_eq!(average_speed(0, 10_000), 0.0);
        assert_eq!(average_speed(100, 500), 0.0);
        assert_eq!(average_speed(100, 10_999), 10.0);
    }
}
