// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Tracking engine.
//!
//! A single tokio task owns the [`Session`] and the [`PointIngestor`] and
//! processes lifecycle commands, location fixes, heart-rate readings and
//! snapshot ticks strictly in arrival order. Callers talk to it through a
//! cloneable [`TrackerHandle`].

use crate::config::Config;
use crate::db::TrackStore;
use crate::error::{AppError, Result};
use crate::models::{Activity, ActivityStatus, ActivityType, HeartRatePoint, LocationFix, TrackPoint};
use crate::services::ingest::{FixOutcome, IngestError, IngestSettings, PointIngestor};
use crate::services::session::Session;
use crate::services::sources::{HeartRateSource, LocationSource, PushSource};
use crate::time_utils::{Clock, SystemClock};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{Instant, Interval, MissedTickBehavior};

/// Engine tunables, taken from [`Config`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerSettings {
    pub ingest: IngestSettings,
    /// Cadence of live snapshots while started
    pub tick_interval: Duration,
    /// Depth of the command queue
    pub command_buffer: usize,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            ingest: IngestSettings::default(),
            tick_interval: Duration::from_secs(1),
            command_buffer: 256,
        }
    }
}

impl TrackerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            ingest: IngestSettings {
                min_point_interval_ms: config.min_point_interval_ms,
                jump_distance_m: config.jump_distance_m,
            },
            tick_interval: Duration::from_millis(config.tick_interval_ms.max(1)),
            command_buffer: config.command_buffer.max(1),
        }
    }
}

// ─── Notifications ───────────────────────────────────────────

/// Event published to observers. Always an owned copy of engine state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum TrackerEvent {
    StatusChanged(Activity),
    PointReceived(TrackPoint),
    HeartRateReceived(u16),
}

/// Receiver of tracker events.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, event: TrackerEvent);
}

/// Fans events out to any number of subscribers.
#[derive(Clone)]
pub struct BroadcastSink {
    sender: broadcast::Sender<TrackerEvent>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TrackerEvent> {
        self.sender.subscribe()
    }
}

impl NotificationSink for BroadcastSink {
    fn notify(&self, event: TrackerEvent) {
        // No subscribers is fine.
        let _ = self.sender.send(event);
    }
}

// ─── Commands ────────────────────────────────────────────────

type Reply<T> = oneshot::Sender<T>;

enum Command {
    Start {
        user_weight: f64,
        activity_type: ActivityType,
        reply: Reply<Result<Activity>>,
    },
    ResumeExisting {
        activity: Box<Activity>,
        reply: Reply<Result<Activity>>,
    },
    ResumeLast {
        reply: Reply<Result<Option<Activity>>>,
    },
    StartOrResume {
        reply: Reply<Result<Activity>>,
    },
    Pause {
        reply: Reply<Result<Activity>>,
    },
    Stop {
        reply: Reply<Result<Activity>>,
    },
    Location {
        fix: LocationFix,
        reply: Reply<std::result::Result<FixOutcome, IngestError>>,
    },
    HeartRate {
        bpm: u16,
        reply: Reply<bool>,
    },
    ConnectHeartRate {
        address: String,
        reply: Reply<Result<bool>>,
    },
    CurrentActivity {
        reply: Reply<Option<Activity>>,
    },
    LastPoint {
        reply: Reply<Option<TrackPoint>>,
    },
}

enum Wake {
    Command(Command),
    Tick,
}

/// What the run loop does with the snapshot ticker after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TickerChange {
    Keep,
    Arm,
    Disarm,
}

// ─── Builder ─────────────────────────────────────────────────

/// Entry point for creating a tracking engine.
pub struct Tracker;

impl Tracker {
    pub fn builder(store: Arc<dyn TrackStore>) -> TrackerBuilder {
        TrackerBuilder {
            store,
            settings: TrackerSettings::default(),
            clock: Arc::new(SystemClock),
            location_source: Arc::new(PushSource::new()),
            heart_rate_source: Arc::new(PushSource::new()),
            sink: Arc::new(BroadcastSink::new(64)),
            rng_seed: None,
        }
    }
}

pub struct TrackerBuilder {
    store: Arc<dyn TrackStore>,
    settings: TrackerSettings,
    clock: Arc<dyn Clock>,
    location_source: Arc<dyn LocationSource>,
    heart_rate_source: Arc<dyn HeartRateSource>,
    sink: Arc<dyn NotificationSink>,
    rng_seed: Option<u64>,
}

impl TrackerBuilder {
    pub fn settings(mut self, settings: TrackerSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn location_source(mut self, source: Arc<dyn LocationSource>) -> Self {
        self.location_source = source;
        self
    }

    pub fn heart_rate_source(mut self, source: Arc<dyn HeartRateSource>) -> Self {
        self.heart_rate_source = source;
        self
    }

    pub fn sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Seed the bicycle efficiency RNG for reproducible calories.
    pub fn rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    /// Start the engine task. Must be called inside a tokio runtime.
    ///
    /// The task ends once every handle has been dropped.
    pub fn spawn(self) -> TrackerHandle {
        let (commands, receiver) = mpsc::channel(self.settings.command_buffer.max(1));
        let ingestor = match self.rng_seed {
            Some(seed) => PointIngestor::with_seed(self.settings.ingest, seed),
            None => PointIngestor::new(self.settings.ingest),
        };

        let engine = Engine {
            session: Session::new(),
            ingestor,
            store: self.store,
            clock: self.clock,
            location_source: self.location_source,
            heart_rate_source: self.heart_rate_source,
            sink: self.sink,
            last_heart_rate: 0,
        };
        tokio::spawn(engine.run(receiver, self.settings.tick_interval));

        TrackerHandle { commands }
    }
}

// ─── Handle ──────────────────────────────────────────────────

/// Cloneable handle to a running engine.
#[derive(Clone)]
pub struct TrackerHandle {
    commands: mpsc::Sender<Command>,
}

impl TrackerHandle {
    async fn request<T>(&self, command: impl FnOnce(Reply<T>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| AppError::SessionClosed)?;
        response.await.map_err(|_| AppError::SessionClosed)
    }

    /// Create a new activity. It is not tracking until [`Self::start_or_resume`].
    pub async fn start(&self, user_weight: f64, activity_type: ActivityType) -> Result<Activity> {
        self.request(|reply| Command::Start {
            user_weight,
            activity_type,
            reply,
        })
        .await?
    }

    /// Adopt a persisted, unfinished activity as the current one.
    pub async fn resume_existing(&self, activity: Activity) -> Result<Activity> {
        self.request(|reply| Command::ResumeExisting {
            activity: Box::new(activity),
            reply,
        })
        .await?
    }

    /// Adopt the most recent activity if it has not ended.
    pub async fn resume_last(&self) -> Result<Option<Activity>> {
        self.request(|reply| Command::ResumeLast { reply }).await?
    }

    pub async fn start_or_resume(&self) -> Result<Activity> {
        self.request(|reply| Command::StartOrResume { reply }).await?
    }

    pub async fn pause(&self) -> Result<Activity> {
        self.request(|reply| Command::Pause { reply }).await?
    }

    /// End the current activity and return its final state.
    pub async fn stop(&self) -> Result<Activity> {
        self.request(|reply| Command::Stop { reply }).await?
    }

    /// Feed one location fix.
    ///
    /// Malformed fixes are logged by the engine and come back as
    /// `BadRequest`. A fix whose point could not be stored is reported as
    /// [`FixOutcome::Dropped`].
    pub async fn location_changed(&self, fix: LocationFix) -> Result<FixOutcome> {
        self.request(|reply| Command::Location { fix, reply })
            .await?
            .map_err(|e| AppError::BadRequest(e.to_string()))
    }

    /// Feed one heart-rate reading. Returns whether it was stored.
    pub async fn heart_rate_changed(&self, bpm: u16) -> Result<bool> {
        self.request(|reply| Command::HeartRate { bpm, reply }).await
    }

    /// Remember the device on the current activity and connect to it.
    /// Returns whether the connection started.
    pub async fn connect_heart_rate(&self, address: impl Into<String>) -> Result<bool> {
        let address = address.into();
        self.request(|reply| Command::ConnectHeartRate { address, reply })
            .await?
    }

    pub async fn current_activity(&self) -> Result<Option<Activity>> {
        self.request(|reply| Command::CurrentActivity { reply }).await
    }

    pub async fn last_point(&self) -> Result<Option<TrackPoint>> {
        self.request(|reply| Command::LastPoint { reply }).await
    }

    pub async fn has_activity_running(&self) -> Result<bool> {
        Ok(self
            .current_activity()
            .await?
            .is_some_and(|activity| activity.is_running()))
    }
}

// ─── Engine ──────────────────────────────────────────────────

struct Engine {
    session: Session,
    ingestor: PointIngestor,
    store: Arc<dyn TrackStore>,
    clock: Arc<dyn Clock>,
    location_source: Arc<dyn LocationSource>,
    heart_rate_source: Arc<dyn HeartRateSource>,
    sink: Arc<dyn NotificationSink>,
    last_heart_rate: u16,
}

fn snapshot_ticker(period: Duration) -> Interval {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

impl Engine {
    async fn run(mut self, mut commands: mpsc::Receiver<Command>, tick_period: Duration) {
        let mut ticker: Option<Interval> = None;
        tracing::debug!("Tracker engine started");

        loop {
            let wake = tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => Wake::Command(command),
                    None => break,
                },
                _ = next_tick(&mut ticker) => Wake::Tick,
            };

            match wake {
                Wake::Command(command) => match self.handle(command).await {
                    TickerChange::Keep => {}
                    TickerChange::Arm => ticker = Some(snapshot_ticker(tick_period)),
                    TickerChange::Disarm => ticker = None,
                },
                Wake::Tick => self.send_update(),
            }
        }

        tracing::debug!("Tracker engine stopped");
    }

    async fn handle(&mut self, command: Command) -> TickerChange {
        match command {
            Command::Start {
                user_weight,
                activity_type,
                reply,
            } => {
                let _ = reply.send(self.start(user_weight, activity_type).await);
                TickerChange::Keep
            }
            Command::ResumeExisting { activity, reply } => {
                let _ = reply.send(self.resume_existing(*activity).await);
                TickerChange::Keep
            }
            Command::ResumeLast { reply } => {
                let _ = reply.send(self.resume_last().await);
                TickerChange::Keep
            }
            Command::StartOrResume { reply } => {
                let result = self.start_or_resume().await;
                let change = if result.is_ok() {
                    TickerChange::Arm
                } else {
                    TickerChange::Keep
                };
                let _ = reply.send(result);
                change
            }
            Command::Pause { reply } => {
                let result = self.pause().await;
                let change = if result.is_ok() {
                    TickerChange::Disarm
                } else {
                    TickerChange::Keep
                };
                let _ = reply.send(result);
                change
            }
            Command::Stop { reply } => {
                let result = self.stop().await;
                let change = if result.is_ok() {
                    TickerChange::Disarm
                } else {
                    TickerChange::Keep
                };
                let _ = reply.send(result);
                change
            }
            Command::Location { fix, reply } => {
                let _ = reply.send(self.location_changed(fix).await);
                TickerChange::Keep
            }
            Command::HeartRate { bpm, reply } => {
                let _ = reply.send(self.heart_rate_changed(bpm).await);
                TickerChange::Keep
            }
            Command::ConnectHeartRate { address, reply } => {
                let _ = reply.send(self.connect_heart_rate(&address).await);
                TickerChange::Keep
            }
            Command::CurrentActivity { reply } => {
                let _ = reply.send(self.session.activity().cloned());
                TickerChange::Keep
            }
            Command::LastPoint { reply } => {
                let _ = reply.send(self.session.last_point().cloned());
                TickerChange::Keep
            }
        }
    }

    fn now(&self) -> i64 {
        self.clock.now_millis()
    }

    fn notify_status(&self, activity: &Activity) {
        self.sink.notify(TrackerEvent::StatusChanged(activity.clone()));
    }

    /// Persist a lifecycle transition, restoring `before` if the write fails.
    async fn commit(&mut self, before: Session, activity: &Activity) -> Result<()> {
        if let Err(e) = self.store.upsert_activity(activity).await {
            tracing::error!(
                activity_id = %activity.id,
                error = %e,
                "Failed to persist activity, transition rolled back"
            );
            self.session = before;
            return Err(e);
        }
        Ok(())
    }

    /// Newest stored point of an activity, or `None` if it cannot be read.
    async fn newest_stored_point(&self, activity_id: &str) -> Option<TrackPoint> {
        match self.store.recent_points(activity_id, 1).await {
            Ok(mut points) => points.pop(),
            Err(e) => {
                tracing::warn!(activity_id, error = %e, "Failed to read last stored point");
                None
            }
        }
    }

    async fn start(&mut self, user_weight: f64, activity_type: ActivityType) -> Result<Activity> {
        let before = self.session.clone();
        let activity = self.session.begin(user_weight, activity_type, self.now())?;
        self.commit(before, &activity).await?;

        tracing::info!(
            activity_id = %activity.id,
            activity_type = activity_type.as_str(),
            user_weight,
            "New activity created"
        );
        Ok(activity)
    }

    async fn resume_existing(&mut self, activity: Activity) -> Result<Activity> {
        let last_point = self.newest_stored_point(&activity.id).await;
        let activity = self.session.adopt(activity, last_point)?;

        tracing::info!(
            activity_id = %activity.id,
            status = ?activity.status(),
            "Resumed existing activity"
        );
        Ok(activity)
    }

    async fn resume_last(&mut self) -> Result<Option<Activity>> {
        match self.store.last_activity().await? {
            Some(activity) if activity.is_running() => {
                self.resume_existing(activity).await.map(Some)
            }
            _ => {
                tracing::debug!("No unfinished activity to resume");
                Ok(None)
            }
        }
    }

    async fn start_or_resume(&mut self) -> Result<Activity> {
        let before = self.session.clone();
        let activity = self.session.start_or_resume(self.now())?;
        self.commit(before, &activity).await?;

        if !self.location_source.start().await {
            tracing::warn!(
                activity_id = %activity.id,
                "Location source refused to start, no fixes will arrive"
            );
        }
        self.notify_status(&activity);

        tracing::info!(
            activity_id = %activity.id,
            start_time = activity.config.start_time,
            pause_duration = activity.config.pause_duration,
            "Tracking started"
        );
        Ok(activity)
    }

    async fn pause(&mut self) -> Result<Activity> {
        let before = self.session.clone();
        let activity = self.session.pause(self.now())?;
        self.commit(before, &activity).await?;

        self.location_source.stop().await;
        self.notify_status(&activity);

        tracing::info!(
            activity_id = %activity.id,
            pause_time = activity.config.pause_time,
            "Tracking paused"
        );
        Ok(activity)
    }

    async fn stop(&mut self) -> Result<Activity> {
        let activity_id = self
            .session
            .activity()
            .map(|activity| activity.id.clone())
            .ok_or_else(AppError::no_activity)?;

        let last_stored = match self.newest_stored_point(&activity_id).await {
            Some(point) => Some(point),
            None => self.session.last_point().cloned(),
        };

        let before = self.session.clone();
        let activity = self.session.stop(self.now(), last_stored.as_ref())?;
        self.commit(before, &activity).await?;

        self.location_source.stop().await;
        self.heart_rate_source.stop().await;
        self.last_heart_rate = 0;
        self.notify_status(&activity);

        tracing::info!(
            activity_id = %activity.id,
            duration_ms = activity.duration,
            distance_m = activity.distance,
            calories = activity.calories,
            avg_speed = activity.avg_speed,
            "Tracking stopped"
        );
        Ok(activity)
    }

    /// Points are stored best effort: a store failure drops the fix.
    async fn location_changed(
        &mut self,
        fix: LocationFix,
    ) -> std::result::Result<FixOutcome, IngestError> {
        let now = self.now();
        let result = match self
            .ingestor
            .ingest(&mut self.session, &fix, self.store.as_ref(), now)
            .await
        {
            Err(IngestError::Storage(e)) => {
                tracing::warn!(
                    timestamp = fix.timestamp,
                    error = %e,
                    "Dropped location fix, point not stored"
                );
                return Ok(FixOutcome::Dropped);
            }
            other => other,
        };

        match &result {
            Ok(outcome) => match outcome.stored_point() {
                Some(point) => tracing::debug!(
                    activity_id = %point.activity_id,
                    outcome = outcome.label(),
                    distance_m = point.distance,
                    duration_ms = point.duration,
                    "Fix stored"
                ),
                None => tracing::debug!(
                    outcome = outcome.label(),
                    timestamp = fix.timestamp,
                    "Fix discarded"
                ),
            },
            Err(e) => tracing::warn!(
                timestamp = fix.timestamp,
                error = %e,
                "Dropped location fix"
            ),
        }
        result
    }

    async fn heart_rate_changed(&mut self, bpm: u16) -> bool {
        self.last_heart_rate = bpm;

        let Some(activity) = self
            .session
            .activity()
            .filter(|a| a.status() == ActivityStatus::Started)
        else {
            return false;
        };

        let point = HeartRatePoint::new(&activity.id, bpm, self.now());
        match self.store.add_heart_rate_point(&point).await {
            Ok(()) => {
                tracing::debug!(activity_id = %point.activity_id, bpm, "Heart rate stored");
                true
            }
            Err(e) => {
                tracing::warn!(
                    activity_id = %point.activity_id,
                    error = %e,
                    "Failed to store heart rate"
                );
                false
            }
        }
    }

    async fn connect_heart_rate(&mut self, address: &str) -> Result<bool> {
        let activity = self.session.set_heart_rate_device(address, self.now())?;
        if let Err(e) = self.store.upsert_activity(&activity).await {
            tracing::warn!(
                activity_id = %activity.id,
                error = %e,
                "Failed to persist heart-rate device"
            );
        }

        let connected = self.heart_rate_source.start(address).await;
        if connected {
            tracing::info!(activity_id = %activity.id, address, "Heart-rate source connected");
        } else {
            tracing::warn!(activity_id = %activity.id, address, "Heart-rate source refused to start");
        }
        Ok(connected)
    }

    /// Publish the live snapshot and the latest heart rate.
    fn send_update(&self) {
        match self.session.snapshot(self.now()) {
            Ok(point) => {
                self.sink.notify(TrackerEvent::PointReceived(point));
                self.sink
                    .notify(TrackerEvent::HeartRateReceived(self.last_heart_rate));
            }
            Err(e) => tracing::debug!(error = %e, "Skipping snapshot"),
        }
    }
}
