// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - tracking engine and the math behind it.

pub mod formula;
pub mod ingest;
pub mod session;
pub mod simplify;
pub mod sources;
pub mod tracker;

pub use ingest::{FixOutcome, IngestError, IngestSettings, PointIngestor};
pub use session::Session;
pub use sources::{HeartRateSource, LocationSource, PushSource};
pub use tracker::{
    BroadcastSink, NotificationSink, Tracker, TrackerBuilder, TrackerEvent, TrackerHandle,
    TrackerSettings,
};
