// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the tracking engine.

pub mod activity;
pub mod point;

pub use activity::{Activity, ActivityConfig, ActivityStatus, ActivityType};
pub use point::{HeartRatePoint, LocationFix, TrackPoint};
