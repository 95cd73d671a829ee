// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Track simplification.
//!
//! Decides whether a new point extends the track with a new vertex or
//! slides the last vertex forward along a straight line.

use crate::models::TrackPoint;
use geo::Point;

/// Earth radius used by the colinearity test, km.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Colinearity tolerance in km (about 10 cm).
pub const COLINEARITY_EPSILON_KM: f64 = 0.00001;

/// Where a computed point goes in the stored track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Append as a new vertex.
    Add,
    /// Overwrite the newest stored vertex in place.
    Replace,
}

/// Great-circle distance between two points, km.
pub fn haversine_km(origin: Point<f64>, destination: Point<f64>) -> f64 {
    let (lat1, lon1) = (origin.y(), origin.x());
    let (lat2, lon2) = (destination.y(), destination.x());

    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// True when going through `middle` is measurably longer than going straight
/// from `oldest` to `newest`, so `middle` is a real corner of the path.
pub fn is_corner(oldest: Point<f64>, middle: Point<f64>, newest: Point<f64>) -> bool {
    let via_middle = haversine_km(oldest, middle) + haversine_km(middle, newest);
    via_middle > haversine_km(oldest, newest) + COLINEARITY_EPSILON_KM
}

/// Decide where `candidate` goes.
///
/// - recent: the most recently stored points, newest first
/// - delta_distance_m: fix-to-fix distance that produced the candidate
/// - jump_distance_m: distance at or above which the candidate is always added
pub fn placement(
    recent: &[TrackPoint],
    candidate: &TrackPoint,
    delta_distance_m: u32,
    jump_distance_m: u32,
) -> Placement {
    match recent {
        [newest, oldest, ..] => {
            if delta_distance_m >= jump_distance_m
                || is_corner(oldest.position(), newest.position(), candidate.position())
            {
                Placement::Add
            } else {
                Placement::Replace
            }
        }
        _ => Placement::Add,
    }
}
