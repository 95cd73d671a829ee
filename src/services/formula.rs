// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Physiological and physical formulas.
//!
//! Turns speed, grade, power, weight and duration into VO2, METs, calories,
//! pace and unit conversions. Rounded results round half away from zero.

use rand::Rng;
use std::f64::consts::PI;

/// Oxygen uptake of one MET, ml·kg⁻¹·min⁻¹.
const VO2_PER_MET: f64 = 3.5;
/// Walking segment upper bound, km/h.
const WALK_MAX_KMH: f64 = 5.0;
/// Running segment lower bound, km/h.
const RUN_MIN_KMH: f64 = 7.0;

/// Bicycle mass added to the rider weight, kg.
pub const BIKE_MASS_KG: f64 = 13.0;
/// Grade cap for power estimation.
pub const MAX_GRADE: f64 = 0.33;
/// Grades below this count as descending for power estimation.
pub const DESCENT_GRADE: f64 = -0.01;
/// Upper bound of the pedal power estimate, W.
pub const MAX_PEDAL_POWER_W: f64 = 1600.0;

const GRAVITY: f64 = 9.8067;
const ROLLING_RESISTANCE: f64 = 0.005;
/// 0.5 · CdA · air density
const DRAG_FACTOR: f64 = 0.5 * 0.321 * 1.226;
const DRIVETRAIN_LOSS: f64 = 0.03;
/// kJ of mechanical work per kcal burned, before efficiency.
const KJ_PER_KCAL: f64 = 1.11631;
/// Bicycle efficiency factor range.
const MIN_EFFICIENCY: f64 = 0.78;
const EFFICIENCY_SPREAD: f64 = 0.04;

const MILES_PER_METER: f64 = 0.000621371;
const MILES_PER_KM: f64 = 0.621371;

/// Round to `places` decimals, half away from zero.
pub fn round_places(value: f64, places: u32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let factor = 10f64.powi(places as i32);
    (value * factor).round() / factor
}

fn round_to_kcal(value: f64) -> u32 {
    if value.is_finite() && value > 0.0 {
        value.round() as u32
    } else {
        0
    }
}

// ─── Walking / Running ───────────────────────────────────────

/// ACSM oxygen uptake for walking/running.
///
/// Three linear segments on speed: walking below 5 km/h, running above
/// 7 km/h, and the line joining both boundary points in between.
///
/// - speed_kmh: km/h
/// - grade: percent
/// - returns: VO2 in ml·kg⁻¹·min⁻¹, 2 decimals
pub fn vo2_acsm(speed_kmh: f64, grade: f64) -> f64 {
    let low_vo2 = WALK_MAX_KMH * 5.0 / 3.0 + WALK_MAX_KMH * grade * 0.3 + VO2_PER_MET;
    let high_vo2 = RUN_MIN_KMH * 10.0 / 3.0 + RUN_MIN_KMH * grade * 0.15 + VO2_PER_MET;
    let slope = (high_vo2 - low_vo2) / (RUN_MIN_KMH - WALK_MAX_KMH);
    let intercept = low_vo2 - slope * WALK_MAX_KMH;

    let vo2 = if speed_kmh <= WALK_MAX_KMH {
        speed_kmh * 1.666666666 + speed_kmh * grade * 0.3 + VO2_PER_MET
    } else if speed_kmh >= RUN_MIN_KMH {
        speed_kmh * 3.333333333 + speed_kmh * grade * 0.15 + VO2_PER_MET
    } else {
        speed_kmh * slope + intercept
    };
    round_places(vo2, 2)
}

/// METs from oxygen uptake, 2 decimals.
pub fn mets_from_vo2(vo2: f64) -> f64 {
    round_places(vo2 / VO2_PER_MET, 2)
}

/// Energy spent at `mets` for `duration_secs`, in whole kcal.
pub fn calories_from_mets(mets: f64, duration_secs: i64, user_weight: f64) -> u32 {
    round_to_kcal(mets * user_weight * duration_secs as f64 / 3600.0)
}

/// METs sustained to burn `calories` in `duration_secs`, 2 decimals.
pub fn mets_from_calories(calories: f64, duration_secs: i64, user_weight: f64) -> f64 {
    if duration_secs <= 0 || user_weight <= 0.0 {
        return 0.0;
    }
    round_places(3600.0 * calories / (user_weight * duration_secs as f64), 2)
}

/// Running speed from a step count, via the cadence regression
/// 0.0189·v³ − 0.1868·v² + 0.7816·v + 0.2398 = steps per minute / 120.
///
/// - steps: steps taken during `duration_ms`
/// - duration_ms: ms
/// - returns: m/s, 2 decimals; 0 for no duration or a negative root
pub fn speed_from_steps(steps: u32, duration_ms: i64) -> f64 {
    if duration_ms <= 0 {
        return 0.0;
    }
    let cadence = f64::from(steps) / (duration_ms as f64 / 60_000.0);
    let speed = solve_cubic(0.0189, -0.1868, 0.7816, 0.2398 - cadence / 120.0);
    if !speed.is_finite() || speed < 0.0 {
        return 0.0;
    }
    round_places(speed, 2)
}

// ─── Cycling ─────────────────────────────────────────────────

/// Road grade between two points, capped at [`MAX_GRADE`].
///
/// Zero when no horizontal distance was covered.
pub fn bicycle_grade(delta_height: f64, delta_distance: f64) -> f64 {
    if delta_distance == 0.0 {
        return 0.0;
    }
    (delta_height / delta_distance).min(MAX_GRADE)
}

/// Pedal power needed to hold `speed` on `grade`.
///
/// Gravity, rolling resistance and aerodynamic drag on rider plus bike,
/// then drivetrain loss. Clamped to `[0, MAX_PEDAL_POWER_W]`.
///
/// - user_weight: kg
/// - grade: ratio (0.05 = 5%)
/// - speed: m/s
/// - returns: W
pub fn pedal_power(user_weight: f64, grade: f64, speed: f64) -> f64 {
    let mass = user_weight + BIKE_MASS_KG;
    let angle = grade.atan();
    let gravity = GRAVITY * angle.sin() * mass;
    let rolling = GRAVITY * angle.cos() * mass * ROLLING_RESISTANCE;
    let drag = DRAG_FACTOR * speed * speed;
    let wheel_power = (gravity + rolling + drag) * speed;
    let pedal = wheel_power / (1.0 - DRIVETRAIN_LOSS);

    if pedal > MAX_PEDAL_POWER_W {
        MAX_PEDAL_POWER_W
    } else if pedal < 0.0 || !pedal.is_finite() {
        0.0
    } else {
        pedal
    }
}

/// Pedal power for one fix-to-fix segment.
///
/// A slight downhill (down to [`DESCENT_GRADE`]) yields no power; a steeper
/// descent is estimated as flat riding so it never reports negative effort.
pub fn segment_power(delta_distance: f64, delta_height: f64, user_weight: f64, speed: f64) -> f64 {
    let grade = bicycle_grade(delta_height, delta_distance);
    if grade < 0.0 {
        if grade < DESCENT_GRADE {
            pedal_power(user_weight, 0.0, speed)
        } else {
            0.0
        }
    } else {
        pedal_power(user_weight, grade, speed)
    }
}

/// Energy of `power` held for `duration_secs`, before efficiency, kcal.
pub fn calories_from_power(power: f64, duration_secs: i64) -> f64 {
    power * duration_secs as f64 / 1000.0 / KJ_PER_KCAL
}

/// Whole kcal for a cycling segment at a given efficiency factor.
pub fn bicycle_calories_with_efficiency(power: f64, duration_secs: i64, efficiency: f64) -> u32 {
    round_to_kcal(calories_from_power(power, duration_secs) * efficiency)
}

/// Whole kcal for a cycling segment, efficiency drawn from `[0.78, 0.82)`.
pub fn bicycle_calories<R: Rng + ?Sized>(power: f64, duration_secs: i64, rng: &mut R) -> u32 {
    let efficiency = MIN_EFFICIENCY + rng.gen_range(0.0..EFFICIENCY_SPREAD);
    bicycle_calories_with_efficiency(power, duration_secs, efficiency)
}

/// Speed reached on the flat for a given power (closed-form cubic root).
///
/// - weight: kg, rider plus bike
/// - power: W
/// - returns: m/s
pub fn ambrosini_speed(weight: f64, power: f64) -> f64 {
    let a = 0.20601;
    let c = 0.0981 * weight;
    solve_depressed_cubic(c / a, -power / a)
}

/// Speed reached at a percentage of threshold power on a grade.
///
/// - threshold_power: W
/// - watt_percent: percent of threshold power
/// - weight: kg, rider plus bike
/// - grade_percent: percent
/// - returns: m/s
pub fn speed_from_power_and_grade(
    threshold_power: u32,
    watt_percent: u32,
    weight: f64,
    grade_percent: f64,
) -> f64 {
    let a = 0.24525;
    let power = f64::from(watt_percent) * f64::from(threshold_power) / 100.0;
    let grade = grade_percent / 100.0;
    let c = 9.81 * weight * (grade + 0.003);
    solve_depressed_cubic(c / a, -power / a)
}

/// Real root of y³ + p·y + q = 0 (Cardano).
fn solve_depressed_cubic(p: f64, q: f64) -> f64 {
    let root = (q * q / 4.0 + p.powi(3) / 27.0).sqrt();
    (-q / 2.0 + root).cbrt() + (-q / 2.0 - root).cbrt()
}

/// Real root of a·x³ + b·x² + c·x + d = 0, for cubics with a single real root.
fn solve_cubic(a: f64, b: f64, c: f64, d: f64) -> f64 {
    let shift = b / (3.0 * a);
    let p = (3.0 * a * c - b * b) / (3.0 * a * a);
    let q = (2.0 * b.powi(3) - 9.0 * a * b * c + 27.0 * a * a * d) / (27.0 * a.powi(3));
    solve_depressed_cubic(p, q) - shift
}

// ─── Conversions ─────────────────────────────────────────────

/// m/s to km/h, 2 decimals. Non-finite input converts to 0.
pub fn ms_to_kmh(speed: f64) -> f64 {
    if !speed.is_finite() {
        return 0.0;
    }
    round_places(speed * 3.6, 2)
}

/// km/h to m/s, 2 decimals.
pub fn kmh_to_ms(speed: f64) -> f64 {
    round_places(speed / 3.6, 2)
}

/// Distance covered at `speed` (m/s) in `duration_ms`, meters, 2 decimals.
pub fn distance_from_speed(speed: f64, duration_ms: i64) -> f64 {
    round_places(speed * (duration_ms as f64 / 1000.0), 2)
}

/// Pace in min/km for a speed in km/h. Zero when standing still.
pub fn pace_min_per_km(speed_kmh: f64) -> f64 {
    if speed_kmh == 0.0 {
        return 0.0;
    }
    round_places(60.0 / speed_kmh, 2)
}

pub fn meters_to_miles(meters: f64) -> f64 {
    meters * MILES_PER_METER
}

/// min/km to min/mile.
pub fn pace_km_to_pace_miles(pace_km: f64) -> f64 {
    pace_km / MILES_PER_KM
}

/// Wheel circumference in meters from its diameter in inches.
pub fn wheel_circumference_m(diameter_inch: f64) -> f64 {
    diameter_inch * PI * 2.54 / 100.0
}

/// Linear interpolation of `x` on the line through (x1, y1) and (x2, y2).
pub fn interpolate(x1: f64, x2: f64, y1: f64, y2: f64, x: f64) -> f64 {
    (x - x1) / (x2 - x1) * (y2 - y1) + y1
}
