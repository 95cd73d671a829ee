// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.

use std::env;
use std::str::FromStr;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    pub port: u16,
    /// Minimum time between stored track points (ms)
    pub min_point_interval_ms: i64,
    /// Fix-to-fix distance at or above which a point is always appended (m)
    pub jump_distance_m: u32,
    /// Live snapshot cadence while tracking (ms)
    pub tick_interval_ms: u64,
    /// Depth of the engine's command queue
    pub command_buffer: usize,
}

impl Config {
    /// Defaults, without reading the environment.
    pub fn test_default() -> Self {
        Self {
            port: 8080,
            min_point_interval_ms: 3_000,
            jump_distance_m: 1_000,
            tick_interval_ms: 1_000,
            command_buffer: 256,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Every variable is optional; unset ones fall back to the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let defaults = Self::test_default();
        Ok(Self {
            port: parse_var("PORT", defaults.port)?,
            min_point_interval_ms: parse_var(
                "TRACKER_MIN_POINT_INTERVAL_MS",
                defaults.min_point_interval_ms,
            )?,
            jump_distance_m: parse_var("TRACKER_JUMP_DISTANCE_M", defaults.jump_distance_m)?,
            tick_interval_ms: parse_var("TRACKER_TICK_INTERVAL_MS", defaults.tick_interval_ms)?,
            command_buffer: parse_var("TRACKER_COMMAND_BUFFER", defaults.command_buffer)?,
        })
    }
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value: raw }),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}
