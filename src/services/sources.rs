// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Upstream sample sources driven by the tracker.
//!
//! The tracker only switches sources on and off; samples themselves reach
//! the engine through [`crate::services::TrackerHandle`].

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Platform location provider.
#[async_trait]
pub trait LocationSource: Send + Sync {
    /// Begin delivering fixes. Returns false when the platform refuses
    /// (e.g. missing permission).
    async fn start(&self) -> bool;

    async fn stop(&self);
}

/// Heart-rate monitor connection.
#[async_trait]
pub trait HeartRateSource: Send + Sync {
    /// Connect to the device at `address` and begin delivering readings.
    async fn start(&self, address: &str) -> bool;

    async fn stop(&self);
}

#[derive(Default)]
struct PushState {
    location_active: AtomicBool,
    heart_rate_active: AtomicBool,
    refuse_start: AtomicBool,
    device: Mutex<Option<String>>,
}

/// Source for samples pushed in from outside (HTTP ingest, tests).
///
/// Records whether each stream is switched on. Clones share state.
#[derive(Clone, Default)]
pub struct PushSource {
    state: Arc<PushState>,
}

impl PushSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Source whose `start` calls fail, as with a denied permission.
    pub fn refusing() -> Self {
        let source = Self::default();
        source.state.refuse_start.store(true, Ordering::SeqCst);
        source
    }

    pub fn location_active(&self) -> bool {
        self.state.location_active.load(Ordering::SeqCst)
    }

    pub fn heart_rate_active(&self) -> bool {
        self.state.heart_rate_active.load(Ordering::SeqCst)
    }

    /// Address of the connected heart-rate device, if any.
    pub fn heart_rate_device(&self) -> Option<String> {
        self.state
            .device
            .lock()
            .map(|device| device.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl LocationSource for PushSource {
    async fn start(&self) -> bool {
        if self.state.refuse_start.load(Ordering::SeqCst) {
            return false;
        }
        self.state.location_active.store(true, Ordering::SeqCst);
        true
    }

    async fn stop(&self) {
        self.state.location_active.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl HeartRateSource for PushSource {
    async fn start(&self, address: &str) -> bool {
        if self.state.refuse_start.load(Ordering::SeqCst) {
            return false;
        }
        if let Ok(mut device) = self.state.device.lock() {
            *device = Some(address.to_string());
        }
        self.state.heart_rate_active.store(true, Ordering::SeqCst);
        true
    }

    async fn stop(&self) {
        if let Ok(mut device) = self.state.device.lock() {
            *device = None;
        }
        self.state.heart_rate_active.store(false, Ordering::SeqCst);
    }
}
