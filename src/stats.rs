//! Shared run statistics.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Counters updated concurrently by many workers.
///
/// Construct one per run and share it through an `Arc`; nothing here is
/// global.
#[derive(Debug, Default)]
pub struct Statistics {
    system_runtime: AtomicU64,
    detected_objects: AtomicU64,
    tracked_objects: AtomicU64,
    landmarks: AtomicU64,
}

/// Point-in-time copy of [`Statistics`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsSnapshot {
    /// Ticks broadcast by the clock.
    pub system_runtime: u64,
    pub num_detected_objects: u64,
    pub num_tracked_objects: u64,
    /// Distinct landmarks on the map.
    pub num_landmarks: u64,
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_runtime(&self, ticks: u64) {
        self.system_runtime.fetch_add(ticks, Ordering::Relaxed);
    }

    pub fn add_detected(&self, count: u64) {
        self.detected_objects.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_tracked(&self, count: u64) {
        self.tracked_objects.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_landmarks(&self, count: u64) {
        self.landmarks.fetch_add(count, Ordering::Relaxed);
    }

    pub fn system_runtime(&self) -> u64 {
        self.system_runtime.load(Ordering::Relaxed)
    }

    pub fn detected_objects(&self) -> u64 {
        self.detected_objects.load(Ordering::Relaxed)
    }

    pub fn tracked_objects(&self) -> u64 {
        self.tracked_objects.load(Ordering::Relaxed)
    }

    pub fn landmarks(&self) -> u64 {
        self.landmarks.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            system_runtime: self.system_runtime(),
            num_detected_objects: self.detected_objects(),
            num_tracked_objects: self.tracked_objects(),
            num_landmarks: self.landmarks(),
        }
    }
}
