//! Helpers shared by the fusion tests.
#![allow(dead_code)]

use std::time::Duration;

use microbus::fusion::{CloudPoint, Landmark, Pose, TrackedObject};
use tracing_subscriber::EnvFilter;

pub const WAIT: Duration = Duration::from_secs(5);
pub const SHORT: Duration = Duration::from_millis(50);

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn pose(time: u64, x: f64, y: f64, yaw: f64) -> Pose {
    Pose { time, x, y, yaw }
}

pub fn tracked(id: &str, time: u64, points: &[(f64, f64)]) -> TrackedObject {
    TrackedObject {
        id: id.to_string(),
        time,
        description: id.to_string(),
        coordinates: points.iter().map(|&(x, y)| CloudPoint::new(x, y)).collect(),
    }
}

/// Landmark coordinates rounded to 1e-9 to hide trigonometric noise.
pub fn points(landmark: &Landmark) -> Vec<(f64, f64)> {
    let round = |v: f64| (v * 1e9).round() / 1e9;
    landmark
        .coordinates
        .iter()
        .map(|p| (round(p.x), round(p.y)))
        .collect()
}
