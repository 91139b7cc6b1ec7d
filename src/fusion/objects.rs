//! Sensor readings and map entities.
//!
//! Times are logical clock ticks (`u64`) throughout.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Detected-object or database id that marks a sensor fault.
pub const ERROR_ID: &str = "ERROR";

/// A point in the plane, in either the sensor or the world frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CloudPoint {
    pub x: f64,
    pub y: f64,
}

impl CloudPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Component-wise mean of two points.
    pub fn midpoint(&self, other: &CloudPoint) -> CloudPoint {
        CloudPoint::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

/// Robot position and heading at a given tick. `yaw` is in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub time: u64,
    pub x: f64,
    pub y: f64,
    pub yaw: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedObject {
    pub id: String,
    pub description: String,
}

impl DetectedObject {
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.id == ERROR_ID
    }
}

/// Everything a camera saw at one tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StampedDetections {
    pub time: u64,
    pub detected_objects: Vec<DetectedObject>,
}

impl StampedDetections {
    pub fn new(time: u64, detected_objects: Vec<DetectedObject>) -> Self {
        Self {
            time,
            detected_objects,
        }
    }

    /// The first object flagged as a fault, if any.
    pub fn fault(&self) -> Option<&DetectedObject> {
        self.detected_objects.iter().find(|o| o.is_error())
    }
}

/// A LiDAR database row: the raw points measured for object `id` at `time`.
///
/// Points are stored as `[x, y, ...]` rows; components past the second are
/// ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StampedCloudPoints {
    pub id: String,
    pub time: u64,
    pub cloud_points: Vec<Vec<f64>>,
}

impl StampedCloudPoints {
    pub fn points(&self) -> Vec<CloudPoint> {
        self.cloud_points
            .iter()
            .filter_map(|row| match row.as_slice() {
                [x, y, ..] => Some(CloudPoint::new(*x, *y)),
                _ => None,
            })
            .collect()
    }

    pub fn is_error(&self) -> bool {
        self.id == ERROR_ID
    }
}

/// A detected object with the points the LiDAR measured for it, still in the
/// sensor frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedObject {
    pub id: String,
    pub time: u64,
    pub description: String,
    pub coordinates: Vec<CloudPoint>,
}

/// An object fixed on the world map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub id: String,
    pub description: String,
    pub coordinates: Vec<CloudPoint>,
}

impl Landmark {
    pub fn new(id: impl Into<String>, description: impl Into<String>, coordinates: Vec<CloudPoint>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            coordinates,
        }
    }

    /// Fold a new observation into the landmark.
    ///
    /// Points at the same index are averaged; the surplus of whichever list
    /// is longer is kept as is.
    pub fn merge(&mut self, observed: &[CloudPoint]) {
        let shared = self.coordinates.len().min(observed.len());
        for (old, new) in self.coordinates.iter_mut().zip(observed) {
            *old = old.midpoint(new);
        }
        if observed.len() > shared {
            self.coordinates.extend_from_slice(&observed[shared..]);
        }
    }
}

/// Health of a sensor as seen by its producer worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SensorStatus {
    #[default]
    Up,
    Down,
    Error,
}

impl fmt::Display for SensorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorStatus::Up => write!(f, "up"),
            SensorStatus::Down => write!(f, "down"),
            SensorStatus::Error => write!(f, "error"),
        }
    }
}
