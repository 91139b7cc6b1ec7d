//! Messages exchanged by the fusion workers.

use crate::bus::{Broadcast, Event, WorkerId};

use super::objects::{Pose, StampedDetections, TrackedObject};

/// Logical clock tick, starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickBroadcast {
    pub time: u64,
}

impl Broadcast for TickBroadcast {}

/// `sender` has finished and will send nothing more.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminatedBroadcast {
    pub sender: WorkerId,
}

impl Broadcast for TerminatedBroadcast {}

/// `sender` hit a fault; every worker shuts down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrashedBroadcast {
    pub sender: WorkerId,
    pub error: String,
}

impl Broadcast for CrashedBroadcast {}

/// Camera → LiDAR. Replies `true` once the detections were tracked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectObjectsEvent {
    pub sender: WorkerId,
    pub detections: StampedDetections,
}

impl Event for DetectObjectsEvent {
    type Reply = bool;
}

/// LiDAR → aggregator: observations made at `time`, in the sensor frame.
///
/// Replies `true` once the observations are on the map.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedObjectsEvent {
    pub sender: WorkerId,
    pub time: u64,
    pub objects: Vec<TrackedObject>,
}

impl Event for TrackedObjectsEvent {
    type Reply = bool;
}

/// Pose producer → aggregator.
#[derive(Debug, Clone, PartialEq)]
pub struct PoseEvent {
    pub sender: WorkerId,
    pub pose: Pose,
}

impl Event for PoseEvent {
    type Reply = ();
}
