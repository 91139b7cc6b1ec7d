//! Sensor fusion on top of the bus.
//!
//! A clock broadcasts logical ticks. A pose producer sends the robot's pose
//! for each tick, cameras send detections, and LiDAR trackers (sharing the
//! camera events round robin) attach cloud points to them. The aggregator
//! pairs every tracked observation with the pose of the same tick, however
//! the two arrive, and builds a landmark map.
//!
//! ## Quick Start
//!
//! ```
//! use microbus::fusion::{Simulation, SimulationConfig};
//!
//! let config = SimulationConfig::from_json(r#"{
//!     "clock": { "ticks": 3 },
//!     "poses": [
//!         { "time": 1, "x": 0.0, "y": 0.0, "yaw": 0.0 },
//!         { "time": 2, "x": 1.0, "y": 0.0, "yaw": 0.0 }
//!     ],
//!     "cameras": [{
//!         "name": "camera-1",
//!         "frequency": 0,
//!         "detections": [
//!             { "time": 2, "detectedObjects": [{ "id": "wall", "description": "Wall" }] }
//!         ]
//!     }],
//!     "lidars": [{ "name": "lidar-1" }],
//!     "lidarData": [
//!         { "id": "wall", "time": 2, "cloudPoints": [[1.0, 1.0]] }
//!     ]
//! }"#).unwrap();
//!
//! let run = Simulation::new(config).unwrap().run().unwrap();
//! let wall = run.report.landmark("wall").unwrap();
//! assert_eq!((wall.coordinates[0].x, wall.coordinates[0].y), (2.0, 1.0));
//! ```

mod aggregator;
mod correlation;
mod messages;
mod objects;
mod producers;
mod report;
mod simulation;
mod tally;
mod transform;

pub use aggregator::{fusion_worker, FusionSlam};
pub use correlation::CorrelationBuffer;
pub use messages::{
    CrashedBroadcast, DetectObjectsEvent, PoseEvent, TerminatedBroadcast, TickBroadcast,
    TrackedObjectsEvent,
};
pub use objects::{
    CloudPoint, DetectedObject, Landmark, Pose, SensorStatus, StampedCloudPoints,
    StampedDetections, TrackedObject, ERROR_ID,
};
pub use producers::{
    camera_worker, clock_worker, lidar_worker, pose_worker, Camera, Clock, LidarDatabase,
    LidarTracker, PoseProducer,
};
pub use report::{
    CrashReport, FinalReport, JsonSink, LastFrames, MemorySink, ReportError, ReportSink,
};
pub use simulation::{
    CameraConfig, ClockConfig, ConfigError, LidarConfig, Simulation, SimulationConfig,
    SimulationError, SimulationReport, WorkerSummary,
};
pub use tally::ProducerTally;
pub use transform::{FrameTransform, PlanarTransform};
