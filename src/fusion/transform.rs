//! Sensor-frame to world-frame conversion.

use super::objects::{CloudPoint, Pose};

/// Maps points measured relative to the robot into the world frame.
pub trait FrameTransform: Send {
    fn to_world(&self, pose: &Pose, local: &[CloudPoint]) -> Vec<CloudPoint>;
}

/// Planar rigid transform: rotate by the pose's yaw, then translate by its
/// position.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanarTransform;

impl FrameTransform for PlanarTransform {
    fn to_world(&self, pose: &Pose, local: &[CloudPoint]) -> Vec<CloudPoint> {
        let (sin, cos) = pose.yaw.to_radians().sin_cos();
        local
            .iter()
            .map(|p| CloudPoint::new(p.x * cos - p.y * sin + pose.x, p.x * sin + p.y * cos + pose.y))
            .collect()
    }
}
