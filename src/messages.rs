// Define message types exchanged with the pose estimator and observers

use serde::{Deserialize, Serialize};

use crate::control::{ForceVector, WheelCommand};

/// Planar pose in the image frame. Heading is in radians.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    pub heading: f64,
}

/// A goal has the same shape as a pose
pub type Goal = Pose;

impl Pose {
    pub const fn new(x: f64, y: f64, heading: f64) -> Self {
        Self { x, y, heading }
    }

    /// Build a pose from a heading given in degrees (schedule files and config use degrees)
    pub fn from_degrees(x: f64, y: f64, heading_deg: f64) -> Self {
        Self::new(x, y, heading_deg.to_radians())
    }

    pub fn distance_to(&self, other: &Pose) -> f64 {
        ((other.x - self.x).powi(2) + (other.y - self.y).powi(2)).sqrt()
    }
}

/// 6-DOF marker pose: image position, camera-frame position and attitude (radians)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExtendedPose {
    pub u: f64,
    pub v: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

impl ExtendedPose {
    /// Project onto the image plane, keeping yaw as the heading
    pub fn planar(&self) -> Pose {
        Pose::new(self.u, self.v, self.yaw)
    }
}

// A detection may come in either form; serde picks by field set
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PoseSample {
    Extended(ExtendedPose),
    Planar(Pose),
}

impl PoseSample {
    pub fn planar(&self) -> Pose {
        match self {
            PoseSample::Planar(pose) => *pose,
            PoseSample::Extended(ext) => ext.planar(),
        }
    }
}

// Pose estimator -> runtime
// One slot per robot; None means the marker was not detected this frame
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoseFrame {
    pub poses: Vec<Option<PoseSample>>,
}

// Runtime -> observers, once per tick
#[derive(Debug, Clone, Serialize)]
pub struct WheelFrame<'a> {
    pub commands: &'a [WheelCommand],
    pub forces: &'a [ForceVector],
}

/// Health status published by runtime
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeHealth {
    Ok,
    PoseStale,
    PartialDelivery,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_planar_sample_parses() {
        let frame: PoseFrame =
            serde_json::from_str(r#"{"poses":[{"x":1.0,"y":2.0,"heading":0.5},null]}"#).unwrap();
        assert_eq!(frame.poses.len(), 2);
        assert_eq!(frame.poses[0].unwrap().planar(), Pose::new(1.0, 2.0, 0.5));
        assert!(frame.poses[1].is_none());
    }

    #[test]
    fn test_extended_sample_projects_to_image_plane() {
        let json = r#"{"poses":[{"u":320.0,"v":240.0,"x":0.1,"y":0.2,"z":1.5,"roll":0.0,"pitch":0.1,"yaw":1.2}]}"#;
        let frame: PoseFrame = serde_json::from_str(json).unwrap();
        let pose = frame.poses[0].unwrap().planar();
        assert_eq!(pose, Pose::new(320.0, 240.0, 1.2));
    }

    #[test]
    fn test_from_degrees() {
        let pose = Pose::from_degrees(0.0, 0.0, 180.0);
        assert!((pose.heading - std::f64::consts::PI).abs() < 1e-12);
    }
}
