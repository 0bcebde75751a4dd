// Planar and spatial pose types shared by teleop, vision and the drivetrain

use nalgebra::{Isometry2, Isometry3, Translation3, UnitQuaternion, Vector2};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Pose on the field plane: meters, heading in radians (counter-clockwise positive)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose2d {
    pub x: f64,
    pub y: f64,
    pub heading: f64,
}

impl Pose2d {
    pub fn new(x: f64, y: f64, heading: f64) -> Self {
        Self { x, y, heading }
    }

    pub fn to_isometry(&self) -> Isometry2<f64> {
        Isometry2::new(Vector2::new(self.x, self.y), self.heading)
    }

    pub fn from_isometry(iso: &Isometry2<f64>) -> Self {
        Self {
            x: iso.translation.x,
            y: iso.translation.y,
            heading: wrap_angle(iso.rotation.angle()),
        }
    }

    pub fn heading_degrees(&self) -> f64 {
        self.heading.to_degrees()
    }

    /// Planar distance between two poses, ignoring heading
    pub fn distance_to(&self, other: &Pose2d) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.heading.is_finite()
    }
}

/// Wrap an angle into [-PI, PI)
pub fn wrap_angle(angle: f64) -> f64 {
    (angle + PI).rem_euclid(2.0 * PI) - PI
}

/// Drop the vertical axis, roll and pitch of a spatial pose
pub fn project_to_plane(pose: &Isometry3<f64>) -> Pose2d {
    let (_, _, yaw) = pose.rotation.euler_angles();
    Pose2d::new(pose.translation.x, pose.translation.y, yaw)
}

/// Rigid transform as written in config files and camera messages
/// (meters, radians; rotations applied roll, then pitch, then yaw)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Transform3d {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

impl Transform3d {
    pub fn to_isometry(&self) -> Isometry3<f64> {
        Isometry3::from_parts(
            Translation3::new(self.x, self.y, self.z),
            UnitQuaternion::from_euler_angles(self.roll, self.pitch, self.yaw),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_angle() {
        assert!((wrap_angle(3.0 * PI / 2.0) + PI / 2.0).abs() < 1e-12);
        assert!((wrap_angle(-3.0 * PI / 2.0) - PI / 2.0).abs() < 1e-12);
        assert!((wrap_angle(0.25) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_project_keeps_yaw_and_drops_height() {
        let t = Transform3d {
            x: 3.0,
            y: -1.5,
            z: 0.4,
            yaw: 0.7,
            ..Default::default()
        };
        let planar = project_to_plane(&t.to_isometry());
        assert!((planar.x - 3.0).abs() < 1e-9);
        assert!((planar.y + 1.5).abs() < 1e-9);
        assert!((planar.heading - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_isometry_round_trip_wraps_heading() {
        let pose = Pose2d::new(1.0, 2.0, 2.0 * PI + 0.1);
        let back = Pose2d::from_isometry(&pose.to_isometry());
        assert!((back.heading - 0.1).abs() < 1e-9);
        assert!((back.x - 1.0).abs() < 1e-9);
    }
}
