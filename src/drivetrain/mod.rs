// Drivetrain interface and a simulated swerve base
//
// Provides:
// - Planar/spatial pose types
// - Swerve inverse and forward kinematics
// - SimDrivetrain: odometry plus latency-compensated vision blending

pub mod geometry;
pub mod kinematics;
mod sim;

pub use geometry::{Pose2d, Transform3d};
pub use kinematics::{ChassisSpeeds, ModuleState, SwerveKinematics};
pub use sim::SimDrivetrain;

use crate::messages::{DriveRequest, MeasurementStdDevs};

/// What the runtime needs from a drivetrain and its pose estimator
pub trait Drivetrain {
    /// Fused pose estimate
    fn current_pose(&self) -> Pose2d;

    /// Apply this tick's request. Never called for `DriveRequest::Idle` by the runtime.
    fn apply_drive_command(&mut self, request: &DriveRequest);

    /// Blend an absolute pose measured at `timestamp` (runtime clock, seconds)
    fn inject_pose_measurement(&mut self, pose: Pose2d, timestamp: f64, std_devs: MeasurementStdDevs);

    /// Treat the current heading as field-forward
    fn seed_field_centric(&mut self);

    /// End of tick: advance odometry to `now`
    fn periodic(&mut self, now: f64);
}
