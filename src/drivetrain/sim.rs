// Simulated swerve base for bench runs
//
// Module setpoints are assumed to be reached instantly. Odometry integrates the forward
// kinematics at the end of every tick; vision measurements are blended into the pose
// history at their capture time and the odometry since then is replayed on top.

use nalgebra::{Isometry2, Vector2};
use std::collections::VecDeque;
use tracing::{debug, info, warn};

use super::Drivetrain;
use super::geometry::{Pose2d, wrap_angle};
use super::kinematics::{ChassisSpeeds, MODULE_COUNT, ModuleState, SwerveKinematics};
use crate::config::{DriveConfig, EstimatorConfig};
use crate::messages::{DriveRequest, MeasurementStdDevs};

pub struct SimDrivetrain {
    kinematics: SwerveKinematics,
    module_states: [ModuleState; MODULE_COUNT],
    // Setpoints expire at the end of the tick unless re-applied
    commanded: bool,
    pose: Pose2d,
    history: VecDeque<(f64, Pose2d)>,
    state_std_devs: MeasurementStdDevs,
    history_window: f64,
    last_update: Option<f64>,
}

impl SimDrivetrain {
    pub fn new(drive: &DriveConfig, estimator: &EstimatorConfig) -> Self {
        Self {
            kinematics: SwerveKinematics::new(drive.wheelbase, drive.track_width, drive.max_module_speed),
            module_states: [ModuleState::default(); MODULE_COUNT],
            commanded: false,
            pose: Pose2d::default(),
            history: VecDeque::new(),
            state_std_devs: estimator.state_std_devs,
            history_window: estimator.history_window,
            last_update: None,
        }
    }

    /// Module setpoints from the last applied request
    pub fn module_states(&self) -> &[ModuleState; MODULE_COUNT] {
        &self.module_states
    }

    /// Chassis speeds the modules currently produce (robot frame)
    pub fn chassis_speeds(&self) -> ChassisSpeeds {
        self.kinematics.to_chassis_speeds(&self.module_states)
    }

    /// Hard reset of the pose; drops history
    pub fn reset_pose(&mut self, pose: Pose2d) {
        self.pose = pose;
        self.history.clear();
    }

    fn coast(&mut self) {
        for state in &mut self.module_states {
            state.speed = 0.0;
        }
    }
}

impl Drivetrain for SimDrivetrain {
    fn current_pose(&self) -> Pose2d {
        self.pose
    }

    fn apply_drive_command(&mut self, request: &DriveRequest) {
        self.module_states = match *request {
            DriveRequest::FieldCentric(field) => {
                let robot =
                    ChassisSpeeds::from_field_relative(field.vx, field.vy, field.omega, self.pose.heading);
                self.kinematics.to_module_states(robot, &self.module_states)
            }
            DriveRequest::RobotCentric(robot) => self.kinematics.to_module_states(robot, &self.module_states),
            DriveRequest::Brake => self.kinematics.brake_states(),
            DriveRequest::PointWheels { direction } => self.kinematics.point_states(direction),
            DriveRequest::Idle => self.module_states.map(|s| ModuleState::new(0.0, s.angle)),
        };
        self.commanded = true;
    }

    fn inject_pose_measurement(&mut self, pose: Pose2d, timestamp: f64, std_devs: MeasurementStdDevs) {
        if !pose.is_finite() || !timestamp.is_finite() {
            warn!("Ignoring non-finite pose measurement {:?} at {}", pose, timestamp);
            return;
        }

        // Newest history sample taken at or before the measurement
        let index = self.history.iter().rposition(|(t, _)| *t <= timestamp);
        let sample = match index {
            Some(i) => self.history[i].1,
            None if self.history.is_empty() => self.pose,
            None => {
                debug!("Pose measurement at {:.3}s is older than the history window", timestamp);
                return;
            }
        };

        let q = self.state_std_devs.as_array();
        let r = std_devs.as_array();
        let gain: [f64; 3] = std::array::from_fn(|i| {
            let q2 = q[i] * q[i];
            q2 / (q2 + r[i] * r[i])
        });

        let corrected = Pose2d::new(
            sample.x + gain[0] * (pose.x - sample.x),
            sample.y + gain[1] * (pose.y - sample.y),
            wrap_angle(sample.heading + gain[2] * wrap_angle(pose.heading - sample.heading)),
        );

        let Some(i) = index else {
            self.pose = corrected;
            return;
        };

        // Replay odometry recorded after the sample on top of the corrected pose
        let anchor: Isometry2<f64> = corrected.to_isometry() * sample.to_isometry().inverse();
        let reanchor = |p: &Pose2d| Pose2d::from_isometry(&(anchor * p.to_isometry()));
        for entry in self.history.iter_mut().skip(i) {
            entry.1 = reanchor(&entry.1);
        }
        self.pose = reanchor(&self.pose);
    }

    fn seed_field_centric(&mut self) {
        info!("Heading re-seeded (was {:.1} deg)", self.pose.heading_degrees());
        self.pose.heading = 0.0;
        // Old samples are in the previous heading frame
        self.history.clear();
    }

    fn periodic(&mut self, now: f64) {
        if !self.commanded {
            self.coast();
        }
        self.commanded = false;

        let dt = match self.last_update {
            Some(last) => (now - last).max(0.0),
            None => 0.0,
        };
        self.last_update = Some(now);

        let speeds = self.chassis_speeds();
        let motion = Isometry2::new(Vector2::new(speeds.vx * dt, speeds.vy * dt), speeds.omega * dt);
        self.pose = Pose2d::from_isometry(&(self.pose.to_isometry() * motion));

        self.history.push_back((now, self.pose));
        while let Some(&(t, _)) = self.history.front() {
            if now - t > self.history_window {
                self.history.pop_front();
            } else {
                break;
            }
        }
    }
}
