// Define message types for the runtime

use serde::{Deserialize, Serialize};

use crate::drivetrain::geometry::Transform3d;
use crate::drivetrain::kinematics::ChassisSpeeds;

/// Gamepad buttons the runtime binds actions to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Button {
    A,
    B,
    X,
    Y,
    Back,
    Start,
    LeftBumper,
    RightBumper,
}

/// The four cardinal directions of the POV hat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PovDirection {
    Up,
    Right,
    Down,
    Left,
}

// Joystick snapshot from teleop -> runtime
// Axes follow gamepad convention: pushing a stick forward reads negative
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JoystickSample {
    pub left_x: f64,
    pub left_y: f64,
    pub right_x: f64,
    /// Buttons currently held
    #[serde(default)]
    pub buttons: Vec<Button>,
    /// POV hat angle in degrees (0 = up, clockwise), None when released
    #[serde(default)]
    pub pov: Option<u16>,
}

impl JoystickSample {
    pub fn is_pressed(&self, button: Button) -> bool {
        self.buttons.contains(&button)
    }

    /// Cardinal POV direction; diagonals count as none of them
    pub fn pov_direction(&self) -> Option<PovDirection> {
        match self.pov? {
            0 => Some(PovDirection::Up),
            90 => Some(PovDirection::Right),
            180 => Some(PovDirection::Down),
            270 => Some(PovDirection::Left),
            _ => None,
        }
    }
}

/// One fiducial seen by a camera, as reported by the vision coprocessor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetObservation {
    pub fiducial_id: u32,
    /// Pose ambiguity in [0, 1]; negative when the coprocessor could not compute it
    pub ambiguity: f64,
    /// Best camera -> target transform from the coprocessor solve
    pub camera_to_target: Transform3d,
}

/// Coprocessor multi-tag solve: field -> camera using every visible tag at once
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiTagResult {
    pub field_to_camera: Transform3d,
    pub fiducial_ids: Vec<u32>,
}

// Camera frame result from vision coprocessor -> runtime
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CameraObservation {
    /// Capture-to-publish latency reported by the coprocessor
    #[serde(default)]
    pub latency_ms: f64,
    #[serde(default)]
    pub targets: Vec<TargetObservation>,
    #[serde(default)]
    pub multi_tag: Option<MultiTagResult>,
}

/// The single drive request active for a tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DriveRequest {
    /// Velocities in the field frame; the drivetrain rotates them by its heading
    FieldCentric(ChassisSpeeds),
    /// Velocities in the robot frame
    RobotCentric(ChassisSpeeds),
    /// Modules locked in an X pattern
    Brake,
    /// All modules steered to `direction` (radians, robot frame) without driving
    PointWheels { direction: f64 },
    /// No output at all; distinct from a zero field-centric request which holds position
    Idle,
}

impl DriveRequest {
    pub fn kind(&self) -> &'static str {
        match self {
            DriveRequest::FieldCentric(_) => "field_centric",
            DriveRequest::RobotCentric(_) => "robot_centric",
            DriveRequest::Brake => "brake",
            DriveRequest::PointWheels { .. } => "point_wheels",
            DriveRequest::Idle => "idle",
        }
    }
}

/// Per-axis measurement standard deviations (meters, meters, radians)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeasurementStdDevs {
    pub x: f64,
    pub y: f64,
    pub theta: f64,
}

impl MeasurementStdDevs {
    pub const fn new(x: f64, y: f64, theta: f64) -> Self {
        Self { x, y, theta }
    }

    pub fn as_array(&self) -> [f64; 3] {
        [self.x, self.y, self.theta]
    }
}

/// Health status published by runtime
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeHealth {
    Ok,
    CmdStale,
}
