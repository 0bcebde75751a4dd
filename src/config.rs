// Timeouts, topics, tunables
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::f64::consts::TAU;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::drivetrain::geometry::Transform3d;
use crate::messages::MeasurementStdDevs;

// Runtime loop frequency
pub const LOOP_HZ: u64 = 50;

// Joystick watchdog: no sample for this long and the base goes idle
pub const CMD_TIMEOUT: Duration = Duration::from_millis(250);

// Zenoh topics
pub const TOPIC_CMD_JOYSTICK: &str = "swerve/cmd/joystick"; // operator input
pub const TOPIC_VISION_PREFIX: &str = "swerve/vision"; // one sub-topic per camera name
pub const TOPIC_RT_MODULES: &str = "swerve/rt/modules"; // module setpoints
pub const TOPIC_TELEMETRY: &str = "swerve/state/telemetry";
pub const TOPIC_HEALTH: &str = "swerve/state/health";

// Unread camera frames kept per camera between ticks
pub const OBSERVATION_BUFFER_DEPTH: usize = 8;

/// Fixed tick period in seconds
pub fn tick_period() -> f64 {
    1.0 / LOOP_HZ as f64
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("No camera named {0:?} in vision config")]
    UnknownCamera(String),
}

/// Per-axis switch for the three teleop axes; axes left out of a config read as off
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AxisFlags {
    pub forward: bool,
    pub strafe: bool,
    pub rotation: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    /// m/s at full stick
    pub max_linear_speed: f64,
    /// rad/s at full stick
    pub max_angular_speed: f64,
    /// Raw stick magnitudes at or below this read as zero
    pub deadband: f64,
    /// m/s per second
    pub linear_slew_rate: f64,
    /// rad/s per second
    pub angular_slew_rate: f64,
    pub invert: AxisFlags,
    /// value * |value| response curve
    pub squared: AxisFlags,
    /// POV nudge speed as a fraction of max linear speed
    pub nudge_fraction: f64,
    pub wheelbase: f64,
    pub track_width: f64,
    pub max_module_speed: f64,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            max_linear_speed: 1.2,
            max_angular_speed: 0.75 * TAU,
            deadband: 0.05,
            linear_slew_rate: 0.5,
            angular_slew_rate: 1.0,
            invert: AxisFlags {
                forward: true,
                strafe: true,
                rotation: true,
            },
            squared: AxisFlags {
                forward: false,
                strafe: false,
                rotation: false,
            },
            nudge_fraction: 0.2,
            wheelbase: 0.52,
            track_width: 0.52,
            max_module_speed: 4.5,
        }
    }
}

/// Drivetrain characterization sweeps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// m/s gained per second held
    pub quasistatic_ramp_rate: f64,
    /// m/s commanded immediately
    pub dynamic_step_speed: f64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            quasistatic_ramp_rate: 0.25,
            dynamic_step_speed: 0.6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    pub name: String,
    #[serde(default)]
    pub robot_to_camera: Transform3d,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    pub field_layout_path: PathBuf,
    /// Ticks to wait before retrying a failed layout load
    pub layout_retry_ticks: u64,
    /// Height of the robot origin above the carpet
    pub platform_height: f64,
    pub height_tolerance: f64,
    pub multi_tag_std_devs: MeasurementStdDevs,
    pub single_tag_std_devs: MeasurementStdDevs,
    /// Seconds; older candidates are stale
    pub max_candidate_age: f64,
    pub cameras: Vec<CameraConfig>,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            field_layout_path: PathBuf::from("field_layout.json"),
            layout_retry_ticks: LOOP_HZ,
            platform_height: 0.0,
            height_tolerance: 0.3,
            multi_tag_std_devs: MeasurementStdDevs::new(0.5, 0.5, 1.0),
            single_tag_std_devs: MeasurementStdDevs::new(4.0, 4.0, 8.0),
            max_candidate_age: 0.5,
            cameras: vec![CameraConfig {
                name: "FrontCamera".to_string(),
                robot_to_camera: Transform3d {
                    z: 0.5,
                    ..Default::default()
                },
            }],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// Trust in wheel odometry; smaller means vision moves the pose less
    pub state_std_devs: MeasurementStdDevs,
    /// Seconds of pose history kept for latency-compensated vision updates
    pub history_window: f64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            state_std_devs: MeasurementStdDevs::new(0.1, 0.1, 0.1),
            history_window: 1.5,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub drive: DriveConfig,
    pub sweep: SweepConfig,
    pub vision: VisionConfig,
    pub estimator: EstimatorConfig,
}

impl Config {
    /// Load from a JSON file (or defaults when no path is given) and validate
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                serde_json::from_str(&text)?
            }
            None => Config::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject values the control loop cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let drive = &self.drive;
        positive("drive.max_linear_speed", drive.max_linear_speed)?;
        positive("drive.max_angular_speed", drive.max_angular_speed)?;
        positive("drive.linear_slew_rate", drive.linear_slew_rate)?;
        positive("drive.angular_slew_rate", drive.angular_slew_rate)?;
        positive("drive.wheelbase", drive.wheelbase)?;
        positive("drive.track_width", drive.track_width)?;
        positive("drive.max_module_speed", drive.max_module_speed)?;
        if !(0.0..1.0).contains(&drive.deadband) {
            return Err(invalid("drive.deadband", "must be in [0, 1)", drive.deadband));
        }
        if !(0.0..=1.0).contains(&drive.nudge_fraction) {
            return Err(invalid("drive.nudge_fraction", "must be in [0, 1]", drive.nudge_fraction));
        }

        positive("sweep.quasistatic_ramp_rate", self.sweep.quasistatic_ramp_rate)?;
        positive("sweep.dynamic_step_speed", self.sweep.dynamic_step_speed)?;

        let vision = &self.vision;
        positive("vision.height_tolerance", vision.height_tolerance)?;
        positive("vision.max_candidate_age", vision.max_candidate_age)?;
        std_devs("vision.multi_tag_std_devs", &vision.multi_tag_std_devs)?;
        std_devs("vision.single_tag_std_devs", &vision.single_tag_std_devs)?;
        if !vision.platform_height.is_finite() {
            return Err(invalid("vision.platform_height", "must be finite", vision.platform_height));
        }
        if vision.layout_retry_ticks == 0 {
            return Err(ConfigError::Invalid {
                field: "vision.layout_retry_ticks",
                reason: "must be at least 1".to_string(),
            });
        }
        if vision.cameras.is_empty() {
            return Err(ConfigError::Invalid {
                field: "vision.cameras",
                reason: "at least one camera is required".to_string(),
            });
        }
        let mut names = HashSet::new();
        for camera in &vision.cameras {
            if !names.insert(camera.name.as_str()) {
                return Err(ConfigError::Invalid {
                    field: "vision.cameras",
                    reason: format!("duplicate camera name {:?}", camera.name),
                });
            }
        }

        std_devs("estimator.state_std_devs", &self.estimator.state_std_devs)?;
        positive("estimator.history_window", self.estimator.history_window)?;
        Ok(())
    }

    pub fn camera(&self, name: &str) -> Option<&CameraConfig> {
        self.vision.cameras.iter().find(|c| c.name == name)
    }
}

fn invalid(field: &'static str, rule: &str, value: f64) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: format!("{} (got {})", rule, value),
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(field, "must be finite and > 0", value))
    }
}

fn std_devs(field: &'static str, devs: &MeasurementStdDevs) -> Result<(), ConfigError> {
    for value in devs.as_array() {
        positive(field, value)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.vision.cameras[0].name, "FrontCamera");
        assert!((config.drive.max_angular_speed - 4.712).abs() < 1e-3);
    }

    #[test]
    fn test_non_positive_max_speed_fails_fast() {
        let mut config = Config::default();
        config.drive.max_linear_speed = 0.0;
        match config.validate() {
            Err(ConfigError::Invalid { field, .. }) => assert_eq!(field, "drive.max_linear_speed"),
            other => panic!("Expected invalid max speed, got {:?}", other),
        }

        config.drive.max_linear_speed = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: Config = serde_json::from_str(
            r#"{"drive":{"max_linear_speed":2.0,"deadband":0.1},
                "vision":{"cameras":[{"name":"Left"},{"name":"Right"}]}}"#,
        )
        .unwrap();
        assert_eq!(config.drive.max_linear_speed, 2.0);
        assert_eq!(config.drive.deadband, 0.1);
        assert_eq!(config.drive.linear_slew_rate, 0.5);
        assert_eq!(config.vision.cameras.len(), 2);
        assert_eq!(config.vision.height_tolerance, 0.3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_axis_flags_parse() {
        let config: Config = serde_json::from_str(
            r#"{"drive":{"invert":{"forward":false},"squared":{"rotation":true}}}"#,
        )
        .unwrap();
        assert!(!config.drive.invert.forward);
        assert!(!config.drive.invert.strafe, "Axes left out read as off");
        assert!(config.drive.squared.rotation);
        assert!(!config.drive.squared.forward);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_duplicate_camera_names_rejected() {
        let mut config = Config::default();
        config.vision.cameras.push(config.vision.cameras[0].clone());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "vision.cameras", .. })
        ));
    }

    #[test]
    fn test_deadband_range() {
        let mut config = Config::default();
        config.drive.deadband = 1.0;
        assert!(config.validate().is_err());
        config.drive.deadband = 0.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = Config::load(Some(Path::new("/nonexistent/swerve-config.json")));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
