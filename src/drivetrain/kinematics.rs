// Swerve inverse kinematics for a four-module base
// Converts chassis velocities (vx, vy, omega) into per-module wheel speed and steering angle.

use serde::{Deserialize, Serialize};

/// Module order used everywhere: front-left, front-right, back-left, back-right
pub const MODULE_COUNT: usize = 4;

/// Speeds below this are treated as "not moving" and keep the previous steering angle
const STILL_SPEED: f64 = 1e-6;

/// Chassis velocity: vx forward (m/s), vy left (m/s), omega counter-clockwise (rad/s)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ChassisSpeeds {
    pub vx: f64,
    pub vy: f64,
    pub omega: f64,
}

impl ChassisSpeeds {
    pub fn new(vx: f64, vy: f64, omega: f64) -> Self {
        Self { vx, vy, omega }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    /// Rotate a field-frame velocity into the robot frame.
    ///
    /// A pure rotation by the robot heading: translation magnitude and omega are preserved,
    /// and a heading of zero is the identity.
    pub fn from_field_relative(vx: f64, vy: f64, omega: f64, heading: f64) -> Self {
        let (sin, cos) = heading.sin_cos();
        Self {
            vx: vx * cos + vy * sin,
            vy: -vx * sin + vy * cos,
            omega,
        }
    }

    pub fn translation_speed(&self) -> f64 {
        self.vx.hypot(self.vy)
    }
}

/// Commanded state of one swerve module
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleState {
    /// Wheel ground speed in m/s
    pub speed: f64,
    /// Steering angle in radians, relative to robot forward
    pub angle: f64,
}

impl ModuleState {
    pub fn new(speed: f64, angle: f64) -> Self {
        Self { speed, angle }
    }
}

/// Module geometry and speed limit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwerveKinematics {
    /// (x forward, y left) of each module relative to the robot center, in meters
    positions: [(f64, f64); MODULE_COUNT],
    max_module_speed: f64,
}

impl SwerveKinematics {
    /// Rectangular layout with modules at the corners
    pub fn new(wheelbase: f64, track_width: f64, max_module_speed: f64) -> Self {
        let hx = wheelbase / 2.0;
        let hy = track_width / 2.0;
        Self {
            positions: [(hx, hy), (hx, -hy), (-hx, hy), (-hx, -hy)],
            max_module_speed,
        }
    }

    pub fn module_positions(&self) -> [(f64, f64); MODULE_COUNT] {
        self.positions
    }

    /// Convert chassis speeds to module states
    ///
    /// If any module would exceed the max module speed, every module is scaled down by
    /// the same factor so the chassis keeps its direction of travel.
    /// Modules with no speed hold the steering angle from `previous`.
    pub fn to_module_states(
        &self,
        speeds: ChassisSpeeds,
        previous: &[ModuleState; MODULE_COUNT],
    ) -> [ModuleState; MODULE_COUNT] {
        let mut states = [ModuleState::default(); MODULE_COUNT];

        for (i, &(x, y)) in self.positions.iter().enumerate() {
            // Velocity of the contact point = chassis velocity + omega x r
            let vx = speeds.vx - speeds.omega * y;
            let vy = speeds.vy + speeds.omega * x;
            let speed = vx.hypot(vy);
            let angle = if speed > STILL_SPEED {
                vy.atan2(vx)
            } else {
                previous[i].angle
            };
            states[i] = ModuleState::new(speed, angle);
        }

        let fastest = states.iter().map(|s| s.speed).fold(0.0f64, f64::max);
        if fastest > self.max_module_speed {
            let scale = self.max_module_speed / fastest;
            for state in &mut states {
                state.speed *= scale;
            }
        }

        states
    }

    /// Forward kinematics: least-squares chassis speeds from module states
    pub fn to_chassis_speeds(&self, states: &[ModuleState; MODULE_COUNT]) -> ChassisSpeeds {
        let mut sum_vx = 0.0;
        let mut sum_vy = 0.0;
        let mut sum_moment = 0.0;
        let mut sum_r2 = 0.0;

        for (state, &(x, y)) in states.iter().zip(self.positions.iter()) {
            let (sin, cos) = state.angle.sin_cos();
            let vx = state.speed * cos;
            let vy = state.speed * sin;
            sum_vx += vx;
            sum_vy += vy;
            sum_moment += x * vy - y * vx;
            sum_r2 += x * x + y * y;
        }

        let n = MODULE_COUNT as f64;
        let omega = if sum_r2 > 0.0 { sum_moment / sum_r2 } else { 0.0 };
        ChassisSpeeds::new(sum_vx / n, sum_vy / n, omega)
    }

    /// X pattern: every module points at the robot center so the base resists pushing
    pub fn brake_states(&self) -> [ModuleState; MODULE_COUNT] {
        self.positions.map(|(x, y)| ModuleState::new(0.0, y.atan2(x)))
    }

    /// Every module steered to the same direction with zero speed
    pub fn point_states(&self, direction: f64) -> [ModuleState; MODULE_COUNT] {
        [ModuleState::new(0.0, direction); MODULE_COUNT]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

    fn kinematics() -> SwerveKinematics {
        SwerveKinematics::new(0.5, 0.5, 4.0)
    }

    #[test]
    fn test_zero_velocity_holds_angles() {
        let previous = [ModuleState::new(0.0, 0.3); MODULE_COUNT];
        let states = kinematics().to_module_states(ChassisSpeeds::zero(), &previous);
        for s in states {
            assert_eq!(s.speed, 0.0);
            assert!((s.angle - 0.3).abs() < 1e-12, "Angle should be held at rest");
        }
    }

    #[test]
    fn test_forward_motion() {
        let states = kinematics()
            .to_module_states(ChassisSpeeds::new(1.0, 0.0, 0.0), &[ModuleState::default(); 4]);
        for s in states {
            assert!((s.speed - 1.0).abs() < 1e-9);
            assert!(s.angle.abs() < 1e-9, "All modules should point forward");
        }
    }

    #[test]
    fn test_strafe_left() {
        let states = kinematics()
            .to_module_states(ChassisSpeeds::new(0.0, 0.5, 0.0), &[ModuleState::default(); 4]);
        for s in states {
            assert!((s.speed - 0.5).abs() < 1e-9);
            assert!((s.angle - FRAC_PI_2).abs() < 1e-9);
        }
    }

    #[test]
    fn test_rotation_only() {
        // Pure rotation: equal speeds, each module tangent to the circle through it
        let k = kinematics();
        let states = k.to_module_states(ChassisSpeeds::new(0.0, 0.0, 1.0), &[ModuleState::default(); 4]);
        let radius = 0.25f64.hypot(0.25);
        for (s, (x, y)) in states.iter().zip(k.module_positions()) {
            assert!((s.speed - radius).abs() < 1e-9);
            let radial = y.atan2(x);
            let diff = (s.angle - radial).abs();
            assert!((diff - FRAC_PI_2).abs() < 1e-9 || (diff - 3.0 * FRAC_PI_2).abs() < 1e-9);
        }
    }

    #[test]
    fn test_max_velocity_desaturated() {
        let states = kinematics()
            .to_module_states(ChassisSpeeds::new(10.0, 0.0, 5.0), &[ModuleState::default(); 4]);
        let fastest = states.iter().map(|s| s.speed).fold(0.0f64, f64::max);
        println!("Desaturated states: {:?}", states);
        assert!((fastest - 4.0).abs() < 1e-9, "Fastest module should sit at the limit");
    }

    #[test]
    fn test_forward_kinematics_recovers_chassis_speeds() {
        let k = kinematics();
        let speeds = ChassisSpeeds::new(0.8, -0.3, 0.6);
        let states = k.to_module_states(speeds, &[ModuleState::default(); 4]);
        let back = k.to_chassis_speeds(&states);
        assert!((back.vx - speeds.vx).abs() < 1e-9);
        assert!((back.vy - speeds.vy).abs() < 1e-9);
        assert!((back.omega - speeds.omega).abs() < 1e-9);
    }

    #[test]
    fn test_brake_is_x_pattern() {
        let states = kinematics().brake_states();
        assert!((states[0].angle - FRAC_PI_4).abs() < 1e-9);
        assert!((states[1].angle + FRAC_PI_4).abs() < 1e-9);
        assert!(states.iter().all(|s| s.speed == 0.0));
        let chassis = kinematics().to_chassis_speeds(&states);
        assert_eq!(chassis.translation_speed(), 0.0);
    }

    #[test]
    fn test_field_relative_identity_at_zero_heading() {
        let speeds = ChassisSpeeds::from_field_relative(0.4, -0.2, 0.1, 0.0);
        assert_eq!(speeds, ChassisSpeeds::new(0.4, -0.2, 0.1));
    }

    #[test]
    fn test_field_relative_is_pure_rotation() {
        // Robot facing field-left: field-forward motion is robot-right
        let speeds = ChassisSpeeds::from_field_relative(1.0, 0.0, 0.5, FRAC_PI_2);
        assert!(speeds.vx.abs() < 1e-9);
        assert!((speeds.vy + 1.0).abs() < 1e-9);
        assert_eq!(speeds.omega, 0.5);

        let skewed = ChassisSpeeds::from_field_relative(0.3, 0.4, 0.0, 1.1);
        assert!((skewed.translation_speed() - 0.5).abs() < 1e-9, "Rotation must keep magnitude");
    }
}
