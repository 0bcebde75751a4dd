// Joystick axis shaping: inversion, deadband, response curve, scaling and slew limiting

use crate::config::DriveConfig;
use crate::drivetrain::kinematics::ChassisSpeeds;
use crate::messages::JoystickSample;

/// Shaped teleop command in physical units (m/s, m/s, rad/s)
pub type ShapedCommand = ChassisSpeeds;

/// Forces small stick deflections to exactly zero
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Deadband {
    threshold: f64,
}

impl Deadband {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// A sample sitting exactly on the threshold is inside the deadband
    pub fn apply(&self, raw: f64) -> f64 {
        if raw.abs() <= self.threshold { 0.0 } else { raw }
    }
}

/// Bounds how far an output may move per tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlewRateLimiter {
    /// Units per second
    rate: f64,
    last: f64,
}

impl SlewRateLimiter {
    pub fn new(rate: f64) -> Self {
        Self { rate, last: 0.0 }
    }

    /// Step toward `target`, never by more than rate * dt
    pub fn calculate(&mut self, target: f64, dt: f64) -> f64 {
        let max_step = self.rate * dt;
        let delta = (target - self.last).clamp(-max_step, max_step);
        self.last += delta;
        self.last
    }

    pub fn last(&self) -> f64 {
        self.last
    }
}

/// The full shaping chain for one axis
#[derive(Debug, Clone, PartialEq)]
pub struct AxisShaper {
    invert: bool,
    deadband: Deadband,
    squared: bool,
    max_output: f64,
    limiter: SlewRateLimiter,
}

impl AxisShaper {
    pub fn new(invert: bool, deadband: f64, squared: bool, max_output: f64, slew_rate: f64) -> Self {
        Self {
            invert,
            deadband: Deadband::new(deadband),
            squared,
            max_output,
            limiter: SlewRateLimiter::new(slew_rate),
        }
    }

    /// Inverted and deadbanded stick value in [-1, 1], no response curve
    pub fn orient(&self, raw: f64) -> f64 {
        let raw = if raw.is_finite() { raw.clamp(-1.0, 1.0) } else { 0.0 };
        let oriented = if self.invert { -raw } else { raw };
        self.deadband.apply(oriented)
    }

    /// `orient` followed by the optional squared response, before scaling
    pub fn normalize(&self, raw: f64) -> f64 {
        let value = self.orient(raw);
        if self.squared { value * value.abs() } else { value }
    }

    pub fn shape(&mut self, raw: f64, dt: f64) -> f64 {
        let target = self.normalize(raw) * self.max_output;
        self.limiter.calculate(target, dt)
    }

    /// Let the limiter settle toward zero without consuming input
    pub fn settle(&mut self, dt: f64) -> f64 {
        self.limiter.calculate(0.0, dt)
    }
}

/// Shapes the three teleop axes from a joystick sample
#[derive(Debug, Clone, PartialEq)]
pub struct InputShaper {
    forward: AxisShaper,
    strafe: AxisShaper,
    rotation: AxisShaper,
    dt: f64,
}

impl InputShaper {
    pub fn new(config: &DriveConfig, dt: f64) -> Self {
        Self {
            forward: AxisShaper::new(
                config.invert.forward,
                config.deadband,
                config.squared.forward,
                config.max_linear_speed,
                config.linear_slew_rate,
            ),
            strafe: AxisShaper::new(
                config.invert.strafe,
                config.deadband,
                config.squared.strafe,
                config.max_linear_speed,
                config.linear_slew_rate,
            ),
            rotation: AxisShaper::new(
                config.invert.rotation,
                config.deadband,
                config.squared.rotation,
                config.max_angular_speed,
                config.angular_slew_rate,
            ),
            dt,
        }
    }

    // forward <- left stick Y, strafe <- left stick X, rotation <- right stick X
    pub fn shape(&mut self, sample: &JoystickSample) -> ShapedCommand {
        ShapedCommand::new(
            self.forward.shape(sample.left_y, self.dt),
            self.strafe.shape(sample.left_x, self.dt),
            self.rotation.shape(sample.right_x, self.dt),
        )
    }

    pub fn settle(&mut self) -> ShapedCommand {
        ShapedCommand::new(
            self.forward.settle(self.dt),
            self.strafe.settle(self.dt),
            self.rotation.settle(self.dt),
        )
    }

    /// Left stick as (forward, left) after inversion and deadband. The response curve
    /// is left out so the ratio between the axes, and with it the direction, is kept.
    pub fn translation_direction(&self, sample: &JoystickSample) -> (f64, f64) {
        (self.forward.orient(sample.left_y), self.strafe.orient(sample.left_x))
    }
}
