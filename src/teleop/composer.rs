// Turns shaped stick input and discrete bindings into the tick's single DriveRequest

use crate::config::{DriveConfig, SweepConfig};
use crate::drivetrain::kinematics::ChassisSpeeds;
use crate::messages::{DriveRequest, JoystickSample, PovDirection};
use crate::teleop::bindings::{Action, BindingSet};
use crate::teleop::shaper::{InputShaper, ShapedCommand};
use crate::teleop::sweep::DiagnosticSweep;

/// Output of one composition step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Composition {
    pub request: DriveRequest,
    /// Limiter output this tick (settles toward zero while a discrete action drives)
    pub shaped: ShapedCommand,
    /// Rising edge of the heading re-seed binding
    pub seed_field_centric: bool,
}

pub struct DriveFrameComposer {
    shaper: InputShaper,
    bindings: BindingSet,
    sweep: DiagnosticSweep,
    nudge_speed: f64,
}

impl DriveFrameComposer {
    pub fn new(drive: &DriveConfig, sweep: &SweepConfig, dt: f64) -> Self {
        Self::with_bindings(drive, sweep, dt, BindingSet::standard())
    }

    pub fn with_bindings(drive: &DriveConfig, sweep: &SweepConfig, dt: f64, bindings: BindingSet) -> Self {
        Self {
            shaper: InputShaper::new(drive, dt),
            bindings,
            sweep: DiagnosticSweep::new(sweep, drive.max_linear_speed, dt),
            nudge_speed: drive.nudge_fraction * drive.max_linear_speed,
        }
    }

    /// Build this tick's request.
    ///
    /// `None` means no live operator input: the request is Idle and every binding
    /// reads as released. Otherwise discrete actions win over the continuous
    /// field-centric command, and among discrete actions the last one in the
    /// binding table wins.
    pub fn compose(&mut self, sample: Option<&JoystickSample>) -> Composition {
        let actions = self.bindings.evaluate(sample);

        let mut discrete = None;
        let mut seed_field_centric = false;
        let mut sweeping = false;

        if let Some(sample) = sample {
            for action in actions {
                match action {
                    Action::SeedFieldCentric => seed_field_centric = true,
                    Action::Brake => discrete = Some(DriveRequest::Brake),
                    Action::PointWheels => {
                        let (forward, left) = self.shaper.translation_direction(sample);
                        let direction = if forward == 0.0 && left == 0.0 {
                            0.0
                        } else {
                            left.atan2(forward)
                        };
                        discrete = Some(DriveRequest::PointWheels { direction });
                    }
                    Action::Nudge(direction) => {
                        discrete = Some(DriveRequest::RobotCentric(self.nudge(direction)));
                    }
                    Action::Sweep(kind) => {
                        sweeping = true;
                        discrete = Some(DriveRequest::RobotCentric(self.sweep.command(kind)));
                    }
                }
            }
        }

        if !sweeping {
            self.sweep.stop();
        }

        let (request, shaped) = match (sample, discrete) {
            (Some(sample), None) => {
                let shaped = self.shaper.shape(sample);
                (DriveRequest::FieldCentric(shaped), shaped)
            }
            (Some(_), Some(request)) => (request, self.shaper.settle()),
            (None, _) => (DriveRequest::Idle, self.shaper.settle()),
        };

        Composition {
            request,
            shaped,
            seed_field_centric,
        }
    }

    /// Constant-speed robot-relative creep, not rate limited
    fn nudge(&self, direction: PovDirection) -> ChassisSpeeds {
        let speed = self.nudge_speed;
        match direction {
            PovDirection::Up => ChassisSpeeds::new(speed, 0.0, 0.0),
            PovDirection::Down => ChassisSpeeds::new(-speed, 0.0, 0.0),
            PovDirection::Left => ChassisSpeeds::new(0.0, speed, 0.0),
            PovDirection::Right => ChassisSpeeds::new(0.0, -speed, 0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AxisFlags;
    use crate::messages::Button;
    use std::f64::consts::FRAC_PI_2;

    const DT: f64 = 0.02;

    fn composer() -> DriveFrameComposer {
        DriveFrameComposer::new(&DriveConfig::default(), &SweepConfig::default(), DT)
    }

    fn sample(buttons: &[Button], pov: Option<u16>) -> JoystickSample {
        JoystickSample {
            buttons: buttons.to_vec(),
            pov,
            ..Default::default()
        }
    }

    #[test]
    fn test_no_input_is_idle_not_zero_velocity() {
        let mut composer = composer();
        let out = composer.compose(None);
        assert_eq!(out.request, DriveRequest::Idle);

        // Centered sticks with a live sample still hold position
        let out = composer.compose(Some(&JoystickSample::default()));
        assert_eq!(out.request, DriveRequest::FieldCentric(ChassisSpeeds::zero()));
    }

    #[test]
    fn test_stick_drives_field_centric() {
        let mut composer = composer();
        let out = composer.compose(Some(&JoystickSample {
            left_y: -1.0,
            ..Default::default()
        }));
        match out.request {
            DriveRequest::FieldCentric(speeds) => {
                assert!((speeds.vx - 0.5 * DT).abs() < 1e-12, "First tick is slew limited");
                assert_eq!(speeds.vy, 0.0);
            }
            other => panic!("Expected field centric, got {:?}", other),
        }
    }

    #[test]
    fn test_nudges_bypass_limiter() {
        let mut composer = composer();
        let out = composer.compose(Some(&sample(&[], Some(90))));
        let expected = 0.2 * DriveConfig::default().max_linear_speed;
        assert_eq!(
            out.request,
            DriveRequest::RobotCentric(ChassisSpeeds::new(0.0, -expected, 0.0))
        );
    }

    #[test]
    fn test_discrete_action_overrides_stick_and_limiter_settles() {
        let mut composer = composer();
        let forward = JoystickSample {
            left_y: -1.0,
            ..Default::default()
        };
        for _ in 0..10 {
            composer.compose(Some(&forward));
        }
        let braking = JoystickSample {
            buttons: vec![Button::Back, Button::B],
            ..forward.clone()
        };
        let out = composer.compose(Some(&braking));
        assert_eq!(out.request, DriveRequest::Brake);
        assert!(out.shaped.vx < 10.0 * 0.5 * DT, "Limiter should decay while braking");

        // Releasing the hold resumes from the settled value, not a jump
        let resumed = composer.compose(Some(&forward));
        match resumed.request {
            DriveRequest::FieldCentric(speeds) => {
                assert!((speeds.vx - out.shaped.vx).abs() <= 0.5 * DT + 1e-12)
            }
            other => panic!("Expected field centric, got {:?}", other),
        }
    }

    #[test]
    fn test_last_binding_wins_on_conflict() {
        let mut composer = composer();
        // POV up nudge and Back+B brake together: brake comes later in the table
        let out = composer.compose(Some(&sample(&[Button::Back, Button::B], Some(0))));
        assert_eq!(out.request, DriveRequest::Brake);
    }

    #[test]
    fn test_point_wheels_follows_left_stick() {
        let mut composer = composer();
        let out = composer.compose(Some(&JoystickSample {
            left_x: -1.0,
            buttons: vec![Button::Back, Button::A],
            ..Default::default()
        }));
        match out.request {
            DriveRequest::PointWheels { direction } => assert!((direction - FRAC_PI_2).abs() < 1e-9),
            other => panic!("Expected point wheels, got {:?}", other),
        }
    }

    #[test]
    fn test_point_wheels_keeps_stick_ratio_with_squared_response() {
        let drive = DriveConfig {
            squared: AxisFlags {
                forward: true,
                strafe: true,
                rotation: true,
            },
            ..Default::default()
        };
        let mut composer = DriveFrameComposer::new(&drive, &SweepConfig::default(), DT);
        let out = composer.compose(Some(&JoystickSample {
            left_x: -1.0,
            left_y: -0.5,
            buttons: vec![Button::Back, Button::A],
            ..Default::default()
        }));
        match out.request {
            DriveRequest::PointWheels { direction } => {
                println!("Point direction: {:.4} rad", direction);
                assert!((direction - 1.0f64.atan2(0.5)).abs() < 1e-9);
            }
            other => panic!("Expected point wheels, got {:?}", other),
        }
    }

    #[test]
    fn test_seed_reported_once_alongside_drive() {
        let mut composer = composer();
        let held = sample(&[Button::Back, Button::Start], None);
        let first = composer.compose(Some(&held));
        assert!(first.seed_field_centric);
        assert!(matches!(first.request, DriveRequest::FieldCentric(_)));
        assert!(!composer.compose(Some(&held)).seed_field_centric);
    }

    #[test]
    fn test_sweep_runs_robot_centric() {
        let mut composer = composer();
        let out = composer.compose(Some(&sample(&[Button::Start, Button::B], None)));
        assert_eq!(
            out.request,
            DriveRequest::RobotCentric(ChassisSpeeds::new(-0.6, 0.0, 0.0))
        );
    }
}
