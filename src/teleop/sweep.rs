// Drivetrain characterization sweeps (quasistatic ramp and dynamic step)

use tracing::info;

use crate::config::SweepConfig;
use crate::drivetrain::kinematics::ChassisSpeeds;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepKind {
    QuasistaticForward,
    QuasistaticReverse,
    DynamicForward,
    DynamicReverse,
}

impl SweepKind {
    fn sign(self) -> f64 {
        match self {
            SweepKind::QuasistaticForward | SweepKind::DynamicForward => 1.0,
            SweepKind::QuasistaticReverse | SweepKind::DynamicReverse => -1.0,
        }
    }
}

/// Runs one sweep at a time; the elapsed time restarts whenever the sweep changes or stops
#[derive(Debug, Clone)]
pub struct DiagnosticSweep {
    config: SweepConfig,
    max_speed: f64,
    dt: f64,
    active: Option<SweepKind>,
    elapsed: f64,
}

impl DiagnosticSweep {
    pub fn new(config: &SweepConfig, max_speed: f64, dt: f64) -> Self {
        Self {
            config: config.clone(),
            max_speed,
            dt,
            active: None,
            elapsed: 0.0,
        }
    }

    pub fn active(&self) -> Option<SweepKind> {
        self.active
    }

    /// Robot-relative command for this tick of `kind`
    pub fn command(&mut self, kind: SweepKind) -> ChassisSpeeds {
        if self.active != Some(kind) {
            info!("Starting {:?} sweep", kind);
            self.active = Some(kind);
            self.elapsed = 0.0;
        } else {
            self.elapsed += self.dt;
        }

        let speed = match kind {
            SweepKind::QuasistaticForward | SweepKind::QuasistaticReverse => {
                self.config.quasistatic_ramp_rate * self.elapsed
            }
            SweepKind::DynamicForward | SweepKind::DynamicReverse => self.config.dynamic_step_speed,
        };
        ChassisSpeeds::new(kind.sign() * speed.min(self.max_speed), 0.0, 0.0)
    }

    pub fn stop(&mut self) {
        if let Some(kind) = self.active.take() {
            info!("Stopped {:?} sweep after {:.2}s", kind, self.elapsed);
            self.elapsed = 0.0;
        }
    }
}
