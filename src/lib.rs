// Teleop command shaping and vision pose fusion for a swerve drivetrain

pub mod config;
pub mod drivetrain;
pub mod messages;
pub mod runtime;
pub mod telemetry;
pub mod teleop;
pub mod vision;
