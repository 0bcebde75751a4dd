// Write-only diagnostics frame published once per tick

use serde::Serialize;

use crate::drivetrain::geometry::Pose2d;
use crate::messages::RuntimeHealth;
use crate::teleop::ShapedCommand;
use crate::vision::{FusionOutcome, LayoutStatus};

/// Last fusion decision for one camera
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CameraOutcome {
    pub camera: String,
    pub outcome: FusionOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryFrame {
    pub tick: u64,
    /// Fused drivetrain pose after this tick
    pub pose: Pose2d,
    pub heading_deg: f64,
    /// Planar projection of the last accepted vision pose
    pub vision_pose: Option<Pose2d>,
    pub vision_outcomes: Vec<CameraOutcome>,
    pub shaped: ShapedCommand,
    pub request: &'static str,
    pub layout: LayoutStatus,
    pub vision_faults: u64,
    pub health: RuntimeHealth,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivetrain::kinematics::ChassisSpeeds;

    #[test]
    fn test_frame_serializes_flat_json() {
        let frame = TelemetryFrame {
            tick: 7,
            pose: Pose2d::new(1.0, 2.0, 0.5),
            heading_deg: 0.5f64.to_degrees(),
            vision_pose: None,
            vision_outcomes: vec![CameraOutcome {
                camera: "FrontCamera".to_string(),
                outcome: FusionOutcome::RejectedNoTargets,
            }],
            shaped: ChassisSpeeds::zero(),
            request: "idle",
            layout: LayoutStatus::NotLoaded,
            vision_faults: 0,
            health: RuntimeHealth::CmdStale,
        };

        let json: serde_json::Value = serde_json::to_value(&frame).unwrap();
        println!("{}", json);
        assert_eq!(json["vision_outcomes"][0]["outcome"], "rejected_no_targets");
        assert_eq!(json["layout"], "not_loaded");
        assert_eq!(json["health"], "cmd_stale");
        assert_eq!(json["request"], "idle");
        assert!(json["vision_pose"].is_null());
    }
}
