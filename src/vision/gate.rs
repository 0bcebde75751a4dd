// Pose fusion gate: accept or reject candidates and pick their measurement weights

use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, warn};

use super::producer::PoseCandidate;
use crate::config::VisionConfig;
use crate::messages::MeasurementStdDevs;

#[derive(Debug, Clone, PartialEq)]
pub enum FusionDecision {
    Accepted {
        candidate: PoseCandidate,
        std_devs: MeasurementStdDevs,
    },
    RejectedStale,
    RejectedImplausible,
    RejectedNoTargets,
}

/// Telemetry view of FusionDecision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FusionOutcome {
    Accepted,
    RejectedStale,
    RejectedImplausible,
    RejectedNoTargets,
}

impl FusionDecision {
    pub fn outcome(&self) -> FusionOutcome {
        match self {
            FusionDecision::Accepted { .. } => FusionOutcome::Accepted,
            FusionDecision::RejectedStale => FusionOutcome::RejectedStale,
            FusionDecision::RejectedImplausible => FusionOutcome::RejectedImplausible,
            FusionDecision::RejectedNoTargets => FusionOutcome::RejectedNoTargets,
        }
    }
}

pub struct PoseFusionGate {
    platform_height: f64,
    height_tolerance: f64,
    max_candidate_age: f64,
    multi_tag_std_devs: MeasurementStdDevs,
    single_tag_std_devs: MeasurementStdDevs,
    // Newest accepted capture time per camera
    last_accepted: HashMap<String, f64>,
}

impl PoseFusionGate {
    pub fn new(config: &VisionConfig) -> Self {
        Self {
            platform_height: config.platform_height,
            height_tolerance: config.height_tolerance,
            max_candidate_age: config.max_candidate_age,
            multi_tag_std_devs: config.multi_tag_std_devs,
            single_tag_std_devs: config.single_tag_std_devs,
            last_accepted: HashMap::new(),
        }
    }

    /// Decide on this tick's candidate. Rules in order: no candidate, height
    /// plausibility, staleness, otherwise accepted.
    pub fn evaluate(&mut self, candidate: Option<PoseCandidate>, now: f64) -> FusionDecision {
        let Some(candidate) = candidate else {
            return FusionDecision::RejectedNoTargets;
        };

        let height_error = (candidate.height() - self.platform_height).abs();
        if !(height_error <= self.height_tolerance) {
            warn!(
                "Rejecting {} pose: height {:.3} m off the floor plane ({} tags)",
                candidate.camera, height_error, candidate.tag_count
            );
            return FusionDecision::RejectedImplausible;
        }

        let age = now - candidate.timestamp;
        let newest = self.last_accepted.get(&candidate.camera).copied();
        if age > self.max_candidate_age || newest.is_some_and(|t| candidate.timestamp <= t) {
            debug!("Rejecting stale {} pose ({:.3}s old)", candidate.camera, age);
            return FusionDecision::RejectedStale;
        }

        self.last_accepted
            .insert(candidate.camera.clone(), candidate.timestamp);
        let std_devs = self.confidence_weights(candidate.tag_count);
        FusionDecision::Accepted {
            candidate,
            std_devs,
        }
    }

    /// Tight weights for multi-tag solves, loose for single tags
    pub fn confidence_weights(&self, tag_count: usize) -> MeasurementStdDevs {
        if tag_count >= 2 {
            self.multi_tag_std_devs
        } else {
            self.single_tag_std_devs
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::estimator::EstimateStrategy;
    use nalgebra::{Isometry3, Vector3};

    fn candidate(height: f64, tags: usize, timestamp: f64) -> PoseCandidate {
        PoseCandidate {
            pose: Isometry3::new(Vector3::new(2.0, 3.0, height), Vector3::new(0.0, 0.0, 0.4)),
            timestamp,
            camera: "front".to_string(),
            tag_count: tags,
            ambiguity: 0.0,
            strategy: EstimateStrategy::MultiTag,
        }
    }

    fn gate() -> PoseFusionGate {
        PoseFusionGate::new(&VisionConfig::default())
    }

    #[test]
    fn test_no_candidate_is_no_targets() {
        assert_eq!(gate().evaluate(None, 1.0), FusionDecision::RejectedNoTargets);
    }

    #[test]
    fn test_height_outside_tolerance_always_rejected() {
        let mut gate = gate();
        for tags in [1, 2, 5] {
            for height in [0.31, -0.4, 0.5, 3.0, f64::NAN] {
                let decision = gate.evaluate(Some(candidate(height, tags, 10.0)), 10.0);
                assert_eq!(decision, FusionDecision::RejectedImplausible, "height {} tags {}", height, tags);
            }
        }
    }

    #[test]
    fn test_within_tolerance_multi_tag_accepted_tight() {
        let mut gate = gate();
        match gate.evaluate(Some(candidate(0.05, 3, 1.0)), 1.02) {
            FusionDecision::Accepted { std_devs, candidate } => {
                assert_eq!(std_devs, MeasurementStdDevs::new(0.5, 0.5, 1.0));
                assert_eq!(candidate.tag_count, 3);
            }
            other => panic!("Expected accepted, got {:?}", other),
        }
    }

    #[test]
    fn test_multi_tag_weights_strictly_tighter() {
        let gate = gate();
        let multi = gate.confidence_weights(2);
        let single = gate.confidence_weights(1);
        for (m, s) in multi.as_array().iter().zip(single.as_array()) {
            assert!(*m < s);
        }
    }

    #[test]
    fn test_old_or_repeated_candidates_are_stale() {
        let mut gate = gate();
        assert_eq!(
            gate.evaluate(Some(candidate(0.0, 2, 1.0)), 2.0),
            FusionDecision::RejectedStale
        );

        assert!(matches!(
            gate.evaluate(Some(candidate(0.0, 2, 5.0)), 5.01),
            FusionDecision::Accepted { .. }
        ));
        assert_eq!(
            gate.evaluate(Some(candidate(0.0, 2, 5.0)), 5.03),
            FusionDecision::RejectedStale,
            "Same capture time must not be injected twice"
        );
    }

    #[test]
    fn test_platform_height_offset() {
        let mut gate = PoseFusionGate::new(&VisionConfig {
            platform_height: 0.2,
            ..VisionConfig::default()
        });
        assert!(matches!(
            gate.evaluate(Some(candidate(0.45, 1, 1.0)), 1.0),
            FusionDecision::Accepted { .. }
        ));
    }
}
