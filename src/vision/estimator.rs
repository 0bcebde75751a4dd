// Robot pose from fiducial observations
//
// The coprocessor does the perspective solve; this turns its camera-relative results into
// field-relative robot poses using the layout and the camera mounting transform.

use nalgebra::Isometry3;
use serde::Serialize;
use std::sync::Arc;

use super::VisionError;
use super::camera::TimestampedObservation;
use super::layout::FieldLayout;
use crate::drivetrain::geometry::{Pose2d, project_to_plane};

// Ambiguities this close are a tie, broken by distance to the reference pose
const AMBIGUITY_TIE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimateStrategy {
    MultiTag,
    LowestAmbiguity,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EstimatedPose {
    pub pose: Isometry3<f64>,
    pub timestamp: f64,
    pub tag_count: usize,
    pub ambiguity: f64,
    pub strategy: EstimateStrategy,
}

pub struct TagPoseEstimator {
    layout: Arc<FieldLayout>,
    camera_to_robot: Isometry3<f64>,
    reference_pose: Option<Pose2d>,
}

impl TagPoseEstimator {
    pub fn new(layout: Arc<FieldLayout>, robot_to_camera: Isometry3<f64>) -> Self {
        Self {
            layout,
            camera_to_robot: robot_to_camera.inverse(),
            reference_pose: None,
        }
    }

    /// Pose used to break ties between equally ambiguous single-tag solutions
    pub fn set_reference_pose(&mut self, pose: Pose2d) {
        self.reference_pose = Some(pose);
    }

    /// Use the coprocessor's multi-tag solve. None unless at least two tags contributed.
    pub fn estimate_multi_tag(
        &self,
        frame: &TimestampedObservation,
    ) -> Result<Option<EstimatedPose>, VisionError> {
        let Some(multi) = &frame.observation.multi_tag else {
            return Ok(None);
        };
        if multi.fiducial_ids.len() < 2 {
            return Ok(None);
        }

        let pose = multi.field_to_camera.to_isometry() * self.camera_to_robot;
        check_finite(&pose, EstimateStrategy::MultiTag)?;

        Ok(Some(EstimatedPose {
            pose,
            timestamp: frame.timestamp,
            tag_count: multi.fiducial_ids.len(),
            ambiguity: 0.0,
            strategy: EstimateStrategy::MultiTag,
        }))
    }

    /// Single-tag solve from the least ambiguous target with a known layout pose
    pub fn estimate_lowest_ambiguity(
        &self,
        frame: &TimestampedObservation,
    ) -> Result<Option<EstimatedPose>, VisionError> {
        let mut solutions = Vec::new();
        for target in &frame.observation.targets {
            // Negative ambiguity means the coprocessor could not score it
            if target.ambiguity.is_nan() || target.ambiguity < 0.0 {
                continue;
            }
            let Some(field_to_tag) = self.layout.tag_pose(target.fiducial_id) else {
                continue;
            };
            let field_to_camera = field_to_tag * target.camera_to_target.to_isometry().inverse();
            let pose = field_to_camera * self.camera_to_robot;
            check_finite(&pose, EstimateStrategy::LowestAmbiguity)?;
            solutions.push((target.ambiguity, pose));
        }

        let Some(lowest) = solutions.iter().map(|(a, _)| *a).min_by(f64::total_cmp) else {
            return Ok(None);
        };
        let mut tied = solutions
            .iter()
            .filter(|(ambiguity, _)| *ambiguity - lowest <= AMBIGUITY_TIE);

        let best = match self.reference_pose {
            Some(reference) => tied.min_by(|(_, a), (_, b)| {
                let da = project_to_plane(a).distance_to(&reference);
                let db = project_to_plane(b).distance_to(&reference);
                da.total_cmp(&db)
            }),
            None => tied.next(),
        };

        Ok(best.map(|&(ambiguity, pose)| EstimatedPose {
            pose,
            timestamp: frame.timestamp,
            tag_count: 1,
            ambiguity,
            strategy: EstimateStrategy::LowestAmbiguity,
        }))
    }
}

fn check_finite(pose: &Isometry3<f64>, strategy: EstimateStrategy) -> Result<(), VisionError> {
    let t = &pose.translation;
    let q = pose.rotation.coords;
    if t.x.is_finite() && t.y.is_finite() && t.z.is_finite() && q.iter().all(|c| c.is_finite()) {
        Ok(())
    } else {
        Err(VisionError::NonFinite { strategy })
    }
}
