// Vision pose candidate producer
//
// Owns the field layout lifecycle and one pipeline per camera. Every failure below this
// boundary is logged, counted and turned into "no observation" for the tick.

use nalgebra::Isometry3;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::VisionError;
use super::camera::CameraSource;
use super::estimator::{EstimateStrategy, TagPoseEstimator};
use super::layout::{FieldLayout, FieldLayoutSource, FieldLayoutState};
use crate::drivetrain::geometry::{Pose2d, project_to_plane};

/// A robot pose proposed by one camera for one tick
#[derive(Debug, Clone, PartialEq)]
pub struct PoseCandidate {
    pub pose: Isometry3<f64>,
    /// Capture time in the runtime clock (seconds)
    pub timestamp: f64,
    pub camera: String,
    pub tag_count: usize,
    pub ambiguity: f64,
    pub strategy: EstimateStrategy,
}

impl PoseCandidate {
    pub fn height(&self) -> f64 {
        self.pose.translation.z
    }

    /// Planar position and heading
    pub fn to_pose2d(&self) -> Pose2d {
        project_to_plane(&self.pose)
    }
}

/// What one camera produced this tick
#[derive(Debug, Clone, PartialEq)]
pub struct CameraPoll {
    pub camera: String,
    pub candidate: Option<PoseCandidate>,
}

struct CameraPipeline<C> {
    source: C,
    robot_to_camera: Isometry3<f64>,
    estimator: Option<TagPoseEstimator>,
}

pub struct VisionPoseProducer<C, L> {
    layout_source: L,
    layout_state: FieldLayoutState,
    retry_ticks: u64,
    cameras: Vec<CameraPipeline<C>>,
    last_accepted: Option<Isometry3<f64>>,
    faults: u64,
}

impl<C: CameraSource, L: FieldLayoutSource> VisionPoseProducer<C, L> {
    /// `cameras` pairs each source with its robot -> camera mounting transform
    pub fn new(layout_source: L, cameras: Vec<(C, Isometry3<f64>)>, retry_ticks: u64) -> Self {
        Self {
            layout_source,
            layout_state: FieldLayoutState::NotLoaded,
            retry_ticks: retry_ticks.max(1),
            cameras: cameras
                .into_iter()
                .map(|(source, robot_to_camera)| CameraPipeline {
                    source,
                    robot_to_camera,
                    estimator: None,
                })
                .collect(),
            last_accepted: None,
            faults: 0,
        }
    }

    pub fn layout_state(&self) -> &FieldLayoutState {
        &self.layout_state
    }

    /// Errors caught at the pipeline boundary so far
    pub fn faults(&self) -> u64 {
        self.faults
    }

    pub fn camera_mut(&mut self, name: &str) -> Option<&mut C> {
        self.cameras
            .iter_mut()
            .find(|c| c.source.name() == name)
            .map(|c| &mut c.source)
    }

    /// Last candidate the gate accepted, kept for telemetry only
    pub fn last_accepted(&self) -> Option<&Isometry3<f64>> {
        self.last_accepted.as_ref()
    }

    pub fn record_accepted(&mut self, candidate: &PoseCandidate) {
        self.last_accepted = Some(candidate.pose);
    }

    /// Produce at most one candidate per camera.
    ///
    /// While the layout is missing this only attempts a load (on its own tick) and every
    /// camera reports no observation. `reference` is the drivetrain pose read at the
    /// start of the tick.
    pub fn poll(&mut self, tick: u64, reference: Pose2d) -> Vec<CameraPoll> {
        if !self.ensure_layout(tick) {
            return self
                .cameras
                .iter()
                .map(|c| CameraPoll {
                    camera: c.source.name().to_string(),
                    candidate: None,
                })
                .collect();
        }

        let mut polls = Vec::with_capacity(self.cameras.len());
        for camera in &mut self.cameras {
            let name = camera.source.name().to_string();
            let candidate = match Self::produce(camera, reference) {
                Ok(candidate) => candidate,
                Err(e) => {
                    self.faults += 1;
                    warn!("Vision pipeline error on {}: {}", name, e);
                    None
                }
            };
            polls.push(CameraPoll { camera: name, candidate });
        }
        polls
    }

    /// True once the layout is usable on a tick after the one that loaded it
    fn ensure_layout(&mut self, tick: u64) -> bool {
        let attempts = match self.layout_state {
            FieldLayoutState::Loaded(_) => return true,
            FieldLayoutState::NotLoaded => 0,
            FieldLayoutState::LoadFailed { attempts, retry_at } => {
                if tick < retry_at {
                    return false;
                }
                attempts
            }
        };

        match self.layout_source.load() {
            Ok(layout) => {
                info!("Field layout loaded with {} tags", layout.len());
                self.install_layout(Arc::new(layout));
            }
            Err(e) => {
                let attempts = attempts + 1;
                if attempts == 1 {
                    warn!("Failed to load field layout: {} (retrying every {} ticks)", e, self.retry_ticks);
                } else {
                    debug!("Field layout load attempt {} failed: {}", attempts, e);
                }
                self.layout_state = FieldLayoutState::LoadFailed {
                    attempts,
                    retry_at: tick + self.retry_ticks,
                };
            }
        }
        // The load itself used this tick
        false
    }

    fn install_layout(&mut self, layout: Arc<FieldLayout>) {
        for camera in &mut self.cameras {
            camera.estimator = Some(TagPoseEstimator::new(layout.clone(), camera.robot_to_camera));
        }
        self.layout_state = FieldLayoutState::Loaded(layout);
    }

    fn produce(
        camera: &mut CameraPipeline<C>,
        reference: Pose2d,
    ) -> Result<Option<PoseCandidate>, VisionError> {
        let frames = camera.source.latest_unread_observations()?;
        // Only the newest frame matters; older ones are already stale
        let Some(latest) = frames.into_iter().max_by(|a, b| a.timestamp.total_cmp(&b.timestamp))
        else {
            return Ok(None);
        };

        let Some(estimator) = camera.estimator.as_mut() else {
            return Err(VisionError::Solver("estimator not initialized".to_string()));
        };
        estimator.set_reference_pose(reference);

        let estimate = match estimator.estimate_multi_tag(&latest)? {
            Some(estimate) => Some(estimate),
            None => estimator.estimate_lowest_ambiguity(&latest)?,
        };

        Ok(estimate.map(|e| PoseCandidate {
            pose: e.pose,
            timestamp: e.timestamp,
            camera: camera.source.name().to_string(),
            tag_count: e.tag_count,
            ambiguity: e.ambiguity,
            strategy: e.strategy,
        }))
    }
}
