// Vision pipeline: camera frames -> pose candidates -> fusion decisions

pub mod camera;
pub mod estimator;
pub mod gate;
pub mod layout;
pub mod producer;

pub use camera::{CameraSource, ObservationBuffer, TimestampedObservation};
pub use estimator::{EstimateStrategy, TagPoseEstimator};
pub use gate::{FusionDecision, FusionOutcome, PoseFusionGate};
pub use layout::{FieldLayout, FieldLayoutSource, FieldLayoutState, JsonFileLayout, LayoutStatus};
pub use producer::{CameraPoll, PoseCandidate, VisionPoseProducer};

/// Failures inside the vision pipeline. None of these leave the producer.
#[derive(Debug, thiserror::Error)]
pub enum VisionError {
    #[error("Camera {camera} unavailable: {reason}")]
    CameraUnavailable { camera: String, reason: String },

    #[error("Pose solve failed: {0}")]
    Solver(String),

    #[error("{strategy:?} solve produced a non-finite pose")]
    NonFinite { strategy: EstimateStrategy },
}
