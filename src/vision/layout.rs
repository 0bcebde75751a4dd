// Fiducial field layout and its lazy, retryable load lifecycle

use nalgebra::{Isometry3, Quaternion, Translation3, UnitQuaternion};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum LayoutError {
    #[error("Failed to read field layout {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse field layout: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Field layout contains no tags")]
    Empty,
}

// AprilTag layout JSON as exported by the field vendors
#[derive(Debug, Deserialize)]
struct RawLayout {
    tags: Vec<RawTag>,
    #[serde(default)]
    field: RawField,
}

#[derive(Debug, Deserialize)]
struct RawTag {
    #[serde(rename = "ID")]
    id: u32,
    pose: RawPose,
}

#[derive(Debug, Deserialize)]
struct RawPose {
    translation: RawTranslation,
    rotation: RawRotation,
}

#[derive(Debug, Deserialize)]
struct RawTranslation {
    x: f64,
    y: f64,
    z: f64,
}

#[derive(Debug, Deserialize)]
struct RawRotation {
    quaternion: RawQuaternion,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
struct RawQuaternion {
    w: f64,
    x: f64,
    y: f64,
    z: f64,
}

#[derive(Debug, Default, Deserialize)]
struct RawField {
    #[serde(default)]
    length: f64,
    #[serde(default)]
    width: f64,
}

/// World poses of every fiducial on the field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldLayout {
    tags: HashMap<u32, Isometry3<f64>>,
    pub length: f64,
    pub width: f64,
}

impl FieldLayout {
    pub fn from_tags(tags: impl IntoIterator<Item = (u32, Isometry3<f64>)>, length: f64, width: f64) -> Self {
        Self {
            tags: tags.into_iter().collect(),
            length,
            width,
        }
    }

    pub fn from_json(text: &str) -> Result<Self, LayoutError> {
        let raw: RawLayout = serde_json::from_str(text)?;
        if raw.tags.is_empty() {
            return Err(LayoutError::Empty);
        }

        let tags = raw.tags.into_iter().map(|tag| {
            let t = tag.pose.translation;
            let q = tag.pose.rotation.quaternion;
            let rotation = UnitQuaternion::from_quaternion(Quaternion::new(q.w, q.x, q.y, q.z));
            (tag.id, Isometry3::from_parts(Translation3::new(t.x, t.y, t.z), rotation))
        });
        Ok(Self::from_tags(tags, raw.field.length, raw.field.width))
    }

    pub fn tag_pose(&self, id: u32) -> Option<&Isometry3<f64>> {
        self.tags.get(&id)
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

/// Where a layout comes from; loading may be slow or fail
pub trait FieldLayoutSource {
    fn load(&mut self) -> Result<FieldLayout, LayoutError>;
}

/// Layout read from a JSON file on disk
#[derive(Debug, Clone)]
pub struct JsonFileLayout {
    path: PathBuf,
}

impl JsonFileLayout {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl FieldLayoutSource for JsonFileLayout {
    fn load(&mut self) -> Result<FieldLayout, LayoutError> {
        let text = std::fs::read_to_string(&self.path).map_err(|source| LayoutError::Io {
            path: self.path.clone(),
            source,
        })?;
        FieldLayout::from_json(&text)
    }
}

/// Layout lifecycle, checked every tick
#[derive(Debug, Clone, Default)]
pub enum FieldLayoutState {
    #[default]
    NotLoaded,
    /// Terminal for the session
    Loaded(Arc<FieldLayout>),
    /// Retried once the tick counter reaches `retry_at`
    LoadFailed { attempts: u32, retry_at: u64 },
}

/// Telemetry view of FieldLayoutState
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutStatus {
    NotLoaded,
    Loaded,
    LoadFailed,
}

impl FieldLayoutState {
    pub fn status(&self) -> LayoutStatus {
        match self {
            FieldLayoutState::NotLoaded => LayoutStatus::NotLoaded,
            FieldLayoutState::Loaded(_) => LayoutStatus::Loaded,
            FieldLayoutState::LoadFailed { .. } => LayoutStatus::LoadFailed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "tags": [
            {"ID": 1, "pose": {"translation": {"x": 15.0, "y": 0.5, "z": 1.3},
             "rotation": {"quaternion": {"W": 0.0, "X": 0.0, "Y": 0.0, "Z": 1.0}}}},
            {"ID": 7, "pose": {"translation": {"x": 0.0, "y": 4.0, "z": 1.4},
             "rotation": {"quaternion": {"W": 1.0, "X": 0.0, "Y": 0.0, "Z": 0.0}}}}
        ],
        "field": {"length": 16.54, "width": 8.21}
    }"#;

    #[test]
    fn test_parse_vendor_layout() {
        let layout = FieldLayout::from_json(SAMPLE).unwrap();
        assert_eq!(layout.len(), 2);
        assert!((layout.length - 16.54).abs() < 1e-12);

        let tag = layout.tag_pose(1).unwrap();
        assert!((tag.translation.x - 15.0).abs() < 1e-12);
        let (_, _, yaw) = tag.rotation.euler_angles();
        assert!((yaw.abs() - std::f64::consts::PI).abs() < 1e-9, "Tag 1 faces -X");
        assert!(layout.tag_pose(3).is_none());
    }

    #[test]
    fn test_empty_layout_rejected() {
        assert!(matches!(
            FieldLayout::from_json(r#"{"tags": []}"#),
            Err(LayoutError::Empty)
        ));
        assert!(matches!(FieldLayout::from_json("not json"), Err(LayoutError::Parse(_))));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let mut source = JsonFileLayout::new("/nonexistent/layout.json");
        assert!(matches!(source.load(), Err(LayoutError::Io { .. })));
    }

    #[test]
    fn test_state_status() {
        assert_eq!(FieldLayoutState::default().status(), LayoutStatus::NotLoaded);
        let failed = FieldLayoutState::LoadFailed {
            attempts: 1,
            retry_at: 10,
        };
        assert_eq!(failed.status(), LayoutStatus::LoadFailed);
    }
}
