//! Video plan: the root aggregate mutated in place by every pipeline step.
//!
//! The plan is persisted as versioned JSON. Every record is a typed struct
//! with required fields, so a malformed plan is rejected when it is loaded
//! rather than somewhere in the middle of a run.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::composition::{BackgroundTrack, CompositionPlan};
use super::enums::PlanStatus;

/// The only plan schema version this build reads and writes.
pub const PLAN_SCHEMA_VERSION: u32 = 1;

/// Errors raised while loading or saving a plan file.
#[derive(Error, Debug)]
pub enum PlanError {
    #[error("Plan file not found: {0}")]
    NotFound(PathBuf),

    #[error("I/O error on plan file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid plan JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported plan version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
}

impl PlanError {
    fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Pixel dimensions of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

/// Plan-level metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaInfo {
    /// Video title.
    #[serde(default)]
    pub title: String,
    /// Overall content description.
    #[serde(default)]
    pub description: String,
    /// Source image path.
    pub source_image: PathBuf,
    /// Directory the plan was created for.
    pub output_dir: PathBuf,
    /// Target (later: measured) total duration in seconds.
    pub total_duration: f64,
    /// Lifecycle status.
    #[serde(default)]
    pub status: PlanStatus,
    /// Source image size, once read from the image header.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_image_size: Option<ImageSize>,
    /// When the plan was created.
    pub created_at: DateTime<Local>,
    /// When the plan was last modified.
    pub updated_at: DateTime<Local>,
}

/// Rectangle in source image pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Coordinates {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Coordinates {
    /// Create a rectangle.
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Whether the rectangle has no area (treated as "whole image").
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Whether the rectangle lies within an image of the given size.
    pub fn fits_within(&self, size: ImageSize) -> bool {
        u64::from(self.x) + u64::from(self.width) <= u64::from(size.width)
            && u64::from(self.y) + u64::from(self.height) <= u64::from(size.height)
    }
}

fn default_voice() -> String {
    "alloy".to_string()
}

fn default_speaking_rate() -> f64 {
    1.0
}

/// Narration unit attached to one region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Narration {
    /// Text to speak.
    pub text: String,
    /// Planned duration in seconds.
    pub estimated_duration: f64,
    /// Measured duration after synthesis.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_duration: Option<f64>,
    /// Synthesized audio file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_path: Option<PathBuf>,
    /// Voice name passed to the speech service.
    #[serde(default = "default_voice")]
    pub voice: String,
    /// Speaking rate multiplier.
    #[serde(default = "default_speaking_rate")]
    pub speaking_rate: f64,
}

impl Narration {
    /// Create a narration with default voice settings.
    pub fn new(text: impl Into<String>, estimated_duration: f64) -> Self {
        Self {
            text: text.into(),
            estimated_duration,
            actual_duration: None,
            audio_path: None,
            voice: default_voice(),
            speaking_rate: default_speaking_rate(),
        }
    }

    /// Measured duration if known, otherwise the estimate.
    pub fn effective_duration(&self) -> f64 {
        self.actual_duration.unwrap_or(self.estimated_duration)
    }
}

/// A named rectangular area of the source image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub region_id: String,
    pub region_name: String,
    #[serde(default)]
    pub description: String,
    pub coordinates: Coordinates,
    pub narration: Narration,
    /// Cut image written by the cutting step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cut_path: Option<PathBuf>,
}

impl Region {
    /// Create a region.
    pub fn new(
        region_id: impl Into<String>,
        region_name: impl Into<String>,
        coordinates: Coordinates,
        narration: Narration,
    ) -> Self {
        Self {
            region_id: region_id.into(),
            region_name: region_name.into(),
            description: String::new(),
            coordinates,
            narration,
            cut_path: None,
        }
    }
}

/// One generated background video segment on the shared timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoSegment {
    pub segment_id: String,
    /// Generation prompt.
    pub prompt: String,
    /// Duration in seconds.
    pub duration: f64,
    /// Start on the timeline in seconds.
    #[serde(default)]
    pub start_time: f64,
    /// Region this segment illustrates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region_id: Option<String>,
    /// Generated video file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
}

impl VideoSegment {
    /// Create a segment starting at zero.
    pub fn new(segment_id: impl Into<String>, prompt: impl Into<String>, duration: f64) -> Self {
        Self {
            segment_id: segment_id.into(),
            prompt: prompt.into(),
            duration,
            start_time: 0.0,
            region_id: None,
            output_path: None,
        }
    }

    /// End on the timeline in seconds.
    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }
}

/// Root plan aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoPlan {
    /// Schema version.
    pub plan_version: u32,
    pub meta_info: MetaInfo,
    #[serde(default)]
    pub regions: Vec<Region>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub text_to_video_segments: Vec<VideoSegment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_track: Option<BackgroundTrack>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub composition: Option<CompositionPlan>,
}

/// Minimal view used to check the version before full deserialization.
#[derive(Deserialize)]
struct VersionHeader {
    plan_version: u32,
}

impl VideoPlan {
    /// Create an empty, pending plan for a source image.
    pub fn create_empty(
        source_image: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        total_duration: f64,
    ) -> Self {
        let now = Local::now();
        Self {
            plan_version: PLAN_SCHEMA_VERSION,
            meta_info: MetaInfo {
                title: String::new(),
                description: String::new(),
                source_image: source_image.into(),
                output_dir: output_dir.into(),
                total_duration,
                status: PlanStatus::Pending,
                source_image_size: None,
                created_at: now,
                updated_at: now,
            },
            regions: Vec::new(),
            text_to_video_segments: Vec::new(),
            background_track: None,
            composition: None,
        }
    }

    /// Current lifecycle status.
    pub fn status(&self) -> PlanStatus {
        self.meta_info.status
    }

    /// Set the lifecycle status and bump `updated_at`.
    pub fn set_status(&mut self, status: PlanStatus) {
        self.meta_info.status = status;
        self.touch();
    }

    /// Mark the plan as modified now.
    pub fn touch(&mut self) {
        self.meta_info.updated_at = Local::now();
    }

    /// Find a region by ID.
    pub fn region(&self, region_id: &str) -> Option<&Region> {
        self.regions.iter().find(|r| r.region_id == region_id)
    }

    /// Find a mutable region by ID.
    pub fn region_mut(&mut self, region_id: &str) -> Option<&mut Region> {
        self.regions.iter_mut().find(|r| r.region_id == region_id)
    }

    /// Narration segments in region order.
    pub fn narration_segments(&self) -> impl Iterator<Item = &Narration> {
        self.regions.iter().map(|r| &r.narration)
    }

    /// Sum of planned narration durations.
    pub fn total_estimated_duration(&self) -> f64 {
        self.narration_segments().map(|n| n.estimated_duration).sum()
    }

    /// Sum of measured narration durations, only if every segment was measured.
    pub fn total_actual_duration(&self) -> Option<f64> {
        self.narration_segments()
            .map(|n| n.actual_duration)
            .sum::<Option<f64>>()
    }

    /// Sum of measured durations, falling back to the estimate per segment.
    pub fn measured_duration(&self) -> f64 {
        self.narration_segments().map(Narration::effective_duration).sum()
    }

    /// Parse a plan from JSON, rejecting unsupported schema versions.
    pub fn from_json_str(content: &str) -> Result<Self, PlanError> {
        let header: VersionHeader = serde_json::from_str(content)?;
        if header.plan_version != PLAN_SCHEMA_VERSION {
            return Err(PlanError::UnsupportedVersion {
                found: header.plan_version,
                expected: PLAN_SCHEMA_VERSION,
            });
        }
        Ok(serde_json::from_str(content)?)
    }

    /// Serialize to pretty JSON.
    pub fn to_json_string(&self) -> Result<String, PlanError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load a plan from a JSON file.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, PlanError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(PlanError::NotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path).map_err(|e| PlanError::io(path, e))?;
        let plan = Self::from_json_str(&content)?;
        tracing::debug!("Loaded plan '{}' from {}", plan.meta_info.title, path.display());
        Ok(plan)
    }

    /// Write the plan to a JSON file atomically.
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<(), PlanError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| PlanError::io(parent, e))?;
        }

        let json = self.to_json_string()?;

        // Write atomically via temp file
        let temp_file = path.with_extension("json.tmp");
        fs::write(&temp_file, &json).map_err(|e| PlanError::io(&temp_file, e))?;
        fs::rename(&temp_file, path).map_err(|e| PlanError::io(path, e))?;

        tracing::debug!("Saved plan to {}", path.display());
        Ok(())
    }

    /// Write a new timestamped snapshot (`video_plan_YYYYMMDD_HHMMSS.json`) into `dir`.
    ///
    /// Existing snapshots are never overwritten; a numeric suffix is added when
    /// two snapshots land in the same second.
    pub fn save_snapshot(&self, dir: impl AsRef<Path>) -> Result<PathBuf, PlanError> {
        let dir = dir.as_ref();
        let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();

        let mut path = dir.join(format!("video_plan_{}.json", stamp));
        let mut counter = 1;
        while path.exists() {
            path = dir.join(format!("video_plan_{}_{}.json", stamp, counter));
            counter += 1;
        }

        self.save_json(&path)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::sample_plan;
    use tempfile::tempdir;

    #[test]
    fn json_roundtrip_preserves_plan() {
        let plan = sample_plan();
        let json = plan.to_json_string().unwrap();
        let parsed = VideoPlan::from_json_str(&json).unwrap();
        assert_eq!(parsed, plan);
    }

    #[test]
    fn json_keys_follow_field_order() {
        let json = sample_plan().to_json_string().unwrap();
        let version = json.find("\"plan_version\"").unwrap();
        let meta = json.find("\"meta_info\"").unwrap();
        let regions = json.find("\"regions\"").unwrap();
        assert!(version < meta && meta < regions);
        // Empty optional sections are omitted
        assert!(!json.contains("text_to_video_segments"));
    }

    #[test]
    fn rejects_unsupported_version() {
        let mut value = serde_json::to_value(sample_plan()).unwrap();
        value["plan_version"] = serde_json::json!(7);
        let err = VideoPlan::from_json_str(&value.to_string()).unwrap_err();
        assert!(matches!(
            err,
            PlanError::UnsupportedVersion {
                found: 7,
                expected: PLAN_SCHEMA_VERSION
            }
        ));
    }

    #[test]
    fn rejects_region_missing_required_field() {
        let mut value = serde_json::to_value(sample_plan()).unwrap();
        value["regions"][0]
            .as_object_mut()
            .unwrap()
            .remove("narration");
        assert!(matches!(
            VideoPlan::from_json_str(&value.to_string()),
            Err(PlanError::Json(_))
        ));
    }

    #[test]
    fn duration_totals() {
        let mut plan = sample_plan();
        assert_eq!(plan.total_estimated_duration(), 30.0);
        assert_eq!(plan.total_actual_duration(), None);
        assert_eq!(plan.measured_duration(), 30.0);

        plan.regions[0].narration.actual_duration = Some(10.0);
        assert_eq!(plan.total_actual_duration(), None);
        assert_eq!(plan.measured_duration(), 28.0);

        plan.regions[1].narration.actual_duration = Some(20.0);
        assert_eq!(plan.total_actual_duration(), Some(30.0));
    }

    #[test]
    fn save_and_load_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("plan.json");

        let plan = sample_plan();
        plan.save_json(&path).unwrap();
        assert!(!path.with_extension("json.tmp").exists());

        let loaded = VideoPlan::load_json(&path).unwrap();
        assert_eq!(loaded, plan);
    }

    #[test]
    fn load_missing_file_reports_not_found() {
        let dir = tempdir().unwrap();
        let err = VideoPlan::load_json(dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, PlanError::NotFound(_)));
    }

    #[test]
    fn snapshots_never_overwrite() {
        let dir = tempdir().unwrap();
        let plan = sample_plan();

        let first = plan.save_snapshot(dir.path()).unwrap();
        let second = plan.save_snapshot(dir.path()).unwrap();

        assert_ne!(first, second);
        assert!(first.exists() && second.exists());
        assert!(first
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("video_plan_"));
    }

    #[test]
    fn coordinates_bounds() {
        let size = ImageSize {
            width: 100,
            height: 100,
        };
        assert!(Coordinates::new(0, 0, 100, 100).fits_within(size));
        assert!(!Coordinates::new(50, 0, 51, 10).fits_within(size));
        assert!(Coordinates::default().is_empty());
    }
}
