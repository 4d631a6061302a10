//! Plan validation.

use std::collections::HashSet;

use serde::Serialize;

use super::enums::PlanStatus;
use super::plan::VideoPlan;

/// Slack for float sums compared against the total duration.
const DURATION_TOLERANCE: f64 = 1e-6;

/// Outcome of [`VideoPlan::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanValidation {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

impl PlanValidation {
    fn from_errors(errors: Vec<String>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
        }
    }
}

impl VideoPlan {
    /// Check the plan and collect every violation.
    ///
    /// Never mutates the plan, so repeated calls on an unchanged plan give
    /// identical results.
    pub fn validate(&self) -> PlanValidation {
        let mut errors = Vec::new();
        let meta = &self.meta_info;

        if !meta.source_image.exists() {
            errors.push(format!(
                "Source image not found: {}",
                meta.source_image.display()
            ));
        }
        if !meta.output_dir.is_dir() {
            errors.push(format!(
                "Output directory not found: {}",
                meta.output_dir.display()
            ));
        }
        if !(meta.total_duration > 0.0) {
            errors.push(format!(
                "Total duration must be positive, got {}",
                meta.total_duration
            ));
        }

        if meta.status == PlanStatus::Completed {
            self.validate_completed(&mut errors);
        }

        PlanValidation::from_errors(errors)
    }

    fn validate_completed(&self, errors: &mut Vec<String>) {
        let meta = &self.meta_info;

        if meta.title.trim().is_empty() {
            errors.push("Title is empty".to_string());
        }
        if meta.description.trim().is_empty() {
            errors.push("Description is empty".to_string());
        }
        if self.regions.is_empty() {
            errors.push("Plan has no regions".to_string());
        }

        let mut seen = HashSet::new();
        for region in &self.regions {
            if !seen.insert(region.region_id.as_str()) {
                errors.push(format!("Duplicate region id: {}", region.region_id));
            }
            if region.narration.text.trim().is_empty() {
                errors.push(format!(
                    "Region {} has empty narration text",
                    region.region_id
                ));
            }
            if let Some(size) = meta.source_image_size {
                let coords = &region.coordinates;
                if coords.is_empty() {
                    continue;
                }
                if !coords.fits_within(size) {
                    errors.push(format!(
                        "Region {} ({}x{} at {},{}) exceeds image bounds {}x{}",
                        region.region_id,
                        coords.width,
                        coords.height,
                        coords.x,
                        coords.y,
                        size.width,
                        size.height
                    ));
                }
            }
        }

        // After the timeline step the total follows the measured audio, so
        // either the planned or the measured narration has to fit.
        let limit = meta.total_duration + DURATION_TOLERANCE;
        let estimated = self.total_estimated_duration();
        let measured = self.measured_duration();
        if estimated > limit && measured > limit {
            errors.push(format!(
                "Narration duration {:.2}s exceeds total duration {:.2}s",
                measured, meta.total_duration
            ));
        }
    }
}
