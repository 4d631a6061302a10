//! Cutting step - slices every planned region out of the source image.

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;

use super::{file_fragment, percent};
use crate::media::{ImageCropper, RegionCropper};
use crate::models::{OutputKind, VideoPlan};
use crate::workflow::errors::StepError;
use crate::workflow::step::WorkflowStep;
use crate::workflow::types::{StepContext, StepOutput};

/// Writes one `slice_<id>_<name>.png` per region into `cuts/`.
pub struct CuttingStep {
    cropper: Arc<dyn RegionCropper>,
}

impl CuttingStep {
    pub fn new(cropper: Arc<dyn RegionCropper>) -> Self {
        Self { cropper }
    }
}

impl Default for CuttingStep {
    fn default() -> Self {
        Self::new(Arc::new(ImageCropper::new()))
    }
}

impl WorkflowStep for CuttingStep {
    fn id(&self) -> &str {
        "step1"
    }

    fn name(&self) -> &str {
        "Image cutting"
    }

    fn description(&self) -> &str {
        "Cut each planned region out of the source image"
    }

    fn dependencies(&self) -> Vec<String> {
        Vec::new()
    }

    fn validate_inputs(&self, plan: &VideoPlan) -> Result<(), StepError> {
        if plan.regions.is_empty() {
            return Err(StepError::invalid_input("Plan has no regions to cut"));
        }
        if !plan.meta_info.source_image.is_file() {
            return Err(StepError::file_not_found(
                plan.meta_info.source_image.display().to_string(),
            ));
        }
        Ok(())
    }

    fn execute(&self, ctx: &StepContext, plan: &mut VideoPlan) -> Result<StepOutput, StepError> {
        let cuts_dir = ctx.output_path(OutputKind::Cuts);
        let source = plan.meta_info.source_image.clone();
        let total = plan.regions.len();

        ctx.logger.phase("Cutting regions");
        ctx.logger.info(&format!("Source: {}", source.display()));

        let mut written: Vec<PathBuf> = Vec::new();
        let mut failed: Vec<Value> = Vec::new();

        for (i, region) in plan.regions.iter_mut().enumerate() {
            let out_path = cuts_dir.join(format!(
                "slice_{}_{}.png",
                file_fragment(&region.region_id),
                file_fragment(&region.region_name)
            ));
            let c = region.coordinates;

            match self.cropper.crop(&source, &c, &out_path) {
                Ok(()) => {
                    ctx.logger.info(&format!(
                        "  {} ({}): {}x{} at ({}, {}) -> {}",
                        region.region_id,
                        region.region_name,
                        c.width,
                        c.height,
                        c.x,
                        c.y,
                        out_path.display()
                    ));
                    region.cut_path = Some(out_path.clone());
                    written.push(out_path);
                }
                Err(e) => {
                    ctx.logger.warn(&format!("Failed to cut {}: {}", region.region_id, e));
                    failed.push(Value::from(region.region_id.clone()));
                }
            }
            ctx.report_progress(self.id(), percent(i + 1, total), &region.region_id);
        }

        if written.is_empty() {
            return Err(StepError::other(format!("None of the {} regions could be cut", total)));
        }

        ctx.logger.success(&format!("Cut {} of {} regions", written.len(), total));
        plan.touch();

        Ok(StepOutput::new()
            .with_metadata("cut_count", written.len())
            .with_metadata("failed_regions", failed)
            .with_files(written))
    }
}
