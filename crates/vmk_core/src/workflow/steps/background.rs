//! Background video step - generates one clip per text-to-video segment.

use std::sync::Arc;

use serde_json::Value;

use super::{file_fragment, percent};
use crate::models::{OutputKind, VideoPlan};
use crate::services::VideoGenerator;
use crate::workflow::errors::StepError;
use crate::workflow::step::WorkflowStep;
use crate::workflow::types::{StepContext, StepOutput};

pub struct BackgroundVideoStep {
    video: Arc<dyn VideoGenerator>,
}

impl BackgroundVideoStep {
    pub fn new(video: Arc<dyn VideoGenerator>) -> Self {
        Self { video }
    }
}

impl WorkflowStep for BackgroundVideoStep {
    fn id(&self) -> &str {
        "step4"
    }

    fn name(&self) -> &str {
        "Background video"
    }

    fn description(&self) -> &str {
        "Generate a background clip for every video segment"
    }

    fn dependencies(&self) -> Vec<String> {
        vec!["step3".to_string()]
    }

    fn validate_inputs(&self, plan: &VideoPlan) -> Result<(), StepError> {
        if plan.text_to_video_segments.is_empty() {
            return Err(StepError::invalid_input("Plan has no text-to-video segments"));
        }
        if let Some(segment) = plan
            .text_to_video_segments
            .iter()
            .find(|s| s.prompt.trim().is_empty())
        {
            return Err(StepError::invalid_input(format!(
                "Segment {} has an empty prompt",
                segment.segment_id
            )));
        }
        Ok(())
    }

    fn execute(&self, ctx: &StepContext, plan: &mut VideoPlan) -> Result<StepOutput, StepError> {
        let background_dir = ctx.output_path(OutputKind::Background);
        let total = plan.text_to_video_segments.len();

        ctx.logger.phase("Generating background video");

        let mut written = Vec::new();
        let mut failed: Vec<Value> = Vec::new();

        for (i, segment) in plan.text_to_video_segments.iter_mut().enumerate() {
            let out_path = background_dir.join(format!(
                "background_{}.mp4",
                file_fragment(&segment.segment_id)
            ));
            ctx.logger.info(&format!(
                "  {} ({:.2}s at {:.2}s): {}",
                segment.segment_id, segment.duration, segment.start_time, segment.prompt
            ));

            match self.video.generate(&segment.prompt, segment.duration, &out_path) {
                Ok(path) => {
                    segment.output_path = Some(path.clone());
                    written.push(path);
                }
                Err(e) => {
                    ctx.logger.warn(&format!(
                        "Video generation failed for {}: {}",
                        segment.segment_id, e
                    ));
                    failed.push(Value::from(segment.segment_id.clone()));
                }
            }
            ctx.report_progress(self.id(), percent(i + 1, total), &segment.segment_id);
        }

        if written.is_empty() {
            return Err(StepError::other("No background video could be generated"));
        }

        ctx.logger.success(&format!("Generated {} of {} clips", written.len(), total));
        plan.touch();

        Ok(StepOutput::new()
            .with_metadata("clip_count", written.len())
            .with_metadata("failed_segments", failed)
            .with_files(written))
    }
}
