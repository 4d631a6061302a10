//! Timeline step - rescales the plan to the measured narration length.

use crate::models::VideoPlan;
use crate::timeline::recalculate_plan;
use crate::workflow::errors::StepError;
use crate::workflow::step::WorkflowStep;
use crate::workflow::types::{StepContext, StepOutput};

pub struct TimelineStep;

impl TimelineStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TimelineStep {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowStep for TimelineStep {
    fn id(&self) -> &str {
        "step3"
    }

    fn name(&self) -> &str {
        "Timeline recalculation"
    }

    fn description(&self) -> &str {
        "Rescale video segments and timed artifacts to the narration length"
    }

    fn dependencies(&self) -> Vec<String> {
        vec!["step2".to_string()]
    }

    fn validate_inputs(&self, plan: &VideoPlan) -> Result<(), StepError> {
        if plan.regions.is_empty() {
            return Err(StepError::invalid_input("Plan has no narration segments"));
        }
        if plan.measured_duration() <= 0.0 {
            return Err(StepError::invalid_input("Narration has no positive duration"));
        }
        Ok(())
    }

    fn execute(&self, ctx: &StepContext, plan: &mut VideoPlan) -> Result<StepOutput, StepError> {
        ctx.logger.phase("Recalculating timeline");

        if plan.total_actual_duration().is_none() {
            ctx.logger
                .warn("Some narration was not measured, using estimates for those segments");
        }

        let new_total = plan.measured_duration();
        let change = recalculate_plan(plan, new_total);

        ctx.logger.info(&format!(
            "Total duration {:.2}s -> {:.2}s across {} segments",
            change.previous_total, change.new_total, change.segment_count
        ));
        if change.clamped.dropped > 0 || change.clamped.truncated > 0 {
            ctx.logger.info(&format!(
                "Timed artifacts: {} dropped, {} truncated",
                change.clamped.dropped, change.clamped.truncated
            ));
        }

        Ok(StepOutput::new()
            .with_metadata("previous_total", change.previous_total)
            .with_metadata("new_total", change.new_total)
            .with_metadata("segment_count", change.segment_count)
            .with_metadata("artifacts_dropped", change.clamped.dropped)
            .with_metadata("artifacts_truncated", change.clamped.truncated))
    }
}
