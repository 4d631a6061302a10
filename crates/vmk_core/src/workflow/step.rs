//! Workflow step trait definition.

use super::errors::StepError;
use super::types::{StepContext, StepOutput};
use crate::models::VideoPlan;

/// Trait for workflow steps.
///
/// The executor calls `validate_inputs` then `execute` on the shared plan.
/// Steps report failure through the returned error; the executor turns it
/// into a failed result and never lets it propagate.
///
/// # Example
///
/// ```ignore
/// struct TimelineStep;
///
/// impl WorkflowStep for TimelineStep {
///     fn id(&self) -> &str { "step3" }
///     fn name(&self) -> &str { "Timeline recalculation" }
///     fn dependencies(&self) -> Vec<String> { vec!["step2".into()] }
///
///     fn validate_inputs(&self, plan: &VideoPlan) -> Result<(), StepError> {
///         if plan.regions.is_empty() {
///             return Err(StepError::invalid_input("No narration"));
///         }
///         Ok(())
///     }
///
///     fn execute(&self, ctx: &StepContext, plan: &mut VideoPlan) -> Result<StepOutput, StepError> {
///         let change = recalculate_plan(plan, plan.measured_duration());
///         Ok(StepOutput::new().with_metadata("previous_total", change.previous_total))
///     }
/// }
/// ```
pub trait WorkflowStep: Send + Sync {
    /// Stable identifier used in dependency maps and reports (e.g. `step1`).
    fn id(&self) -> &str;

    /// Human-readable name (for logging and reports).
    fn name(&self) -> &str;

    /// What this step does.
    fn description(&self) -> &str {
        self.name()
    }

    /// Ids of the steps that must run before this one.
    fn dependencies(&self) -> Vec<String>;

    /// Check preconditions on the plan before execution.
    fn validate_inputs(&self, plan: &VideoPlan) -> Result<(), StepError>;

    /// Perform the step's work, mutating the plan in place.
    fn execute(&self, ctx: &StepContext, plan: &mut VideoPlan) -> Result<StepOutput, StepError>;
}
