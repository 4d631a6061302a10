//! Workflow executor: runs resolved steps one at a time against the plan.

use std::any::Any;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;

use chrono::Local;

use super::errors::WorkflowError;
use super::resolver::DependencyMap;
use super::step::WorkflowStep;
use super::types::{
    output_subdir, ExecutionSummary, PlanStepValidation, ProgressCallback, StepContext,
    StepValidation,
};
use crate::config::Settings;
use crate::logging::RunLogger;
use crate::models::{OutputKind, StepResult, StepStatus, VideoPlan, WorkflowResult, SKIPPED_MESSAGE};

/// File name of the report written into the run output directory.
pub const REPORT_FILE_NAME: &str = "execution_report.json";

/// Sequential step executor.
///
/// Steps run on the calling thread in resolved order. After the first failure
/// every remaining step is recorded as skipped, whether or not it depends on
/// the failed one.
pub struct WorkflowExecutor {
    settings: Arc<Settings>,
    logger: Arc<RunLogger>,
    steps: Vec<Box<dyn WorkflowStep>>,
    progress_callback: Option<ProgressCallback>,
    history: Vec<StepResult>,
}

impl WorkflowExecutor {
    /// Create an executor with no steps registered.
    pub fn new(settings: Settings, logger: Arc<RunLogger>) -> Self {
        Self {
            settings: Arc::new(settings),
            logger,
            steps: Vec::new(),
            progress_callback: None,
            history: Vec::new(),
        }
    }

    /// Register a step. A step with the same id replaces the earlier one.
    pub fn register(&mut self, step: Box<dyn WorkflowStep>) -> &mut Self {
        if let Some(existing) = self.steps.iter_mut().find(|s| s.id() == step.id()) {
            *existing = step;
        } else {
            self.steps.push(step);
        }
        self
    }

    /// Register a step (builder pattern).
    pub fn with_step<S: WorkflowStep + 'static>(mut self, step: S) -> Self {
        self.register(Box::new(step));
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Registered step ids in registration order.
    pub fn step_ids(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.id()).collect()
    }

    fn step(&self, step_id: &str) -> Option<&dyn WorkflowStep> {
        self.steps.iter().find(|s| s.id() == step_id).map(|s| s.as_ref())
    }

    /// Dependency map built from the registered steps.
    pub fn dependency_map(&self) -> DependencyMap {
        let mut map = DependencyMap::new();
        for step in &self.steps {
            map.insert(step.id(), step.dependencies());
        }
        map
    }

    fn context(&self, output_dir: &Path) -> StepContext {
        StepContext::new(Arc::clone(&self.settings), output_dir, Arc::clone(&self.logger))
            .with_progress_callback(self.progress_callback.clone())
    }

    fn report_progress(&self, step_id: &str, percent: u32, message: &str) {
        self.logger.progress(percent);
        if let Some(ref callback) = self.progress_callback {
            callback(step_id, percent, message);
        }
    }

    /// Run the requested steps (all registered steps when `None`).
    ///
    /// Only structural problems are returned as errors, and in that case no
    /// step has run. Step failures are recorded in the returned result.
    pub fn execute_workflow(
        &mut self,
        plan: &mut VideoPlan,
        output_dir: &Path,
        enabled_steps: Option<&[String]>,
        skip_dependencies: bool,
    ) -> Result<WorkflowResult, WorkflowError> {
        let start_time = Local::now();

        create_output_tree(output_dir)?;

        let requested: Vec<String> = match enabled_steps {
            Some(ids) => ids.to_vec(),
            None => self.step_ids().into_iter().map(String::from).collect(),
        };

        let map = self.dependency_map();
        let valid = map.filter_requested(&requested, skip_dependencies);
        if valid.is_empty() {
            self.logger.error("No valid steps to execute");
            return Err(WorkflowError::NoValidSteps);
        }

        let order = if skip_dependencies {
            map.restricted_to(&valid).resolve(&valid)?
        } else {
            map.resolve(&valid)?
        };

        self.logger.info(&format!("Execution order: {}", order.join(" -> ")));

        let ctx = self.context(output_dir);
        let total = order.len();
        let mut results: Vec<StepResult> = Vec::with_capacity(total);
        let mut failed = false;

        for (i, step_id) in order.iter().enumerate() {
            let Some(step) = self.step(step_id) else {
                return Err(WorkflowError::UnknownStep(step_id.clone()));
            };

            let percent = (i * 100 / total) as u32;
            self.report_progress(step_id, percent, &format!("Starting {}", step.name()));

            if failed {
                self.logger.skipped(&format!("{} ({})", step.name(), SKIPPED_MESSAGE));
                results.push(StepResult::skipped(step.id(), step.name()));
                continue;
            }

            self.logger.phase(&format!("{}: {}", step.id(), step.name()));
            let result = run_step(step, &ctx, plan);
            log_result(&self.logger, &result);

            failed = result.status == StepStatus::Failed;
            results.push(result);
        }

        self.report_progress("complete", 100, "Workflow finished");

        let mut workflow = WorkflowResult::from_results(results, start_time, output_dir.to_path_buf());

        let report_path = output_dir.join(REPORT_FILE_NAME);
        workflow.report_path = Some(report_path.clone());
        match write_report(&workflow, &report_path) {
            Ok(()) => self.logger.info(&format!("Execution report saved: {}", report_path.display())),
            Err(e) => {
                workflow.report_path = None;
                self.logger.error(&e.to_string());
            }
        }

        if workflow.success {
            self.logger.success(&format!(
                "Workflow completed: {}/{} steps in {:.1}s",
                workflow.completed_steps, workflow.total_steps, workflow.execution_time
            ));
        } else {
            self.logger.error(&format!(
                "Workflow failed, {} step(s) failed",
                workflow.failed_steps.len()
            ));
            for result in workflow.step_results.iter().filter(|r| r.status == StepStatus::Failed) {
                self.logger.error(&format!(
                    "  - {}: {}",
                    result.step_id,
                    result.error_message.as_deref().unwrap_or("")
                ));
            }
        }
        self.logger.flush();

        Ok(workflow)
    }

    /// Run one step directly, ignoring ordering and the failure latch.
    ///
    /// The result is appended to the execution history.
    pub fn execute_single_step(
        &mut self,
        step_id: &str,
        plan: &mut VideoPlan,
        output_dir: &Path,
    ) -> Result<StepResult, WorkflowError> {
        let step = self
            .step(step_id)
            .ok_or_else(|| WorkflowError::UnknownStep(step_id.to_string()))?;

        create_output_tree(output_dir)?;
        self.logger.phase(&format!("{}: {} (single step)", step.id(), step.name()));

        let ctx = self.context(output_dir);
        let result = run_step(step, &ctx, plan);
        log_result(&self.logger, &result);
        self.logger.flush();

        self.history.push(result.clone());
        Ok(result)
    }

    /// Latest status of a step in the execution history.
    pub fn step_status(&self, step_id: &str) -> Option<StepStatus> {
        self.history
            .iter()
            .rev()
            .find(|r| r.step_id == step_id)
            .map(|r| r.status)
    }

    pub fn history(&self) -> &[StepResult] {
        &self.history
    }

    /// Counts by status over the execution history.
    pub fn execution_summary(&self) -> ExecutionSummary {
        let mut summary = ExecutionSummary::default();
        for result in &self.history {
            summary.count(result.status);
        }
        summary
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
        self.logger.info("Execution history cleared");
    }

    /// Check the plan against every registered step's input requirements.
    pub fn validate_plan(&self, plan: &VideoPlan) -> PlanStepValidation {
        let steps: Vec<StepValidation> = self
            .steps
            .iter()
            .map(|step| {
                let error = step.validate_inputs(plan).err().map(|e| e.to_string());
                StepValidation {
                    step_id: step.id().to_string(),
                    step_name: step.name().to_string(),
                    valid: error.is_none(),
                    error,
                }
            })
            .collect();

        PlanStepValidation {
            overall_valid: steps.iter().all(|s| s.valid),
            steps,
        }
    }
}

/// Create the run directory and its per-kind subdirectories.
pub fn create_output_tree(output_dir: &Path) -> Result<(), WorkflowError> {
    for kind in OutputKind::all() {
        let dir = output_subdir(output_dir, *kind);
        fs::create_dir_all(&dir).map_err(|e| WorkflowError::setup_failed(&dir, e))?;
    }
    Ok(())
}

/// Validate and execute one step, converting errors and panics into a failed result.
fn run_step(step: &dyn WorkflowStep, ctx: &StepContext, plan: &mut VideoPlan) -> StepResult {
    let start_time = Local::now();

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        step.validate_inputs(plan)?;
        step.execute(ctx, plan)
    }));

    match outcome {
        Ok(Ok(output)) => StepResult::completed(
            step.id(),
            step.name(),
            start_time,
            output.output_files,
            output.metadata,
        ),
        Ok(Err(e)) => StepResult::failed(step.id(), step.name(), start_time, e.to_string(), e.kind()),
        Err(payload) => StepResult::failed(
            step.id(),
            step.name(),
            start_time,
            format!("step panicked: {}", panic_message(payload.as_ref())),
            "Panic",
        ),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn log_result(logger: &RunLogger, result: &StepResult) {
    match result.status {
        StepStatus::Completed => logger.success(&format!(
            "{} completed in {:.2}s ({} file(s))",
            result.step_name,
            result.duration(),
            result.output_files.len()
        )),
        _ => {
            logger.error(&format!(
                "{} failed: {}",
                result.step_name,
                result.error_message.as_deref().unwrap_or("")
            ));
            logger.show_tail(&result.step_id);
        }
    }
}

fn write_report(result: &WorkflowResult, path: &Path) -> Result<(), WorkflowError> {
    let failed = |message: String| WorkflowError::ReportFailed {
        path: path.to_path_buf(),
        message,
    };
    let json = serde_json::to_string_pretty(result).map_err(|e| failed(e.to_string()))?;
    fs::write(path, json).map_err(|e| failed(e.to_string()))
}
