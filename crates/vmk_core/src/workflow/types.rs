//! Core types for the workflow engine.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use crate::config::Settings;
use crate::logging::RunLogger;
use crate::models::{Metadata, OutputKind, StepStatus};

/// Progress callback type for reporting workflow progress.
///
/// Arguments: (step_id, percent_complete, message)
pub type ProgressCallback = Arc<dyn Fn(&str, u32, &str) + Send + Sync>;

/// Read-only context passed to workflow steps.
pub struct StepContext {
    /// Application settings.
    pub settings: Arc<Settings>,
    /// Run output directory (contains the per-kind subdirectories).
    pub output_dir: PathBuf,
    /// Per-run logger.
    pub logger: Arc<RunLogger>,
    progress_callback: Option<ProgressCallback>,
}

impl StepContext {
    pub fn new(settings: Arc<Settings>, output_dir: impl Into<PathBuf>, logger: Arc<RunLogger>) -> Self {
        Self {
            settings,
            output_dir: output_dir.into(),
            logger,
            progress_callback: None,
        }
    }

    pub fn with_progress_callback(mut self, callback: Option<ProgressCallback>) -> Self {
        self.progress_callback = callback;
        self
    }

    /// Directory for one kind of output.
    pub fn output_path(&self, kind: OutputKind) -> PathBuf {
        output_subdir(&self.output_dir, kind)
    }

    /// Report progress to callback (if set).
    pub fn report_progress(&self, step_id: &str, percent: u32, message: &str) {
        if let Some(ref callback) = self.progress_callback {
            callback(step_id, percent, message);
        }
    }
}

pub(crate) fn output_subdir(output_dir: &Path, kind: OutputKind) -> PathBuf {
    output_dir.join(kind.dir_name())
}

/// What a successful step hands back to the executor.
#[derive(Debug, Clone, Default)]
pub struct StepOutput {
    /// Files produced by the step.
    pub output_files: Vec<PathBuf>,
    /// Diagnostic values copied into the step result.
    pub metadata: Metadata,
}

impl StepOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_files.push(path.into());
        self
    }

    pub fn with_files(mut self, paths: impl IntoIterator<Item = PathBuf>) -> Self {
        self.output_files.extend(paths);
        self
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

/// Counts over the single-step execution history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionSummary {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub pending: usize,
}

impl ExecutionSummary {
    pub(crate) fn count(&mut self, status: StepStatus) {
        self.total += 1;
        match status {
            StepStatus::Completed => self.completed += 1,
            StepStatus::Failed => self.failed += 1,
            StepStatus::Skipped => self.skipped += 1,
            StepStatus::Pending => self.pending += 1,
        }
    }
}

/// `validate_inputs` outcome for one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepValidation {
    pub step_id: String,
    pub step_name: String,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Applicability of a plan to every registered step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanStepValidation {
    pub overall_valid: bool,
    pub steps: Vec<StepValidation>,
}
