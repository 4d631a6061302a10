//! Core enums used throughout the application.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a video plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanStatus {
    /// Created, not yet planned.
    #[default]
    Pending,
    /// Planning service call in progress.
    Planning,
    /// Fully planned and ready for generation.
    Completed,
    /// Planning failed.
    Failed,
}

impl std::fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlanStatus::Pending => write!(f, "pending"),
            PlanStatus::Planning => write!(f, "planning"),
            PlanStatus::Completed => write!(f, "completed"),
            PlanStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Status of one executed workflow step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    /// Not yet finalized.
    #[default]
    Pending,
    /// Step ran and succeeded.
    Completed,
    /// Step ran and failed.
    Failed,
    /// Step was not run because an earlier step failed.
    Skipped,
}

impl StepStatus {
    /// Get all statuses, in report order.
    pub fn all() -> &'static [StepStatus] {
        &[
            Self::Pending,
            Self::Completed,
            Self::Failed,
            Self::Skipped,
        ]
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepStatus::Pending => write!(f, "pending"),
            StepStatus::Completed => write!(f, "completed"),
            StepStatus::Failed => write!(f, "failed"),
            StepStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// Kind of output subdirectory created for every workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputKind {
    /// Cut region images.
    Cuts,
    /// Synthesized narration audio.
    Audio,
    /// Generated background videos.
    Background,
    /// Intermediate composition files.
    Composition,
    /// Final rendered video.
    Final,
}

impl OutputKind {
    /// Get all kinds in creation order.
    pub fn all() -> &'static [OutputKind] {
        &[
            Self::Cuts,
            Self::Audio,
            Self::Background,
            Self::Composition,
            Self::Final,
        ]
    }

    /// Directory name under the run output directory.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Cuts => "cuts",
            Self::Audio => "audio",
            Self::Background => "background",
            Self::Composition => "composition",
            Self::Final => "final",
        }
    }
}
