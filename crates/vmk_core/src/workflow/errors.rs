//! Error types for the workflow engine.
//!
//! Step errors never escape a run: the executor records them as failed
//! results. Only structural problems surface as [`WorkflowError`].

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::media::MediaError;
use crate::models::PlanError;
use crate::services::ServiceError;

/// Run-level error. Nothing has executed when one of these is returned.
#[derive(Error, Debug)]
pub enum WorkflowError {
    /// The requested steps cannot be ordered.
    #[error("Circular or unsatisfiable dependencies among: {}", unresolved.join(", "))]
    CycleDetected { unresolved: Vec<String> },

    /// No registered step with this id.
    #[error("Unknown step id: {0}")]
    UnknownStep(String),

    /// Filtering removed every requested step.
    #[error("No valid steps to execute")]
    NoValidSteps,

    /// Output directories could not be created.
    #[error("Workflow setup failed for {path}: {source}")]
    SetupFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The execution report could not be written.
    #[error("Failed to write execution report {path}: {message}")]
    ReportFailed { path: PathBuf, message: String },
}

impl WorkflowError {
    pub fn setup_failed(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::SetupFailed {
            path: path.into(),
            source,
        }
    }
}

/// Why a step did not complete. Recorded on the step result, with
/// [`StepError::kind`] as the error type.
#[derive(Error, Debug)]
pub enum StepError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{operation}: {source}")]
    ServiceFailed {
        operation: String,
        #[source]
        source: ServiceError,
    },

    #[error("{tool} exited with {exit_code}: {message}")]
    CommandFailed {
        tool: String,
        exit_code: i32,
        message: String,
    },

    #[error("{operation}: {source}")]
    IoError {
        operation: String,
        #[source]
        source: io::Error,
    },

    #[error("missing file {path}")]
    FileNotFound { path: String },

    /// Unusable model output or malformed JSON.
    #[error("could not parse {what}: {message}")]
    ParseError { what: String, message: String },

    #[error("cannot run: {0}")]
    PreconditionFailed(String),

    #[error("{0}")]
    Other(String),
}

impl StepError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn service_failed(operation: impl Into<String>, source: ServiceError) -> Self {
        let operation = operation.into();
        Self::ServiceFailed { operation, source }
    }

    pub fn io_error(operation: impl Into<String>, source: io::Error) -> Self {
        let operation = operation.into();
        Self::IoError { operation, source }
    }

    pub fn file_not_found(path: impl Into<String>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    pub fn parse_error(what: impl Into<String>, message: impl Into<String>) -> Self {
        let (what, message) = (what.into(), message.into());
        Self::ParseError { what, message }
    }

    pub fn precondition_failed(message: impl Into<String>) -> Self {
        Self::PreconditionFailed(message.into())
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "InvalidInput",
            Self::ServiceFailed { .. } => "ServiceFailed",
            Self::CommandFailed { .. } => "CommandFailed",
            Self::IoError { .. } => "IoError",
            Self::FileNotFound { .. } => "FileNotFound",
            Self::ParseError { .. } => "ParseError",
            Self::PreconditionFailed(_) => "PreconditionFailed",
            Self::Other(_) => "Other",
        }
    }
}

impl From<MediaError> for StepError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::Io { operation, source } => Self::IoError { operation, source },
            MediaError::CommandFailed { tool, exit_code, message } => {
                Self::CommandFailed { tool, exit_code, message }
            }
            MediaError::NothingToRender => Self::PreconditionFailed("nothing to render".to_string()),
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<PlanError> for StepError {
    fn from(err: PlanError) -> Self {
        match err {
            PlanError::Io { path, source } => Self::IoError {
                operation: format!("writing {}", path.display()),
                source,
            },
            other => Self::Other(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_error_displays_context() {
        let err = StepError::from(MediaError::CommandFailed {
            tool: "ffmpeg".to_string(),
            exit_code: 1,
            message: "Invalid data found".to_string(),
        });
        assert_eq!(err.to_string(), "ffmpeg exited with 1: Invalid data found");
        assert_eq!(err.kind(), "CommandFailed");
    }

    #[test]
    fn service_failure_chains_source() {
        let err = StepError::service_failed(
            "Speech synthesis for region_2",
            ServiceError::MissingApiKey("OPENAI_API_KEY".to_string()),
        );
        let msg = err.to_string();
        assert!(msg.contains("region_2"));
        assert!(msg.contains("OPENAI_API_KEY"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn cycle_lists_unresolved() {
        let err = WorkflowError::CycleDetected {
            unresolved: vec!["a".to_string(), "b".to_string()],
        };
        assert!(err.to_string().ends_with("a, b"));
    }
}
