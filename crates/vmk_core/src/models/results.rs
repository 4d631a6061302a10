//! Step and workflow result records.

use std::path::PathBuf;

use chrono::{DateTime, Local};
use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::enums::StepStatus;

/// Message recorded for every step skipped by the first-failure latch.
pub const SKIPPED_MESSAGE: &str = "skipped because a previous step failed";

/// Free-form diagnostic metadata.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Finalized outcome of one executed (or skipped) step.
///
/// Built once through [`StepResult::completed`], [`StepResult::failed`] or
/// [`StepResult::skipped`] and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StepResult {
    pub step_id: String,
    pub step_name: String,
    pub status: StepStatus,
    pub start_time: DateTime<Local>,
    pub end_time: DateTime<Local>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub output_files: Vec<PathBuf>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl StepResult {
    /// Successful step.
    pub fn completed(
        step_id: impl Into<String>,
        step_name: impl Into<String>,
        start_time: DateTime<Local>,
        output_files: Vec<PathBuf>,
        metadata: Metadata,
    ) -> Self {
        Self {
            step_id: step_id.into(),
            step_name: step_name.into(),
            status: StepStatus::Completed,
            start_time,
            end_time: Local::now(),
            error_message: None,
            output_files,
            metadata,
        }
    }

    /// Failed step. `error_type` is recorded in the metadata.
    pub fn failed(
        step_id: impl Into<String>,
        step_name: impl Into<String>,
        start_time: DateTime<Local>,
        error_message: impl Into<String>,
        error_type: &str,
    ) -> Self {
        let mut metadata = Metadata::new();
        metadata.insert("error_type".to_string(), error_type.into());
        Self {
            step_id: step_id.into(),
            step_name: step_name.into(),
            status: StepStatus::Failed,
            start_time,
            end_time: Local::now(),
            error_message: Some(error_message.into()),
            output_files: Vec::new(),
            metadata,
        }
    }

    /// Step not run because an earlier step in the run failed.
    pub fn skipped(step_id: impl Into<String>, step_name: impl Into<String>) -> Self {
        let now = Local::now();
        Self {
            step_id: step_id.into(),
            step_name: step_name.into(),
            status: StepStatus::Skipped,
            start_time: now,
            end_time: now,
            error_message: Some(SKIPPED_MESSAGE.to_string()),
            output_files: Vec::new(),
            metadata: Metadata::new(),
        }
    }

    /// Wall-clock duration in seconds.
    pub fn duration(&self) -> f64 {
        (self.end_time - self.start_time)
            .to_std()
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }

    pub fn is_successful(&self) -> bool {
        self.status == StepStatus::Completed
    }
}

impl Serialize for StepResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("StepResult", 9)?;
        s.serialize_field("step_id", &self.step_id)?;
        s.serialize_field("step_name", &self.step_name)?;
        s.serialize_field("status", &self.status)?;
        s.serialize_field("start_time", &self.start_time)?;
        s.serialize_field("end_time", &self.end_time)?;
        s.serialize_field("duration", &self.duration())?;
        s.serialize_field("error_message", &self.error_message)?;
        s.serialize_field("output_files", &self.output_files)?;
        s.serialize_field("metadata", &self.metadata)?;
        s.end()
    }
}

/// Aggregate over one executor run. Written as `execution_report.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowResult {
    pub success: bool,
    pub total_steps: usize,
    pub completed_steps: usize,
    pub failed_steps: Vec<String>,
    pub skipped_steps: Vec<String>,
    /// Seconds.
    pub execution_time: f64,
    pub start_time: DateTime<Local>,
    pub end_time: DateTime<Local>,
    /// Keyed by step id, in execution order.
    #[serde(
        serialize_with = "serialize_keyed",
        deserialize_with = "deserialize_keyed"
    )]
    pub step_results: Vec<StepResult>,
    pub output_directory: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_path: Option<PathBuf>,
}

impl WorkflowResult {
    /// Assemble the aggregate from finalized step results.
    pub fn from_results(
        step_results: Vec<StepResult>,
        start_time: DateTime<Local>,
        output_directory: PathBuf,
    ) -> Self {
        let end_time = Local::now();
        let ids_with = |status: StepStatus| -> Vec<String> {
            step_results
                .iter()
                .filter(|r| r.status == status)
                .map(|r| r.step_id.clone())
                .collect()
        };
        let failed_steps = ids_with(StepStatus::Failed);
        let skipped_steps = ids_with(StepStatus::Skipped);
        let completed_steps = step_results
            .iter()
            .filter(|r| r.status == StepStatus::Completed)
            .count();

        Self {
            success: failed_steps.is_empty(),
            total_steps: step_results.len(),
            completed_steps,
            failed_steps,
            skipped_steps,
            execution_time: (end_time - start_time)
                .to_std()
                .map(|d| d.as_secs_f64())
                .unwrap_or(0.0),
            start_time,
            end_time,
            step_results,
            output_directory,
            report_path: None,
        }
    }

    /// Result for a step id.
    pub fn step(&self, step_id: &str) -> Option<&StepResult> {
        self.step_results.iter().find(|r| r.step_id == step_id)
    }

    /// Status for a step id.
    pub fn status_of(&self, step_id: &str) -> Option<StepStatus> {
        self.step(step_id).map(|r| r.status)
    }
}

fn serialize_keyed<S: Serializer>(results: &[StepResult], serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(results.len()))?;
    for result in results {
        map.serialize_entry(&result.step_id, result)?;
    }
    map.end()
}

fn deserialize_keyed<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<StepResult>, D::Error> {
    // preserve_order keeps the map in document order
    let map = serde_json::Map::deserialize(deserializer)?;
    map.into_iter()
        .map(|(_, value)| serde_json::from_value(value).map_err(serde::de::Error::custom))
        .collect()
}
