//! Workflow engine for turning a planned image into a video.
//!
//! Steps declare their prerequisites; the resolver orders them and the
//! executor runs them one at a time on the caller's thread, recording a
//! result for every step.
//!
//! # Architecture
//!
//! ```text
//! WorkflowExecutor
//!     ├── step1: Image cutting
//!     ├── step2: Narration audio
//!     ├── step3: Timeline recalculation   (after step2)
//!     ├── step4: Background video         (after step3)
//!     └── step5: Composition              (after step1, step2, step4)
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use vmk_core::config::Settings;
//! use vmk_core::logging::{LogConfig, RunLogger};
//! use vmk_core::models::VideoPlan;
//! use vmk_core::workflow::{StepServices, WorkflowExecutor};
//!
//! let settings = Settings::default();
//! let services = StepServices::from_settings(&settings).unwrap();
//! let logger = Arc::new(RunLogger::detached("run", LogConfig::default(), None));
//! let mut executor = WorkflowExecutor::standard(settings, &services, logger);
//!
//! let mut plan = VideoPlan::load_json("plans/video_plan.json").unwrap();
//! let result = executor
//!     .execute_workflow(&mut plan, "output/video_run".as_ref(), None, false)
//!     .unwrap();
//! println!("{} of {} steps completed", result.completed_steps, result.total_steps);
//! ```

mod errors;
mod executor;
mod resolver;
mod step;
pub mod steps;
mod types;

pub use errors::{StepError, WorkflowError};
pub use executor::{create_output_tree, WorkflowExecutor, REPORT_FILE_NAME};
pub use resolver::DependencyMap;
pub use step::WorkflowStep;
pub use steps::{
    standard_steps, BackgroundVideoStep, CompositionStep, CuttingStep, NarrationAudioStep,
    PlanningStep, StepServices, TimelineStep,
};
pub use types::{
    ExecutionSummary, PlanStepValidation, ProgressCallback, StepContext, StepOutput,
    StepValidation,
};
