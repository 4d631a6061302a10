//! Plan and result data model.

mod composition;
mod enums;
#[cfg(test)]
pub(crate) mod fixtures;
mod plan;
mod results;
mod validation;

pub use composition::{AudioTrack, BackgroundTrack, CompositionPlan, Transition, VisualEffect};
pub use enums::{OutputKind, PlanStatus, StepStatus};
pub use plan::{
    Coordinates, ImageSize, MetaInfo, Narration, PlanError, Region, VideoPlan, VideoSegment,
    PLAN_SCHEMA_VERSION,
};
pub use results::{Metadata, StepResult, WorkflowResult, SKIPPED_MESSAGE};
pub use validation::PlanValidation;
