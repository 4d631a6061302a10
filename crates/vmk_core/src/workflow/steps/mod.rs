//! Pipeline step implementations.
//!
//! Each step handles one phase of turning a planned image into a video.
//! Collaborators are injected through [`StepServices`] so tests can swap in
//! fakes for the external services.

mod background;
mod composition;
mod cutting;
mod narration_audio;
mod planning;
mod timeline;

#[cfg(test)]
pub(crate) mod fakes;

pub use background::BackgroundVideoStep;
pub use composition::CompositionStep;
pub use cutting::CuttingStep;
pub use narration_audio::NarrationAudioStep;
pub use planning::{build_planning_prompt, extract_json_object, PlanningStep};
pub use timeline::TimelineStep;

use std::sync::Arc;

use super::executor::WorkflowExecutor;
use crate::config::Settings;
use crate::logging::{sanitize_filename, RunLogger};
use crate::media::{Compositor, FfmpegCompositor, ImageCropper, RegionCropper};
use crate::services::{HttpVideoGenerator, OpenAiClient, ServiceError, SpeechSynthesizer, VideoGenerator};

/// External collaborators used by the pipeline steps.
#[derive(Clone)]
pub struct StepServices {
    pub cropper: Arc<dyn RegionCropper>,
    pub speech: Arc<dyn SpeechSynthesizer>,
    pub video: Arc<dyn VideoGenerator>,
    pub compositor: Arc<dyn Compositor>,
}

impl StepServices {
    /// Real HTTP clients and local tools configured from settings.
    ///
    /// API keys are read when a service is first called, so building the
    /// services succeeds even when a key is missing.
    pub fn from_settings(settings: &Settings) -> Result<Self, ServiceError> {
        Ok(Self {
            cropper: Arc::new(ImageCropper::new()),
            speech: Arc::new(OpenAiClient::for_speech(&settings.speech, &settings.retry)?),
            video: Arc::new(HttpVideoGenerator::new(&settings.video, &settings.retry)?),
            compositor: Arc::new(FfmpegCompositor::new(&settings.composition)),
        })
    }
}

/// The five pipeline steps in registration order.
pub fn standard_steps(services: &StepServices) -> Vec<Box<dyn super::WorkflowStep>> {
    vec![
        Box::new(CuttingStep::new(Arc::clone(&services.cropper))),
        Box::new(NarrationAudioStep::new(Arc::clone(&services.speech))),
        Box::new(TimelineStep::new()),
        Box::new(BackgroundVideoStep::new(Arc::clone(&services.video))),
        Box::new(CompositionStep::new(Arc::clone(&services.compositor))),
    ]
}

impl WorkflowExecutor {
    /// Executor with the five pipeline steps registered.
    pub fn standard(settings: Settings, services: &StepServices, logger: Arc<RunLogger>) -> Self {
        let mut executor = Self::new(settings, logger);
        for step in standard_steps(services) {
            executor.register(step);
        }
        executor
    }
}

/// File name fragment for user-provided names.
pub(crate) fn file_fragment(name: &str) -> String {
    let cleaned = sanitize_filename(name.trim()).replace(' ', "_");
    if cleaned.is_empty() {
        "untitled".to_string()
    } else {
        cleaned
    }
}

/// Percentage of `done` out of `total`, for in-step progress.
pub(crate) fn percent(done: usize, total: usize) -> u32 {
    if total == 0 {
        100
    } else {
        (done * 100 / total) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::resolver::DependencyMap;

    #[test]
    fn standard_executor_matches_standard_dependencies() {
        let executor = WorkflowExecutor::standard(
            Settings::default(),
            &fakes::services(),
            fakes::logger(),
        );
        assert_eq!(executor.step_ids(), vec!["step1", "step2", "step3", "step4", "step5"]);
        assert_eq!(executor.dependency_map(), DependencyMap::standard());
    }

    #[test]
    fn full_pipeline_with_fake_services() {
        use crate::models::fixtures::completed_plan_in;
        use crate::models::{StepStatus, WorkflowResult};
        use crate::workflow::executor::REPORT_FILE_NAME;

        let dir = tempfile::tempdir().unwrap();
        let mut plan = completed_plan_in(dir.path());
        let run_dir = dir.path().join("video_run");
        let mut executor =
            WorkflowExecutor::standard(Settings::default(), &fakes::services(), fakes::logger());

        let result = executor
            .execute_workflow(&mut plan, &run_dir, None, false)
            .unwrap();

        assert!(result.success, "{:?}", result.failed_steps);
        assert_eq!(result.completed_steps, 5);
        // Fake speech makes every clip 4s
        assert_eq!(plan.meta_info.total_duration, 8.0);
        assert!(plan.regions.iter().all(|r| r.cut_path.is_some()));
        assert!(plan
            .text_to_video_segments
            .iter()
            .all(|s| s.output_path.as_ref().is_some_and(|p| p.exists())));
        assert_eq!(
            result.step("step3").unwrap().metadata["previous_total"],
            60.0
        );

        let final_video = result.step("step5").unwrap().output_files[1].clone();
        assert!(final_video.exists());

        let report: WorkflowResult = serde_json::from_str(
            &std::fs::read_to_string(run_dir.join(REPORT_FILE_NAME)).unwrap(),
        )
        .unwrap();
        assert_eq!(report.status_of("step5"), Some(StepStatus::Completed));
    }

    #[test]
    fn plan_saved_after_a_run_can_be_generated_again() {
        use crate::models::fixtures::completed_plan_in;
        use crate::models::{StepStatus, VideoPlan};

        let dir = tempfile::tempdir().unwrap();
        let mut plan = completed_plan_in(dir.path());
        let run_dir = dir.path().join("video_run");
        let mut executor =
            WorkflowExecutor::standard(Settings::default(), &fakes::services(), fakes::logger());
        let result = executor
            .execute_workflow(&mut plan, &run_dir, None, false)
            .unwrap();
        assert!(result.success);

        let snapshot = plan.save_snapshot(&run_dir).unwrap();
        let reloaded = VideoPlan::load_json(&snapshot).unwrap();
        assert_eq!(reloaded.meta_info.total_duration, 8.0);
        let validation = reloaded.validate();
        assert!(validation.is_valid, "{:?}", validation.errors);

        // Re-running only the timeline on the reloaded plan keeps it valid
        let mut reloaded = reloaded;
        let mut executor =
            WorkflowExecutor::standard(Settings::default(), &fakes::services(), fakes::logger());
        let rerun = executor
            .execute_single_step("step3", &mut reloaded, &run_dir)
            .unwrap();
        assert_eq!(rerun.status, StepStatus::Completed);
        assert!(reloaded.validate().is_valid);
    }

    #[test]
    fn speech_outage_skips_the_rest() {
        use crate::models::fixtures::completed_plan_in;
        use crate::models::{StepStatus, SKIPPED_MESSAGE};

        let dir = tempfile::tempdir().unwrap();
        let mut plan = completed_plan_in(dir.path());
        let mut services = fakes::services();
        services.speech = Arc::new(fakes::FakeSpeech::new(1.0).failing_on(" "));
        let mut executor = WorkflowExecutor::standard(Settings::default(), &services, fakes::logger());

        let result = executor
            .execute_workflow(&mut plan, &dir.path().join("run"), None, false)
            .unwrap();

        assert!(!result.success);
        assert_eq!(result.status_of("step1"), Some(StepStatus::Completed));
        assert_eq!(result.failed_steps, vec!["step2"]);
        assert_eq!(result.skipped_steps, vec!["step3", "step4", "step5"]);
        assert_eq!(
            result.step("step4").unwrap().error_message.as_deref(),
            Some(SKIPPED_MESSAGE)
        );
        assert_eq!(plan.meta_info.total_duration, 60.0);
    }

    #[test]
    fn file_fragment_cleans_names() {
        assert_eq!(file_fragment("Revenue chart"), "Revenue_chart");
        assert_eq!(file_fragment("a/b: c"), "a_b__c");
        assert_eq!(file_fragment("   "), "untitled");
    }

    #[test]
    fn percent_handles_empty() {
        assert_eq!(percent(1, 4), 25);
        assert_eq!(percent(0, 0), 100);
    }
}
