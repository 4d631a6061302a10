//! Narration audio step - synthesizes one speech clip per region.

use std::sync::Arc;

use serde_json::Value;

use super::{file_fragment, percent};
use crate::models::{OutputKind, VideoPlan};
use crate::services::SpeechSynthesizer;
use crate::workflow::errors::StepError;
use crate::workflow::step::WorkflowStep;
use crate::workflow::types::{StepContext, StepOutput};

/// Writes `audio_<id>.wav` per region and records the measured duration.
///
/// Regions without narration text are skipped. The narration's own voice
/// wins over the configured default; the configured speed scales the
/// narration's speaking rate.
pub struct NarrationAudioStep {
    speech: Arc<dyn SpeechSynthesizer>,
}

impl NarrationAudioStep {
    pub fn new(speech: Arc<dyn SpeechSynthesizer>) -> Self {
        Self { speech }
    }
}

impl WorkflowStep for NarrationAudioStep {
    fn id(&self) -> &str {
        "step2"
    }

    fn name(&self) -> &str {
        "Narration audio"
    }

    fn description(&self) -> &str {
        "Synthesize narration speech for every region"
    }

    fn dependencies(&self) -> Vec<String> {
        Vec::new()
    }

    fn validate_inputs(&self, plan: &VideoPlan) -> Result<(), StepError> {
        if plan.regions.is_empty() {
            return Err(StepError::invalid_input("Plan has no narration segments"));
        }
        if plan.narration_segments().all(|n| n.text.trim().is_empty()) {
            return Err(StepError::invalid_input("Every narration text is empty"));
        }
        Ok(())
    }

    fn execute(&self, ctx: &StepContext, plan: &mut VideoPlan) -> Result<StepOutput, StepError> {
        let audio_dir = ctx.output_path(OutputKind::Audio);
        let speech = &ctx.settings.speech;
        let total = plan.regions.len();

        ctx.logger.phase("Synthesizing narration");

        let mut written = Vec::new();
        let mut failed: Vec<Value> = Vec::new();
        let mut audio_total = 0.0;

        for (i, region) in plan.regions.iter_mut().enumerate() {
            let narration = &mut region.narration;
            if narration.text.trim().is_empty() {
                ctx.logger.skipped(&format!("{} has no narration text", region.region_id));
                continue;
            }

            let voice = if narration.voice.is_empty() {
                speech.voice.as_str()
            } else {
                narration.voice.as_str()
            };
            let speed = narration.speaking_rate * speech.speed;
            let out_path = audio_dir.join(format!("audio_{}.wav", file_fragment(&region.region_id)));

            match self.speech.synthesize(&narration.text, voice, speed, &out_path) {
                Ok(clip) => {
                    ctx.logger.info(&format!(
                        "  {}: {:.2}s (estimated {:.2}s) -> {}",
                        region.region_id,
                        clip.duration,
                        narration.estimated_duration,
                        clip.path.display()
                    ));
                    narration.actual_duration = Some(clip.duration);
                    narration.audio_path = Some(clip.path.clone());
                    audio_total += clip.duration;
                    written.push(clip.path);
                }
                Err(e) => {
                    ctx.logger.warn(&format!("Speech synthesis failed for {}: {}", region.region_id, e));
                    failed.push(Value::from(region.region_id.clone()));
                }
            }
            ctx.report_progress(self.id(), percent(i + 1, total), &region.region_id);
        }

        if written.is_empty() {
            return Err(StepError::other("No narration audio could be synthesized"));
        }

        ctx.logger.success(&format!(
            "Synthesized {} clips, {:.2}s of narration",
            written.len(),
            audio_total
        ));
        plan.touch();

        Ok(StepOutput::new()
            .with_metadata("clip_count", written.len())
            .with_metadata("total_audio_duration", audio_total)
            .with_metadata("failed_regions", failed)
            .with_files(written))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::completed_plan_in;
    use crate::services::wav::wav_duration;
    use crate::workflow::steps::fakes::{self, FakeSpeech};
    use tempfile::tempdir;

    #[test]
    fn records_measured_durations() {
        let dir = tempdir().unwrap();
        let ctx = fakes::context(dir.path());
        let mut plan = completed_plan_in(dir.path());
        let speech = Arc::new(FakeSpeech::new(4.0));

        let output = NarrationAudioStep::new(speech.clone())
            .execute(&ctx, &mut plan)
            .unwrap();

        assert_eq!(output.output_files.len(), 2);
        for region in &plan.regions {
            assert_eq!(region.narration.actual_duration, Some(4.0));
            let path = region.narration.audio_path.clone().unwrap();
            assert!(path.ends_with(format!("audio_{}.wav", region.region_id)));
            assert!((wav_duration(&path).unwrap() - 4.0).abs() < 1e-6);
        }
        assert_eq!(plan.total_actual_duration(), Some(8.0));
        assert_eq!(output.metadata["total_audio_duration"], 8.0);
    }

    #[test]
    fn region_id_cannot_leave_the_audio_dir() {
        let dir = tempdir().unwrap();
        let ctx = fakes::context(dir.path());
        let mut plan = completed_plan_in(dir.path());
        plan.regions[0].region_id = "../escape".to_string();

        NarrationAudioStep::new(Arc::new(FakeSpeech::new(2.0)))
            .execute(&ctx, &mut plan)
            .unwrap();

        let path = plan.regions[0].narration.audio_path.clone().unwrap();
        assert_eq!(path.parent(), Some(ctx.output_path(OutputKind::Audio).as_path()));
        assert!(path.ends_with("audio_.._escape.wav"));
    }

    #[test]
    fn passes_voice_and_speed() {
        let dir = tempdir().unwrap();
        let ctx = fakes::context(dir.path());
        let mut plan = completed_plan_in(dir.path());
        plan.regions[0].narration.voice = "nova".to_string();
        plan.regions[1].narration.voice.clear();
        plan.regions[1].narration.speaking_rate = 1.5;
        let speech = Arc::new(FakeSpeech::new(1.0));

        NarrationAudioStep::new(speech.clone())
            .execute(&ctx, &mut plan)
            .unwrap();

        let calls = speech.calls.lock();
        assert_eq!(calls[0].1, "nova");
        assert_eq!(calls[1].1, ctx.settings.speech.voice);
        assert!((calls[1].2 - 1.5 * ctx.settings.speech.speed).abs() < 1e-9);
    }

    #[test]
    fn one_failed_clip_does_not_fail_the_step() {
        let dir = tempdir().unwrap();
        let ctx = fakes::context(dir.path());
        let mut plan = completed_plan_in(dir.path());
        let speech = Arc::new(FakeSpeech::new(3.0).failing_on("Revenue"));

        let output = NarrationAudioStep::new(speech).execute(&ctx, &mut plan).unwrap();

        assert_eq!(output.output_files.len(), 1);
        assert_eq!(plan.regions[1].narration.actual_duration, None);
        assert_eq!(plan.total_actual_duration(), None);
        assert_eq!(plan.measured_duration(), 3.0 + 18.0);
    }

    #[test]
    fn every_clip_failing_fails_the_step() {
        let dir = tempdir().unwrap();
        let ctx = fakes::context(dir.path());
        let mut plan = completed_plan_in(dir.path());
        let speech = Arc::new(FakeSpeech::new(3.0).failing_on("."));

        assert!(NarrationAudioStep::new(speech).execute(&ctx, &mut plan).is_err());
    }

    #[test]
    fn empty_narration_is_rejected() {
        let dir = tempdir().unwrap();
        let mut plan = completed_plan_in(dir.path());
        for region in &mut plan.regions {
            region.narration.text = "  ".to_string();
        }
        let step = NarrationAudioStep::new(Arc::new(FakeSpeech::new(1.0)));
        assert!(matches!(
            step.validate_inputs(&plan),
            Err(StepError::InvalidInput(_))
        ));
    }
}
