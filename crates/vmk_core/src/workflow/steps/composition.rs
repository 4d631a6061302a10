//! Composition step - assembles cut images, narration and background clips
//! into the final video.
//!
//! Every region that has both a cut image and a narration clip becomes one
//! clip on the timeline, in plan order. The background clip of the segment
//! attached to that region is layered underneath when it exists. The full
//! manifest is written to `composition/composition.json` before rendering so
//! a failed render can be inspected and replayed by hand.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use chrono::Local;

use super::file_fragment;
use crate::config::CompositionSettings;
use crate::media::{ClipEntry, CompositionManifest, Compositor, FfmpegCompositor};
use crate::models::{OutputKind, Region, VideoPlan};
use crate::workflow::errors::StepError;
use crate::workflow::step::WorkflowStep;
use crate::workflow::types::{StepContext, StepOutput};

pub const MANIFEST_FILE_NAME: &str = "composition.json";

pub struct CompositionStep {
    compositor: Arc<dyn Compositor>,
}

impl CompositionStep {
    pub fn new(compositor: Arc<dyn Compositor>) -> Self {
        Self { compositor }
    }

    /// Render with ffmpeg.
    pub fn with_ffmpeg(settings: &CompositionSettings) -> Self {
        Self::new(Arc::new(FfmpegCompositor::new(settings)))
    }
}

fn is_ready(region: &Region) -> bool {
    let exists = |p: Option<&Path>| p.is_some_and(Path::is_file);
    exists(region.cut_path.as_deref()) && exists(region.narration.audio_path.as_deref())
}

/// Build the manifest from the plan's current state.
pub fn build_manifest(plan: &VideoPlan, ctx: &StepContext) -> CompositionManifest {
    let settings = &ctx.settings.composition;
    let mut clips = Vec::new();
    let mut start = 0.0;

    for region in plan.regions.iter() {
        let (Some(image), Some(audio)) = (&region.cut_path, &region.narration.audio_path) else {
            continue;
        };
        if !is_ready(region) {
            ctx.logger.warn(&format!(
                "{} is missing its cut image or narration file, leaving it out",
                region.region_id
            ));
            continue;
        }

        let background = plan
            .text_to_video_segments
            .iter()
            .find(|s| s.region_id.as_deref() == Some(region.region_id.as_str()))
            .and_then(|s| s.output_path.clone())
            .filter(|p| p.is_file());

        let duration = region.narration.effective_duration();
        clips.push(ClipEntry {
            region_id: region.region_id.clone(),
            image: image.clone(),
            audio: audio.clone(),
            background,
            start_time: start,
            duration,
        });
        start += duration;
    }

    CompositionManifest {
        title: plan.meta_info.title.clone(),
        width: settings.width,
        height: settings.height,
        fps: settings.fps,
        total_duration: start,
        clips,
        background_track: plan.background_track.clone(),
        overlays: plan.composition.clone(),
    }
}

impl WorkflowStep for CompositionStep {
    fn id(&self) -> &str {
        "step5"
    }

    fn name(&self) -> &str {
        "Composition"
    }

    fn description(&self) -> &str {
        "Render cut images, narration and background clips into the final video"
    }

    fn dependencies(&self) -> Vec<String> {
        vec!["step1".to_string(), "step2".to_string(), "step4".to_string()]
    }

    fn validate_inputs(&self, plan: &VideoPlan) -> Result<(), StepError> {
        if plan.regions.iter().all(|r| r.cut_path.is_none()) {
            return Err(StepError::precondition_failed("No cut images to compose"));
        }
        if plan.regions.iter().all(|r| r.narration.audio_path.is_none()) {
            return Err(StepError::precondition_failed("No narration audio to compose"));
        }
        if !plan.regions.iter().any(is_ready) {
            return Err(StepError::precondition_failed(
                "No region has both a cut image and narration audio on disk",
            ));
        }
        Ok(())
    }

    fn execute(&self, ctx: &StepContext, plan: &mut VideoPlan) -> Result<StepOutput, StepError> {
        ctx.logger.phase("Composing final video");

        let manifest = build_manifest(plan, ctx);
        if manifest.clips.is_empty() {
            return Err(StepError::precondition_failed("No clips to compose"));
        }
        let with_background = manifest.clips.iter().filter(|c| c.background.is_some()).count();
        ctx.logger.info(&format!(
            "{} clips ({} with background video), {:.2}s total, {}x{} @ {} fps",
            manifest.clips.len(),
            with_background,
            manifest.total_duration,
            manifest.width,
            manifest.height,
            manifest.fps
        ));

        let manifest_path = ctx.output_path(OutputKind::Composition).join(MANIFEST_FILE_NAME);
        let json = serde_json::to_string_pretty(&manifest)
            .map_err(|e| StepError::parse_error("composition manifest", e.to_string()))?;
        fs::write(&manifest_path, json)
            .map_err(|e| StepError::io_error("writing composition manifest", e))?;

        let final_path = ctx.output_path(OutputKind::Final).join(format!(
            "{}_final_{}.mp4",
            file_fragment(&plan.meta_info.title),
            Local::now().format("%Y%m%d_%H%M%S")
        ));
        ctx.report_progress(self.id(), 10, "rendering");
        self.compositor.render(&manifest, &final_path, &ctx.logger)?;

        ctx.logger.success(&format!("Final video: {}", final_path.display()));

        Ok(StepOutput::new()
            .with_metadata("clip_count", manifest.clips.len())
            .with_metadata("duration", manifest.total_duration)
            .with_metadata("final_video", final_path.display().to_string())
            .with_file(manifest_path)
            .with_file(final_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::completed_plan_in;
    use crate::workflow::steps::fakes::{self, FakeCompositor};
    use tempfile::tempdir;

    /// Fill in the outputs steps 1, 2 and 4 would have produced.
    fn produced_plan(dir: &Path, ctx: &StepContext) -> VideoPlan {
        let mut plan = completed_plan_in(dir);
        for region in &mut plan.regions {
            let cut = ctx
                .output_path(OutputKind::Cuts)
                .join(format!("slice_{}.png", region.region_id));
            let audio = ctx
                .output_path(OutputKind::Audio)
                .join(format!("audio_{}.wav", region.region_id));
            fs::write(&cut, b"png").unwrap();
            fs::write(&audio, b"wav").unwrap();
            region.cut_path = Some(cut);
            region.narration.audio_path = Some(audio);
            region.narration.actual_duration = Some(5.0);
        }
        let clip = ctx.output_path(OutputKind::Background).join("background_segment_region_2.mp4");
        fs::write(&clip, b"mp4").unwrap();
        plan.text_to_video_segments[1].output_path = Some(clip);
        plan
    }

    #[test]
    fn writes_manifest_and_renders() {
        let dir = tempdir().unwrap();
        let ctx = fakes::context(dir.path());
        let mut plan = produced_plan(dir.path(), &ctx);
        let compositor = Arc::new(FakeCompositor::default());

        let output = CompositionStep::new(compositor.clone())
            .execute(&ctx, &mut plan)
            .unwrap();

        let manifest_path = ctx.output_path(OutputKind::Composition).join(MANIFEST_FILE_NAME);
        let written: CompositionManifest =
            serde_json::from_str(&fs::read_to_string(&manifest_path).unwrap()).unwrap();
        assert_eq!(written.clips.len(), 2);
        assert_eq!(written.total_duration, 10.0);
        assert_eq!(written.clips[1].start_time, 5.0);
        assert!(written.clips[0].background.is_none());
        assert!(written.clips[1].background.is_some());
        assert_eq!(compositor.rendered.lock()[0], written);

        let final_video = &output.output_files[1];
        assert!(final_video.starts_with(ctx.output_path(OutputKind::Final)));
        let name = final_video.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("Quarterly_report_final_"), "{name}");
        assert!(final_video.exists());
    }

    #[test]
    fn region_without_audio_is_left_out() {
        let dir = tempdir().unwrap();
        let ctx = fakes::context(dir.path());
        let mut plan = produced_plan(dir.path(), &ctx);
        plan.regions[0].narration.audio_path = None;

        let manifest = build_manifest(&plan, &ctx);
        assert_eq!(manifest.clips.len(), 1);
        assert_eq!(manifest.clips[0].region_id, "region_2");
        assert_eq!(manifest.clips[0].start_time, 0.0);
    }

    #[test]
    fn render_failure_fails_the_step() {
        let dir = tempdir().unwrap();
        let ctx = fakes::context(dir.path());
        let mut plan = produced_plan(dir.path(), &ctx);
        let compositor = Arc::new(FakeCompositor {
            fail: true,
            ..Default::default()
        });

        let err = CompositionStep::new(compositor)
            .execute(&ctx, &mut plan)
            .unwrap_err();
        assert_eq!(err.kind(), "CommandFailed");
    }

    #[test]
    fn needs_cuts_and_audio() {
        let dir = tempdir().unwrap();
        let plan = completed_plan_in(dir.path());
        let step = CompositionStep::with_ffmpeg(&Default::default());

        let err = step.validate_inputs(&plan).unwrap_err();
        assert!(err.to_string().contains("No cut images"));
    }
}
