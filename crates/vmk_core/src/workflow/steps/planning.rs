//! Planning - asks a vision model to split the source image into narrated
//! regions.
//!
//! This runs before the workflow (the `plan` command) and is not registered
//! with the executor. The model's reply is parsed leniently: prose around the
//! JSON object is ignored, missing ids and durations are filled in and
//! rectangles are clamped to the image.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Deserialize;

use crate::logging::RunLogger;
use crate::media::image_size;
use crate::models::{Coordinates, ImageSize, Narration, PlanStatus, Region, VideoPlan, VideoSegment};
use crate::services::PlanningClient;
use crate::workflow::errors::StepError;

/// Speaking pace used when the model gives no duration estimate.
const WORDS_PER_SECOND: f64 = 2.5;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawPlan {
    meta_info: RawMeta,
    regions: Vec<RawRegion>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawMeta {
    title: String,
    description: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawRegion {
    region_id: Option<String>,
    region_name: Option<String>,
    description: String,
    coordinates: RawCoordinates,
    narration: RawNarration,
    video_prompt: Option<String>,
}

#[derive(Debug, Default, Clone, Copy, Deserialize)]
#[serde(default)]
struct RawCoordinates {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawNarration {
    text: String,
    estimated_duration: Option<f64>,
}

/// Prompt sent with the image.
pub fn build_planning_prompt(duration: f64, size: ImageSize) -> String {
    format!(
        r#"Analyze this image and plan a narrated video of {duration} seconds.

1. Content: identify the main areas of the image and the order in which a viewer should see them.
2. Regions: split the image into regions that each hold one complete unit of content, with exact pixel coordinates (x, y, width, height).
3. Narration: write natural, professional narration for every region. The narrations together must not exceed {duration} seconds.
4. Background: describe a short, subtle background animation for each region.

Reply with JSON only, in this shape:
{{
  "meta_info": {{
    "title": "Video title",
    "description": "Overall summary"
  }},
  "regions": [
    {{
      "region_id": "region_1",
      "region_name": "Region name",
      "description": "What the region shows",
      "coordinates": {{ "x": 100, "y": 50, "width": 400, "height": 200 }},
      "narration": {{ "text": "Narration for this region", "estimated_duration": 10.5 }},
      "video_prompt": "Background animation description"
    }}
  ],
  "total_duration": {duration}
}}

Coordinates start at the top-left corner (0, 0). The image is {width}x{height} pixels."#,
        duration = duration,
        width = size.width,
        height = size.height,
    )
}

/// Slice from the first `{` to the last `}`.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn clamp_coordinates(raw: RawCoordinates, size: ImageSize) -> Coordinates {
    let clamp = |v: f64, max: u32| -> u32 {
        if v.is_finite() {
            v.round().clamp(0.0, f64::from(max)) as u32
        } else {
            0
        }
    };
    let x = clamp(raw.x, size.width);
    let y = clamp(raw.y, size.height);
    Coordinates::new(
        x,
        y,
        clamp(raw.width, size.width - x),
        clamp(raw.height, size.height - y),
    )
}

fn estimate_duration(text: &str) -> f64 {
    let words = text.split_whitespace().count() as f64;
    (words / WORDS_PER_SECOND).max(1.0)
}

/// Runs the planning model against a plan's source image.
pub struct PlanningStep {
    client: Arc<dyn PlanningClient>,
}

impl PlanningStep {
    pub fn new(client: Arc<dyn PlanningClient>) -> Self {
        Self { client }
    }

    pub fn validate_inputs(&self, plan: &VideoPlan) -> Result<(), StepError> {
        if !plan.meta_info.source_image.is_file() {
            return Err(StepError::file_not_found(
                plan.meta_info.source_image.display().to_string(),
            ));
        }
        if plan.meta_info.output_dir.as_os_str().is_empty() {
            return Err(StepError::invalid_input("Output directory is not set"));
        }
        if plan.meta_info.total_duration <= 0.0 {
            return Err(StepError::invalid_input("Total duration must be positive"));
        }
        Ok(())
    }

    /// Fill `plan` from the model's answer.
    ///
    /// The plan ends up `completed` on success and `failed` otherwise; on
    /// failure the regions are left as they were.
    pub fn run(&self, plan: &mut VideoPlan, logger: &RunLogger) -> Result<(), StepError> {
        self.validate_inputs(plan)?;
        logger.phase("Planning video");
        plan.set_status(PlanStatus::Planning);

        match self.plan_into(plan, logger) {
            Ok(()) => {
                plan.set_status(PlanStatus::Completed);
                logger.success(&format!(
                    "Planned {} regions, {:.1}s of narration",
                    plan.regions.len(),
                    plan.total_estimated_duration()
                ));
                Ok(())
            }
            Err(e) => {
                plan.set_status(PlanStatus::Failed);
                logger.error(&format!("Planning failed: {}", e));
                Err(e)
            }
        }
    }

    fn plan_into(&self, plan: &mut VideoPlan, logger: &RunLogger) -> Result<(), StepError> {
        let source = plan.meta_info.source_image.clone();
        let size = image_size(&source)?;
        plan.meta_info.source_image_size = Some(size);
        logger.info(&format!(
            "Source: {} ({}x{})",
            source.display(),
            size.width,
            size.height
        ));

        let prompt = build_planning_prompt(plan.meta_info.total_duration, size);
        let reply = self
            .client
            .plan_image(&source, &prompt)
            .map_err(|e| StepError::service_failed("Planning request", e))?;
        logger.debug(&format!("Model reply: {} chars", reply.len()));

        let json = extract_json_object(&reply)
            .ok_or_else(|| StepError::parse_error("planning reply", "no JSON object found"))?;
        let raw: RawPlan = serde_json::from_str(json)
            .map_err(|e| StepError::parse_error("planning reply", e.to_string()))?;

        apply_raw_plan(plan, raw, size, logger)
    }
}

fn apply_raw_plan(
    plan: &mut VideoPlan,
    raw: RawPlan,
    size: ImageSize,
    logger: &RunLogger,
) -> Result<(), StepError> {
    let mut regions = Vec::with_capacity(raw.regions.len());
    let mut prompts = Vec::with_capacity(raw.regions.len());
    let mut seen = HashSet::new();

    for (i, r) in raw.regions.into_iter().enumerate() {
        let text = r.narration.text.trim().to_string();
        if text.is_empty() {
            logger.warn(&format!("Dropping region {} without narration", i + 1));
            continue;
        }

        let mut region_id = r
            .region_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| format!("region_{}", i + 1));
        if !seen.contains(&region_id) {
            seen.insert(region_id.clone());
        } else {
            let base = region_id;
            let mut suffix = i + 1;
            region_id = format!("{}_{}", base, suffix);
            while !seen.insert(region_id.clone()) {
                suffix += 1;
                region_id = format!("{}_{}", base, suffix);
            }
        }
        let region_name = r
            .region_name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| region_id.clone());

        let estimated = r
            .narration
            .estimated_duration
            .filter(|d| d.is_finite() && *d > 0.0)
            .unwrap_or_else(|| estimate_duration(&text));

        let prompt = r
            .video_prompt
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| format!("Subtle animated background for {}: {}", region_name, r.description));

        let mut region = Region::new(
            region_id,
            region_name,
            clamp_coordinates(r.coordinates, size),
            Narration::new(text, estimated),
        );
        region.description = r.description;
        regions.push(region);
        prompts.push(prompt);
    }

    if regions.is_empty() {
        return Err(StepError::parse_error("planning reply", "no usable regions"));
    }

    // Squeeze estimates that overrun the requested length
    let total = plan.meta_info.total_duration;
    let estimated: f64 = regions.iter().map(|r| r.narration.estimated_duration).sum();
    if estimated > total {
        logger.warn(&format!(
            "Narration estimates total {:.1}s, scaling to fit {:.1}s",
            estimated, total
        ));
        // Stay strictly below the total so validation never trips on rounding
        let factor = total / estimated * (1.0 - 1e-9);
        for region in &mut regions {
            region.narration.estimated_duration *= factor;
        }
    }

    let mut start = 0.0;
    let mut segments = Vec::with_capacity(regions.len());
    for (region, prompt) in regions.iter().zip(prompts) {
        let mut segment = VideoSegment::new(
            format!("segment_{}", region.region_id),
            prompt,
            region.narration.estimated_duration,
        );
        segment.start_time = start;
        segment.region_id = Some(region.region_id.clone());
        start += segment.duration;
        segments.push(segment);
    }

    if plan.meta_info.title.trim().is_empty() {
        plan.meta_info.title = raw.meta_info.title;
    }
    if plan.meta_info.description.trim().is_empty() {
        plan.meta_info.description = raw.meta_info.description;
    }
    plan.regions = regions;
    plan.text_to_video_segments = segments;
    plan.touch();
    Ok(())
}
