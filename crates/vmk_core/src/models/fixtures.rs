//! Shared plan fixtures for unit tests.

use std::path::Path;

use super::enums::PlanStatus;
use super::plan::{Coordinates, ImageSize, Narration, Region, VideoPlan, VideoSegment};

/// Two-region plan with relative paths that do not exist on disk.
pub(crate) fn sample_plan() -> VideoPlan {
    let mut plan = VideoPlan::create_empty("image.png", "out", 60.0);
    plan.meta_info.title = "Quarterly report".to_string();
    plan.meta_info.description = "Walkthrough of the infographic".to_string();
    plan.regions.push(Region::new(
        "region_1",
        "Header",
        Coordinates::new(0, 0, 100, 50),
        Narration::new("The headline figures.", 12.0),
    ));
    plan.regions.push(Region::new(
        "region_2",
        "Chart",
        Coordinates::new(0, 50, 100, 50),
        Narration::new("Revenue grew steadily.", 18.0),
    ));
    plan
}

/// Completed plan whose source image (a real 100x100 PNG) and output
/// directory live under `dir`.
pub(crate) fn completed_plan_in(dir: &Path) -> VideoPlan {
    let image_path = dir.join("source.png");
    image::RgbImage::from_pixel(100, 100, image::Rgb([200, 40, 40]))
        .save(&image_path)
        .unwrap();
    let output_dir = dir.join("output");
    std::fs::create_dir_all(&output_dir).unwrap();

    let mut plan = sample_plan();
    plan.meta_info.source_image = image_path;
    plan.meta_info.output_dir = output_dir;
    plan.meta_info.source_image_size = Some(ImageSize {
        width: 100,
        height: 100,
    });
    plan.meta_info.status = PlanStatus::Completed;

    let mut start = 0.0;
    for region in &plan.regions {
        let mut segment = VideoSegment::new(
            format!("segment_{}", region.region_id),
            format!("Animated background for {}", region.region_name),
            region.narration.estimated_duration,
        );
        segment.start_time = start;
        segment.region_id = Some(region.region_id.clone());
        start += segment.duration;
        plan.text_to_video_segments.push(segment);
    }
    plan
}
