//! Timeline recalculation.
//!
//! After narration audio is synthesized the measured total rarely matches the
//! planned one. The segments are stretched (or squeezed) to the new total while
//! keeping their relative weights, and every artifact anchored to an absolute
//! time is clamped so nothing points past the end of the timeline.

use serde::Serialize;

use crate::models::{AudioTrack, Transition, VideoPlan, VideoSegment, VisualEffect};

/// Something placed at an absolute position on the timeline.
pub trait TimedArtifact {
    fn start_time(&self) -> f64;
    fn duration(&self) -> f64;
    fn set_duration(&mut self, duration: f64);

    fn end_time(&self) -> f64 {
        self.start_time() + self.duration()
    }
}

macro_rules! impl_timed_artifact {
    ($($ty:ty),+) => {
        $(
            impl TimedArtifact for $ty {
                fn start_time(&self) -> f64 {
                    self.start_time
                }

                fn duration(&self) -> f64 {
                    self.duration
                }

                fn set_duration(&mut self, duration: f64) {
                    self.duration = duration;
                }
            }
        )+
    };
}

impl_timed_artifact!(VisualEffect, Transition, AudioTrack);

/// How many artifacts a clamp removed or shortened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ClampStats {
    pub dropped: usize,
    pub truncated: usize,
}

impl ClampStats {
    fn merge(&mut self, other: ClampStats) {
        self.dropped += other.dropped;
        self.truncated += other.truncated;
    }
}

/// Summary of one plan recalculation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineChange {
    pub previous_total: f64,
    pub new_total: f64,
    pub segment_count: usize,
    pub clamped: ClampStats,
}

/// Rewrite segment durations and start times to fill `new_total`.
///
/// One segment takes the whole total. Otherwise durations stay proportional
/// to the planned ones, or are split evenly when the planned total is zero.
/// Segments stay contiguous from 0.
pub fn recalculate_segments(segments: &mut [VideoSegment], new_total: f64) {
    match segments.len() {
        0 => {}
        1 => {
            segments[0].start_time = 0.0;
            segments[0].duration = new_total;
        }
        count => {
            let original_total: f64 = segments.iter().map(|s| s.duration).sum();
            let mut start = 0.0;
            for segment in segments.iter_mut() {
                segment.duration = if original_total > 0.0 {
                    new_total * (segment.duration / original_total)
                } else {
                    new_total / count as f64
                };
                segment.start_time = start;
                start += segment.duration;
            }
        }
    }
}

/// Drop artifacts starting at or after `new_total` and truncate the rest to end there.
pub fn clamp_artifacts<T: TimedArtifact>(artifacts: &mut Vec<T>, new_total: f64) -> ClampStats {
    let before = artifacts.len();
    artifacts.retain(|a| a.start_time() < new_total);

    let mut stats = ClampStats {
        dropped: before - artifacts.len(),
        truncated: 0,
    };
    for artifact in artifacts.iter_mut() {
        if artifact.end_time() > new_total {
            artifact.set_duration(new_total - artifact.start_time());
            stats.truncated += 1;
        }
    }
    stats
}

/// Fit the whole plan to `new_total`.
///
/// Overwrites `meta_info.total_duration`; the previous value is only kept in
/// the returned [`TimelineChange`].
pub fn recalculate_plan(plan: &mut VideoPlan, new_total: f64) -> TimelineChange {
    let previous_total = plan.meta_info.total_duration;

    recalculate_segments(&mut plan.text_to_video_segments, new_total);

    let mut clamped = ClampStats::default();
    if let Some(composition) = plan.composition.as_mut() {
        clamped.merge(clamp_artifacts(&mut composition.effects, new_total));
        clamped.merge(clamp_artifacts(&mut composition.transitions, new_total));
    }
    if let Some(track) = plan.background_track.as_mut() {
        clamped.merge(clamp_artifacts(&mut track.audio_tracks, new_total));
    }

    plan.meta_info.total_duration = new_total;
    plan.touch();

    TimelineChange {
        previous_total,
        new_total,
        segment_count: plan.text_to_video_segments.len(),
        clamped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::sample_plan;
    use crate::models::{BackgroundTrack, CompositionPlan};
    use std::path::PathBuf;

    const EPS: f64 = 1e-6;

    fn segments(durations: &[f64]) -> Vec<VideoSegment> {
        durations
            .iter()
            .enumerate()
            .map(|(i, d)| VideoSegment::new(format!("seg_{}", i), "prompt", *d))
            .collect()
    }

    fn assert_close(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < EPS, "{:?} != {:?}", actual, expected);
        }
    }

    #[test]
    fn proportional_stretch() {
        let mut segs = segments(&[10.0, 20.0, 30.0]);
        recalculate_segments(&mut segs, 90.0);

        let durations: Vec<_> = segs.iter().map(|s| s.duration).collect();
        let starts: Vec<_> = segs.iter().map(|s| s.start_time).collect();
        assert_close(&durations, &[15.0, 30.0, 45.0]);
        assert_close(&starts, &[0.0, 15.0, 45.0]);

        let total: f64 = durations.iter().sum();
        assert!((total - 90.0).abs() < EPS);
    }

    #[test]
    fn zero_planned_total_splits_evenly() {
        let mut segs = segments(&[0.0, 0.0, 0.0]);
        recalculate_segments(&mut segs, 30.0);

        let durations: Vec<_> = segs.iter().map(|s| s.duration).collect();
        let starts: Vec<_> = segs.iter().map(|s| s.start_time).collect();
        assert_close(&durations, &[10.0, 10.0, 10.0]);
        assert_close(&starts, &[0.0, 10.0, 20.0]);
    }

    #[test]
    fn single_segment_takes_everything() {
        let mut segs = segments(&[7.0]);
        segs[0].start_time = 3.0;
        recalculate_segments(&mut segs, 42.5);
        assert_eq!(segs[0].duration, 42.5);
        assert_eq!(segs[0].start_time, 0.0);
    }

    #[test]
    fn uneven_weights_still_sum_to_total() {
        let mut segs = segments(&[1.0, 3.0, 7.0, 11.0, 13.0]);
        recalculate_segments(&mut segs, 17.3);

        let total: f64 = segs.iter().map(|s| s.duration).sum();
        assert!((total - 17.3).abs() < EPS);
        for pair in segs.windows(2) {
            assert!((pair[0].end_time() - pair[1].start_time).abs() < EPS);
        }
    }

    #[test]
    fn clamp_drops_and_truncates() {
        let mut effects = vec![
            VisualEffect::new("late", "fade", 70.0, 5.0),
            VisualEffect::new("spans_end", "zoom", 40.0, 15.0),
            VisualEffect::new("inside", "pan", 5.0, 10.0),
            VisualEffect::new("at_end", "fade", 50.0, 2.0),
        ];

        let stats = clamp_artifacts(&mut effects, 50.0);

        assert_eq!(stats, ClampStats { dropped: 2, truncated: 1 });
        let ids: Vec<_> = effects.iter().map(|e| e.effect_id.as_str()).collect();
        assert_eq!(ids, vec!["spans_end", "inside"]);
        assert_eq!(effects[0].start_time, 40.0);
        assert!((effects[0].end_time() - 50.0).abs() < EPS);
        assert_eq!(effects[1].duration, 10.0);
    }

    #[test]
    fn recalculate_plan_updates_everything() {
        let mut plan = sample_plan();
        plan.text_to_video_segments = segments(&[10.0, 20.0, 30.0]);
        plan.composition = Some(CompositionPlan {
            effects: vec![
                VisualEffect::new("late", "fade", 70.0, 5.0),
                VisualEffect::new("spans_end", "zoom", 40.0, 15.0),
            ],
            transitions: vec![Transition::new("t1", "crossfade", 49.0, 2.0)],
        });
        plan.background_track = Some(BackgroundTrack {
            master_volume: 0.3,
            audio_tracks: vec![AudioTrack {
                track_id: "music".to_string(),
                path: PathBuf::from("music.mp3"),
                start_time: 0.0,
                duration: 60.0,
                volume: 1.0,
            }],
        });

        let change = recalculate_plan(&mut plan, 50.0);

        assert_eq!(change.previous_total, 60.0);
        assert_eq!(change.new_total, 50.0);
        assert_eq!(change.segment_count, 3);
        assert_eq!(change.clamped, ClampStats { dropped: 1, truncated: 3 });
        assert_eq!(plan.meta_info.total_duration, 50.0);

        let composition = plan.composition.as_ref().unwrap();
        assert_eq!(composition.effects.len(), 1);
        assert!((composition.transitions[0].end_time() - 50.0).abs() < EPS);
        assert_eq!(plan.background_track.as_ref().unwrap().audio_tracks[0].duration, 50.0);

        let last = plan.text_to_video_segments.last().unwrap();
        assert!((last.end_time() - 50.0).abs() < EPS);
    }
}
