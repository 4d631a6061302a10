//! Final video composition.
//!
//! The composition step writes a [`CompositionManifest`] describing every clip
//! and hands it to a [`Compositor`]. [`FfmpegCompositor`] renders it with one
//! ffmpeg invocation.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::{Deserialize, Serialize};

use super::cropper::MediaError;
use crate::config::CompositionSettings;
use crate::logging::RunLogger;
use crate::models::{BackgroundTrack, CompositionPlan};

/// One region's slot on the final timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipEntry {
    pub region_id: String,
    /// Cut image shown during the clip.
    pub image: PathBuf,
    /// Narration audio.
    pub audio: PathBuf,
    /// Generated background video, if one was produced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<PathBuf>,
    pub start_time: f64,
    pub duration: f64,
}

/// Everything needed to render the final video. Written as `composition.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositionManifest {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub total_duration: f64,
    pub clips: Vec<ClipEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_track: Option<BackgroundTrack>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlays: Option<CompositionPlan>,
}

/// Renders a manifest into a video file.
pub trait Compositor: Send + Sync {
    fn render(
        &self,
        manifest: &CompositionManifest,
        out_path: &Path,
        logger: &RunLogger,
    ) -> Result<(), MediaError>;
}

/// Compositor that shells out to ffmpeg.
#[derive(Debug, Clone)]
pub struct FfmpegCompositor {
    ffmpeg_path: String,
}

impl FfmpegCompositor {
    pub fn new(settings: &CompositionSettings) -> Self {
        Self {
            ffmpeg_path: settings.ffmpeg_path.clone(),
        }
    }

    /// Build the ffmpeg argument list for a manifest.
    pub fn build_args(&self, manifest: &CompositionManifest, out_path: &Path) -> Vec<String> {
        let (w, h, fps) = (manifest.width, manifest.height, manifest.fps);
        let mut args: Vec<String> = vec!["-y".into(), "-hide_banner".into()];
        let mut filters: Vec<String> = Vec::new();
        let mut concat_inputs = String::new();
        let mut input = 0usize;

        let mut add_input = |args: &mut Vec<String>, pre: &[String], path: &Path| -> usize {
            args.extend(pre.iter().cloned());
            args.push("-i".into());
            args.push(path.display().to_string());
            input += 1;
            input - 1
        };

        for (i, clip) in manifest.clips.iter().enumerate() {
            let dur = format!("{:.3}", clip.duration);

            let video_chain = match &clip.background {
                Some(background) => {
                    let bg = add_input(
                        &mut args,
                        &["-stream_loop".into(), "-1".into(), "-t".into(), dur.clone()],
                        background,
                    );
                    let img = add_input(
                        &mut args,
                        &["-loop".into(), "1".into(), "-t".into(), dur.clone()],
                        &clip.image,
                    );
                    format!(
                        "[{bg}:v]scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h},setsar=1,fps={fps}[bg{i}];\
                         [{img}:v]scale={fw}:{fh}:force_original_aspect_ratio=decrease[fg{i}];\
                         [bg{i}][fg{i}]overlay=(W-w)/2:(H-h)/2,trim=duration={dur},setpts=PTS-STARTPTS[v{i}]",
                        fw = w * 4 / 5,
                        fh = h * 4 / 5,
                    )
                }
                None => {
                    let img = add_input(
                        &mut args,
                        &["-loop".into(), "1".into(), "-t".into(), dur.clone()],
                        &clip.image,
                    );
                    format!(
                        "[{img}:v]scale={w}:{h}:force_original_aspect_ratio=decrease,\
                         pad={w}:{h}:(ow-iw)/2:(oh-ih)/2:color=black,setsar=1,fps={fps},\
                         trim=duration={dur},setpts=PTS-STARTPTS[v{i}]"
                    )
                }
            };
            filters.push(video_chain);

            let audio = add_input(&mut args, &[], &clip.audio);
            filters.push(format!(
                "[{audio}:a]aresample=44100,apad,atrim=duration={dur},asetpts=PTS-STARTPTS[a{i}]"
            ));
            concat_inputs.push_str(&format!("[v{i}][a{i}]"));
        }

        filters.push(format!(
            "{}concat=n={}:v=1:a=1[vout][narration]",
            concat_inputs,
            manifest.clips.len()
        ));

        let music: Vec<(usize, String)> = manifest
            .background_track
            .iter()
            .flat_map(|track| {
                track
                    .audio_tracks
                    .iter()
                    .map(move |t| (t, track.master_volume))
            })
            .filter(|(t, _)| t.duration > 0.0)
            .map(|(t, master)| {
                let idx = add_input(&mut args, &[], &t.path);
                let delay_ms = (t.start_time * 1000.0).round() as u64;
                (
                    idx,
                    format!(
                        "volume={:.3},atrim=duration={:.3},adelay={delay_ms}|{delay_ms}",
                        t.volume * master,
                        t.duration
                    ),
                )
            })
            .collect();

        let audio_label = if music.is_empty() {
            "[narration]".to_string()
        } else {
            let mut mix_inputs = "[narration]".to_string();
            for (j, (idx, chain)) in music.iter().enumerate() {
                filters.push(format!("[{idx}:a]{chain}[music{j}]"));
                mix_inputs.push_str(&format!("[music{j}]"));
            }
            filters.push(format!(
                "{}amix=inputs={}:duration=first:normalize=0[aout]",
                mix_inputs,
                music.len() + 1
            ));
            "[aout]".to_string()
        };

        args.extend([
            "-filter_complex".to_string(),
            filters.join(";"),
            "-map".into(),
            "[vout]".into(),
            "-map".into(),
            audio_label,
            "-c:v".into(),
            "libx264".into(),
            "-pix_fmt".into(),
            "yuv420p".into(),
            "-r".into(),
            fps.to_string(),
            "-c:a".into(),
            "aac".into(),
            out_path.display().to_string(),
        ]);
        args
    }
}

impl Compositor for FfmpegCompositor {
    fn render(
        &self,
        manifest: &CompositionManifest,
        out_path: &Path,
        logger: &RunLogger,
    ) -> Result<(), MediaError> {
        if manifest.clips.is_empty() {
            return Err(MediaError::NothingToRender);
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(|source| MediaError::Io {
                operation: "creating final directory".to_string(),
                source,
            })?;
        }

        let args = self.build_args(manifest, out_path);
        logger.clear_tail();
        logger.command(&format!("{} {}", self.ffmpeg_path, args.join(" ")));

        let result = Command::new(&self.ffmpeg_path)
            .args(&args)
            .output()
            .map_err(|source| MediaError::Io {
                operation: format!("executing {}", self.ffmpeg_path),
                source,
            })?;

        for line in String::from_utf8_lossy(&result.stdout).lines() {
            logger.output_line(line, false);
        }
        for line in String::from_utf8_lossy(&result.stderr).lines() {
            logger.output_line(line, true);
        }

        if !result.status.success() {
            logger.show_tail("ffmpeg output");
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(MediaError::CommandFailed {
                tool: "ffmpeg".to_string(),
                exit_code: result.status.code().unwrap_or(-1),
                message: stderr.lines().last().unwrap_or_default().to_string(),
            });
        }

        if !out_path.exists() {
            return Err(MediaError::Io {
                operation: "locating rendered video".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, out_path.display().to_string()),
            });
        }
        Ok(())
    }
}
