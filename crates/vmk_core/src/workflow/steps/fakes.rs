//! In-process stand-ins for the external services, shared by step tests.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use super::StepServices;
use crate::config::Settings;
use crate::logging::{init_test_tracing, LogConfig, RunLogger};
use crate::media::{CompositionManifest, Compositor, ImageCropper, MediaError};
use crate::services::wav::pcm_wav;
use crate::services::{ServiceError, SpeechClip, SpeechSynthesizer, VideoGenerator};
use crate::workflow::executor::create_output_tree;
use crate::workflow::types::StepContext;

fn unavailable(service: &str) -> ServiceError {
    ServiceError::Status {
        service: service.to_string(),
        status: 503,
        body: "unavailable".to_string(),
    }
}

/// Writes silent WAV clips of a fixed length.
pub(crate) struct FakeSpeech {
    seconds: f64,
    fail_when_contains: Option<String>,
    pub calls: Mutex<Vec<(String, String, f64)>>,
}

impl FakeSpeech {
    pub fn new(seconds: f64) -> Self {
        Self {
            seconds,
            fail_when_contains: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_on(mut self, needle: &str) -> Self {
        self.fail_when_contains = Some(needle.to_string());
        self
    }
}

impl SpeechSynthesizer for FakeSpeech {
    fn synthesize(&self, text: &str, voice: &str, speed: f64, out_path: &Path) -> Result<SpeechClip, ServiceError> {
        self.calls.lock().push((text.to_string(), voice.to_string(), speed));
        if let Some(needle) = &self.fail_when_contains {
            if text.contains(needle.as_str()) {
                return Err(unavailable("speech"));
            }
        }
        fs::write(out_path, pcm_wav(8000, 1, self.seconds)).map_err(|e| ServiceError::io("writing clip", e))?;
        Ok(SpeechClip {
            path: out_path.to_path_buf(),
            duration: self.seconds,
        })
    }
}

/// Writes placeholder video files.
#[derive(Default)]
pub(crate) struct FakeVideo {
    fail_when_contains: Option<String>,
    pub calls: Mutex<Vec<(String, f64)>>,
}

impl FakeVideo {
    pub fn failing_on(needle: &str) -> Self {
        Self {
            fail_when_contains: Some(needle.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl VideoGenerator for FakeVideo {
    fn generate(&self, prompt: &str, duration: f64, out_path: &Path) -> Result<PathBuf, ServiceError> {
        self.calls.lock().push((prompt.to_string(), duration));
        if let Some(needle) = &self.fail_when_contains {
            if prompt.contains(needle.as_str()) {
                return Err(unavailable("video"));
            }
        }
        fs::write(out_path, b"mp4").map_err(|e| ServiceError::io("writing clip", e))?;
        Ok(out_path.to_path_buf())
    }
}

/// Records the manifest and writes an empty output file.
#[derive(Default)]
pub(crate) struct FakeCompositor {
    pub rendered: Mutex<Vec<CompositionManifest>>,
    pub fail: bool,
}

impl Compositor for FakeCompositor {
    fn render(&self, manifest: &CompositionManifest, out_path: &Path, _logger: &RunLogger) -> Result<(), MediaError> {
        self.rendered.lock().push(manifest.clone());
        if self.fail {
            return Err(MediaError::CommandFailed {
                tool: "ffmpeg".to_string(),
                exit_code: 1,
                message: "Conversion failed!".to_string(),
            });
        }
        fs::write(out_path, b"video").map_err(|source| MediaError::Io {
            operation: "writing video".to_string(),
            source,
        })
    }
}

pub(crate) fn logger() -> Arc<RunLogger> {
    init_test_tracing();
    Arc::new(RunLogger::detached("test", LogConfig::default(), None))
}

pub(crate) fn services() -> StepServices {
    StepServices {
        cropper: Arc::new(ImageCropper::new()),
        speech: Arc::new(FakeSpeech::new(4.0)),
        video: Arc::new(FakeVideo::default()),
        compositor: Arc::new(FakeCompositor::default()),
    }
}

/// Context whose output tree already exists under `dir/run`.
pub(crate) fn context(dir: &Path) -> StepContext {
    let output_dir = dir.join("run");
    create_output_tree(&output_dir).unwrap();
    StepContext::new(Arc::new(Settings::default()), output_dir, logger())
}
