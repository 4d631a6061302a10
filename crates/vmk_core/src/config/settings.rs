//! Typed contents of `videomaker.toml`.
//!
//! One struct per TOML table. Every field has a serde default, so a partial
//! file still loads and [`ConfigSection`] lets a single table be rewritten.

use serde::{Deserialize, Serialize};

use crate::logging::{LogConfig, LogLevel};

/// Everything the CLI and the workflow read from the config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub paths: PathSettings,

    #[serde(default)]
    pub logging: LoggingSettings,

    /// Vision/planning service.
    #[serde(default)]
    pub planning: PlanningSettings,

    /// Text-to-speech service.
    #[serde(default)]
    pub speech: SpeechSettings,

    /// Text-to-video service.
    #[serde(default)]
    pub video: VideoSettings,

    /// Retry policy shared by all service clients.
    #[serde(default)]
    pub retry: RetrySettings,

    /// Final render.
    #[serde(default)]
    pub composition: CompositionSettings,
}

/// `[paths]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathSettings {
    /// Root folder for run directories.
    #[serde(default = "default_output_folder")]
    pub output_folder: String,

    /// Folder for plan snapshots written by `plan`.
    #[serde(default = "default_plans_folder")]
    pub plans_folder: String,

    /// Application log and one log per run.
    #[serde(default = "default_logs_folder")]
    pub logs_folder: String,
}

fn default_output_folder() -> String {
    "output".to_string()
}

fn default_plans_folder() -> String {
    "plans".to_string()
}

fn default_logs_folder() -> String {
    ".logs".to_string()
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            output_folder: default_output_folder(),
            plans_folder: default_plans_folder(),
            logs_folder: default_logs_folder(),
        }
    }
}

/// `[logging]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Default level when RUST_LOG is unset.
    #[serde(default)]
    pub level: LogLevel,

    /// Keep external tool output out of run logs.
    #[serde(default = "default_true")]
    pub compact: bool,

    /// Number of lines to show in tail on error.
    #[serde(default = "default_error_tail")]
    pub error_tail: u32,

    /// Prefix run log lines with a timestamp.
    #[serde(default = "default_true")]
    pub show_timestamps: bool,
}

fn default_true() -> bool {
    true
}

fn default_error_tail() -> u32 {
    20
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            compact: true,
            error_tail: default_error_tail(),
            show_timestamps: true,
        }
    }
}

impl LoggingSettings {
    /// Build the per-run logger configuration.
    pub fn to_log_config(&self) -> LogConfig {
        LogConfig {
            level: self.level,
            compact: self.compact,
            error_tail: self.error_tail as usize,
            show_timestamps: self.show_timestamps,
            ..LogConfig::default()
        }
    }
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_openai_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

/// Vision model used by the `plan` command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanningSettings {
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,

    #[serde(default = "default_planning_model")]
    pub model: String,

    /// Environment variable holding the API key.
    #[serde(default = "default_openai_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_planning_model() -> String {
    "gpt-4o".to_string()
}

fn default_max_tokens() -> u32 {
    4000
}

impl Default for PlanningSettings {
    fn default() -> Self {
        Self {
            base_url: default_openai_base_url(),
            model: default_planning_model(),
            api_key_env: default_openai_key_env(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Text-to-speech service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeechSettings {
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,

    #[serde(default = "default_speech_model")]
    pub model: String,

    /// Voice used when a narration does not name one.
    #[serde(default = "default_voice")]
    pub voice: String,

    #[serde(default = "default_speed")]
    pub speed: f64,

    #[serde(default = "default_openai_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_speech_model() -> String {
    "tts-1".to_string()
}

fn default_voice() -> String {
    "alloy".to_string()
}

fn default_speed() -> f64 {
    1.0
}

impl Default for SpeechSettings {
    fn default() -> Self {
        Self {
            base_url: default_openai_base_url(),
            model: default_speech_model(),
            voice: default_voice(),
            speed: default_speed(),
            api_key_env: default_openai_key_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Text-to-video task service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoSettings {
    #[serde(default = "default_video_base_url")]
    pub base_url: String,

    #[serde(default = "default_video_model")]
    pub model: String,

    #[serde(default = "default_video_key_env")]
    pub api_key_env: String,

    /// Seconds between task status polls.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Give up on a task after this many seconds.
    #[serde(default = "default_max_wait")]
    pub max_wait_secs: u64,
}

fn default_video_base_url() -> String {
    "https://api.runwayml.com".to_string()
}

fn default_video_model() -> String {
    "gen3".to_string()
}

fn default_video_key_env() -> String {
    "VIDEO_API_KEY".to_string()
}

fn default_poll_interval() -> u64 {
    10
}

fn default_max_wait() -> u64 {
    600
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            base_url: default_video_base_url(),
            model: default_video_model(),
            api_key_env: default_video_key_env(),
            poll_interval_secs: default_poll_interval(),
            max_wait_secs: default_max_wait(),
        }
    }
}

/// Exponential backoff for transient service failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_interval")]
    pub initial_interval_ms: u64,

    #[serde(default = "default_max_interval")]
    pub max_interval_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_interval() -> u64 {
    1000
}

fn default_max_interval() -> u64 {
    30_000
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_interval_ms: default_initial_interval(),
            max_interval_ms: default_max_interval(),
        }
    }
}

/// Final render settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositionSettings {
    /// ffmpeg executable (name on PATH or absolute path).
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg_path: String,

    #[serde(default = "default_width")]
    pub width: u32,

    #[serde(default = "default_height")]
    pub height: u32,

    #[serde(default = "default_fps")]
    pub fps: u32,
}

fn default_ffmpeg() -> String {
    "ffmpeg".to_string()
}

fn default_width() -> u32 {
    1920
}

fn default_height() -> u32 {
    1080
}

fn default_fps() -> u32 {
    30
}

impl Default for CompositionSettings {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg(),
            width: default_width(),
            height: default_height(),
            fps: default_fps(),
        }
    }
}

/// Config sections for targeted updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSection {
    Paths,
    Logging,
    Planning,
    Speech,
    Video,
    Retry,
    Composition,
}

impl ConfigSection {
    /// All sections in file order.
    pub fn all() -> &'static [ConfigSection] {
        &[
            Self::Paths,
            Self::Logging,
            Self::Planning,
            Self::Speech,
            Self::Video,
            Self::Retry,
            Self::Composition,
        ]
    }

    /// Get the TOML table name for this section.
    pub fn table_name(&self) -> &'static str {
        match self {
            ConfigSection::Paths => "paths",
            ConfigSection::Logging => "logging",
            ConfigSection::Planning => "planning",
            ConfigSection::Speech => "speech",
            ConfigSection::Video => "video",
            ConfigSection::Retry => "retry",
            ConfigSection::Composition => "composition",
        }
    }

    /// Comment written above the table.
    pub fn comment(&self) -> &'static str {
        match self {
            ConfigSection::Paths => "Output, plan and log directories",
            ConfigSection::Logging => "Logging configuration",
            ConfigSection::Planning => "Vision model used to plan regions and narration",
            ConfigSection::Speech => "Text-to-speech service",
            ConfigSection::Video => "Text-to-video service",
            ConfigSection::Retry => "Retry policy for service calls",
            ConfigSection::Composition => "Final render (ffmpeg)",
        }
    }
}
