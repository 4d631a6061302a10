//! Configuration management for VideoMaker.
//!
//! This module provides:
//! - TOML-based configuration with logical sections
//! - Atomic file writes (write to temp, then rename)
//! - Section-level updates (only changed section is modified)
//!
//! The loaded [`Settings`] value is passed explicitly to the executor and to
//! every step; nothing reads configuration from global state.
//!
//! # Example
//!
//! ```no_run
//! use vmk_core::config::{ConfigManager, ConfigSection};
//!
//! let mut config = ConfigManager::new(".config/videomaker.toml");
//! config.load_or_create().unwrap();
//!
//! println!("Output folder: {}", config.settings().paths.output_folder);
//!
//! config.settings_mut().speech.voice = "nova".to_string();
//! config.update_section(ConfigSection::Speech).unwrap();
//! ```

mod manager;
mod settings;

pub use manager::{ConfigError, ConfigManager, ConfigResult};
pub use settings::{
    CompositionSettings, ConfigSection, LoggingSettings, PathSettings, PlanningSettings,
    RetrySettings, Settings, SpeechSettings, VideoSettings,
};
