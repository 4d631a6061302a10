//! Logging infrastructure for VideoMaker.
//!
//! This module provides:
//! - Application-wide `tracing` setup (stderr plus a daily log file)
//! - Per-run loggers with file + callback dual output
//! - Tail buffer for diagnosing failed external commands
//!
//! # Example
//!
//! ```no_run
//! use vmk_core::logging::{LogConfig, RunLogger};
//!
//! let logger = RunLogger::new("video_20240101_120000", ".logs", LogConfig::default(), None).unwrap();
//!
//! logger.phase("Narration audio");
//! logger.command("ffmpeg -i input.wav ...");
//! logger.success("Synthesized 4 clips");
//! ```

mod run_logger;
mod types;

pub use run_logger::{sanitize_filename, RunLogger};
pub use types::{LogCallback, LogConfig, LogLevel, MessagePrefix};

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn env_filter(default_level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level.as_filter_str()))
}

/// Initialize tracing to stderr plus a daily rolling file in `logs_dir`.
///
/// The returned guard must be held until shutdown, or buffered file output
/// is lost.
pub fn init_tracing_with_file(default_level: LogLevel, logs_dir: &Path) -> WorkerGuard {
    let file_appender = tracing_appender::rolling::daily(logs_dir, "videomaker.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .with(env_filter(default_level))
        .init();

    guard
}

/// Initialize tracing for tests (only logs warnings and above).
#[cfg(test)]
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}
