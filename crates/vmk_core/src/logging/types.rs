//! Logging types and configuration.

use serde::{Deserialize, Serialize};

/// Minimum severity that gets written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive for `EnvFilter` when `RUST_LOG` is unset.
    pub fn as_filter_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// How a [`RunLogger`](super::RunLogger) writes a workflow run.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: LogLevel,
    /// Keep ffmpeg and other tool output out of the log; it still lands in
    /// the tail buffer shown on failure.
    pub compact: bool,
    /// In compact mode, progress is only logged every this many percent.
    pub progress_step: u32,
    /// Tail buffer length.
    pub error_tail: usize,
    pub show_timestamps: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            compact: true,
            progress_step: 25,
            error_tail: 20,
            show_timestamps: true,
        }
    }
}

/// Receives every formatted line, e.g. to echo the run to the console.
pub type LogCallback = Box<dyn Fn(&str) + Send + Sync>;

/// Line markers used in run logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessagePrefix {
    /// `$ ffmpeg ...`
    Command,
    /// `=== step2: Narration audio ===`
    Phase,
    Success,
    Skipped,
    Warning,
    Error,
    None,
}

impl MessagePrefix {
    pub fn format(&self, message: &str) -> String {
        let tag = match self {
            MessagePrefix::Command => return format!("$ {message}"),
            MessagePrefix::Phase => return format!("=== {message} ==="),
            MessagePrefix::None => return message.to_string(),
            MessagePrefix::Success => "OK",
            MessagePrefix::Skipped => "SKIPPED",
            MessagePrefix::Warning => "WARNING",
            MessagePrefix::Error => "ERROR",
        };
        format!("[{tag}] {message}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_format() {
        assert_eq!(MessagePrefix::Phase.format("step1"), "=== step1 ===");
        assert_eq!(MessagePrefix::Skipped.format("step3"), "[SKIPPED] step3");
        assert_eq!(MessagePrefix::Command.format("ffmpeg -y"), "$ ffmpeg -y");
        assert_eq!(MessagePrefix::None.format("plain"), "plain");
    }

    #[test]
    fn levels_order_by_severity() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Warn < LogLevel::Error);
        assert_eq!(LogLevel::Warn.as_filter_str(), "warn");
    }

    #[test]
    fn level_parses_from_config_text() {
        let level: LogLevel = serde_json::from_str("\"debug\"").unwrap();
        assert_eq!(level, LogLevel::Debug);
    }
}
