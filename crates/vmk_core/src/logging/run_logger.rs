//! Per-run logger.
//!
//! Every workflow run (and every `plan` invocation) writes its own log file
//! next to the application log. Lines are also handed to an optional
//! callback so the CLI can echo the run as it happens. Output of external
//! tools is kept in a short tail buffer and only dumped when a tool fails.

use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use parking_lot::Mutex;

use super::types::{LogCallback, LogConfig, LogLevel, MessagePrefix};

struct Sinks {
    file: Option<BufWriter<File>>,
    callback: Option<LogCallback>,
}

impl Sinks {
    fn emit(&mut self, line: &str) {
        if let Some(file) = self.file.as_mut() {
            let _ = writeln!(file, "{line}");
        }
        if let Some(callback) = self.callback.as_ref() {
            callback(line);
        }
    }
}

/// Logger shared by the executor and every step of one run.
pub struct RunLogger {
    run_name: String,
    log_path: Option<PathBuf>,
    config: LogConfig,
    sinks: Mutex<Sinks>,
    tail: Mutex<VecDeque<String>>,
    last_progress: Mutex<Option<u32>>,
}

impl RunLogger {
    /// Log to `<log_dir>/<run_name>.log`, creating the directory if needed.
    pub fn new(
        run_name: impl Into<String>,
        log_dir: impl AsRef<Path>,
        config: LogConfig,
        callback: Option<LogCallback>,
    ) -> std::io::Result<Self> {
        let run_name = run_name.into();
        fs::create_dir_all(log_dir.as_ref())?;
        let log_path = log_dir
            .as_ref()
            .join(format!("{}.log", sanitize_filename(&run_name)));
        let file = BufWriter::new(File::create(&log_path)?);

        let mut logger = Self::detached(run_name, config, callback);
        logger.sinks.get_mut().file = Some(file);
        logger.log_path = Some(log_path);
        Ok(logger)
    }

    /// Logger that only feeds the callback (used by tests and embedders).
    pub fn detached(run_name: impl Into<String>, config: LogConfig, callback: Option<LogCallback>) -> Self {
        let tail_len = config.error_tail.max(1);
        Self {
            run_name: run_name.into(),
            log_path: None,
            config,
            sinks: Mutex::new(Sinks { file: None, callback }),
            tail: Mutex::new(VecDeque::with_capacity(tail_len)),
            last_progress: Mutex::new(None),
        }
    }

    pub fn run_name(&self) -> &str {
        &self.run_name
    }

    pub fn log_path(&self) -> Option<&Path> {
        self.log_path.as_deref()
    }

    pub fn log(&self, level: LogLevel, message: &str) {
        if level >= self.config.level {
            self.emit(message);
        }
    }

    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    pub fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    pub fn warn(&self, message: &str) {
        tracing::warn!(run = %self.run_name, "{}", message);
        self.log(LogLevel::Warn, &MessagePrefix::Warning.format(message));
    }

    pub fn error(&self, message: &str) {
        tracing::error!(run = %self.run_name, "{}", message);
        self.log(LogLevel::Error, &MessagePrefix::Error.format(message));
    }

    /// An external command line about to run.
    pub fn command(&self, command: &str) {
        self.log(LogLevel::Info, &MessagePrefix::Command.format(command));
    }

    /// Start of a step or other major phase.
    pub fn phase(&self, name: &str) {
        self.log(LogLevel::Info, &MessagePrefix::Phase.format(name));
    }

    pub fn success(&self, message: &str) {
        self.log(LogLevel::Info, &MessagePrefix::Success.format(message));
    }

    pub fn skipped(&self, message: &str) {
        self.log(LogLevel::Info, &MessagePrefix::Skipped.format(message));
    }

    /// Overall run progress. In compact mode only every `progress_step`
    /// percent (and 100) is written. Returns whether a line was written.
    pub fn progress(&self, percent: u32) -> bool {
        if self.config.compact {
            let step = self.config.progress_step.max(1);
            let mut last = self.last_progress.lock();
            let bucket = percent / step;
            let unchanged = last.is_some_and(|l| l / step >= bucket);
            if percent < 100 && (unchanged || (last.is_none() && bucket == 0)) {
                return false;
            }
            *last = Some(percent);
        }
        self.info(&format!("Progress: {percent}%"));
        true
    }

    /// One line of external tool output. Always buffered in the tail; only
    /// written out when not in compact mode.
    pub fn output_line(&self, line: &str, is_stderr: bool) {
        {
            let mut tail = self.tail.lock();
            if tail.len() >= self.config.error_tail.max(1) {
                tail.pop_front();
            }
            tail.push_back(line.to_string());
        }
        if !self.config.compact {
            let marker = if is_stderr { "! " } else { "  " };
            self.emit(&format!("{marker}{line}"));
        }
    }

    /// Dump the tail buffer, typically after a tool failed.
    pub fn show_tail(&self, header: &str) {
        let lines = self.get_tail();
        if lines.is_empty() {
            return;
        }
        self.emit(&format!("--- last {} lines of {} ---", lines.len(), header));
        for line in &lines {
            self.emit(line);
        }
    }

    /// Forget buffered tool output, so the next tail belongs to one command.
    pub fn clear_tail(&self) {
        self.tail.lock().clear();
    }

    pub fn get_tail(&self) -> Vec<String> {
        self.tail.lock().iter().cloned().collect()
    }

    pub fn flush(&self) {
        if let Some(file) = self.sinks.lock().file.as_mut() {
            let _ = file.flush();
        }
    }

    /// Flush and release the log file. Later lines only reach the callback.
    pub fn close(&self) {
        self.flush();
        self.sinks.lock().file = None;
    }

    fn emit(&self, message: &str) {
        let line = if self.config.show_timestamps {
            format!("[{}] {}", Local::now().format("%H:%M:%S"), message)
        } else {
            message.to_string()
        };
        self.sinks.lock().emit(&line);
    }
}

impl Drop for RunLogger {
    fn drop(&mut self) {
        self.close();
    }
}

/// Replace characters that are not allowed in file names.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            _ => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn capture(config: LogConfig) -> (RunLogger, Arc<Mutex<Vec<String>>>) {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink = lines.clone();
        let callback: LogCallback = Box::new(move |line| sink.lock().push(line.to_string()));
        (RunLogger::detached("run", config, Some(callback)), lines)
    }

    fn plain() -> LogConfig {
        LogConfig {
            show_timestamps: false,
            ..LogConfig::default()
        }
    }

    #[test]
    fn writes_run_log_file() {
        let dir = tempdir().unwrap();
        let logger = RunLogger::new("video_20240101_120000", dir.path(), plain(), None).unwrap();

        logger.phase("step1: Image cutting");
        logger.info("Cut 3 regions");
        logger.close();

        let path = logger.log_path().unwrap();
        assert!(path.ends_with("video_20240101_120000.log"));
        let content = fs::read_to_string(path).unwrap();
        assert_eq!(content, "=== step1: Image cutting ===\nCut 3 regions\n");
    }

    #[test]
    fn level_filter_drops_debug() {
        let (logger, lines) = capture(plain());
        logger.debug("hidden");
        logger.info("shown");
        logger.warn("careful");

        assert_eq!(*lines.lock(), vec!["shown", "[WARNING] careful"]);
        assert!(logger.log_path().is_none());
    }

    #[test]
    fn compact_progress_is_bucketed() {
        let logger = RunLogger::detached("run", LogConfig::default(), None);

        assert!(!logger.progress(0));
        assert!(!logger.progress(20));
        assert!(logger.progress(40));
        assert!(!logger.progress(45));
        assert!(logger.progress(60));
        assert!(logger.progress(100));
    }

    #[test]
    fn tool_output_goes_to_tail_in_compact_mode() {
        let (logger, lines) = capture(LogConfig {
            error_tail: 3,
            ..plain()
        });

        for i in 0..6 {
            logger.output_line(&format!("frame={i}"), true);
        }
        assert!(lines.lock().is_empty());
        assert_eq!(logger.get_tail(), vec!["frame=3", "frame=4", "frame=5"]);

        logger.show_tail("ffmpeg");
        assert_eq!(lines.lock()[0], "--- last 3 lines of ffmpeg ---");

        logger.clear_tail();
        assert!(logger.get_tail().is_empty());
    }

    #[test]
    fn sanitizes_filename() {
        assert_eq!(sanitize_filename("video_20240101"), "video_20240101");
        assert_eq!(sanitize_filename("a/b:c"), "a_b_c");
    }
}
