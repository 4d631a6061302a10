//! Task-based text-to-video client: submit, poll, download.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::json;

use super::retry::RetryPolicy;
use super::{api_key_from_env, check_status, ServiceError, VideoGenerator};
use crate::config::{RetrySettings, VideoSettings};

const SERVICE: &str = "video";

/// Shortest and longest clip the service accepts, in seconds.
const MIN_CLIP_SECS: f64 = 1.0;
const MAX_CLIP_SECS: f64 = 30.0;

/// Blocking client for the text-to-video task API.
pub struct HttpVideoGenerator {
    client: Client,
    base_url: String,
    model: String,
    api_key_env: String,
    poll_interval: Duration,
    max_wait: Duration,
    retry: RetryPolicy,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    task_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TaskStatus {
    status: String,
    #[serde(default)]
    progress: Option<f64>,
    #[serde(default)]
    output_url: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// What to do after one status poll.
#[derive(Debug, PartialEq)]
enum PollOutcome {
    Done(String),
    Pending,
}

impl HttpVideoGenerator {
    pub fn new(settings: &VideoSettings, retry: &RetrySettings) -> Result<Self, ServiceError> {
        let client = Client::builder().timeout(Duration::from_secs(60)).build()?;
        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            api_key_env: settings.api_key_env.clone(),
            poll_interval: Duration::from_secs(settings.poll_interval_secs),
            max_wait: Duration::from_secs(settings.max_wait_secs),
            retry: RetryPolicy::from_settings(retry),
        })
    }

    fn submit(&self, api_key: &str, prompt: &str, duration: f64) -> Result<String, ServiceError> {
        let body = json!({
            "model": self.model,
            "prompt": prompt,
            "duration": duration,
            "output_format": "mp4"
        });
        let url = format!("{}/v1/text-to-video", self.base_url);

        let response: SubmitResponse = self.retry.run("video task submission", || {
            let response = self.client.post(&url).bearer_auth(api_key).json(&body).send()?;
            Ok(check_status(SERVICE, response)?.json()?)
        })?;

        response
            .task_id
            .ok_or_else(|| ServiceError::invalid_response(SERVICE, "submission response has no task_id"))
    }

    fn wait_for_completion(&self, api_key: &str, task_id: &str) -> Result<String, ServiceError> {
        let url = format!("{}/v1/tasks/{}", self.base_url, task_id);
        let started = Instant::now();

        while started.elapsed() < self.max_wait {
            let status: TaskStatus = self.retry.run("video task poll", || {
                let response = self.client.get(&url).bearer_auth(api_key).send()?;
                Ok(check_status(SERVICE, response)?.json()?)
            })?;

            match interpret_status(task_id, status)? {
                PollOutcome::Done(output_url) => return Ok(output_url),
                PollOutcome::Pending => thread::sleep(self.poll_interval),
            }
        }

        Err(ServiceError::Timeout {
            service: SERVICE.to_string(),
            task_id: task_id.to_string(),
            waited_secs: self.max_wait.as_secs(),
        })
    }

    fn download(&self, url: &str, out_path: &Path) -> Result<(), ServiceError> {
        let bytes = self.retry.run("video download", || {
            let response = self.client.get(url).send()?;
            Ok(check_status(SERVICE, response)?.bytes()?)
        })?;

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(|e| ServiceError::io("creating video directory", e))?;
        }
        fs::write(out_path, &bytes).map_err(|e| ServiceError::io("writing video file", e))?;
        Ok(())
    }
}

fn interpret_status(task_id: &str, status: TaskStatus) -> Result<PollOutcome, ServiceError> {
    match status.status.as_str() {
        "completed" | "succeeded" => status.output_url.map(PollOutcome::Done).ok_or_else(|| {
            ServiceError::invalid_response(SERVICE, format!("task {} completed without output_url", task_id))
        }),
        "failed" => Err(ServiceError::TaskFailed {
            service: SERVICE.to_string(),
            task_id: task_id.to_string(),
            message: status.error.unwrap_or_else(|| "unknown error".to_string()),
        }),
        "pending" | "processing" | "queued" | "running" => {
            tracing::debug!(
                "Video task {} {}: {:.0}%",
                task_id,
                status.status,
                status.progress.unwrap_or(0.0)
            );
            Ok(PollOutcome::Pending)
        }
        other => {
            tracing::warn!("Video task {} reported unknown status '{}'", task_id, other);
            Ok(PollOutcome::Pending)
        }
    }
}

impl VideoGenerator for HttpVideoGenerator {
    fn generate(&self, prompt: &str, duration: f64, out_path: &Path) -> Result<PathBuf, ServiceError> {
        if prompt.trim().is_empty() {
            return Err(ServiceError::invalid_response(SERVICE, "prompt is empty"));
        }
        let api_key = api_key_from_env(&self.api_key_env)?;
        let duration = duration.clamp(MIN_CLIP_SECS, MAX_CLIP_SECS);

        let task_id = self.submit(&api_key, prompt, duration)?;
        tracing::info!("Submitted video task {} ({:.1}s)", task_id, duration);

        let output_url = self.wait_for_completion(&api_key, &task_id)?;
        self.download(&output_url, out_path)?;

        Ok(out_path.to_path_buf())
    }
}
