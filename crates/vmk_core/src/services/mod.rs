//! External service contracts and their HTTP clients.
//!
//! Steps depend only on the traits here. Timeouts and retries live entirely in
//! the client implementations; the workflow core never retries.

mod openai;
mod retry;
mod video_api;
pub mod wav;

pub use openai::OpenAiClient;
pub use retry::RetryPolicy;
pub use video_api::HttpVideoGenerator;

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors raised by external service clients.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("API key not set: environment variable {0} is empty")]
    MissingApiKey(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{service} returned HTTP {status}: {body}")]
    Status {
        service: String,
        status: u16,
        body: String,
    },

    #[error("Unexpected response from {service}: {message}")]
    InvalidResponse { service: String, message: String },

    #[error("{service} task {task_id} failed: {message}")]
    TaskFailed {
        service: String,
        task_id: String,
        message: String,
    },

    #[error("{service} task {task_id} did not finish within {waited_secs}s")]
    Timeout {
        service: String,
        task_id: String,
        waited_secs: u64,
    },

    #[error("I/O error in {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },
}

impl ServiceError {
    pub fn invalid_response(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            service: service.into(),
            message: message.into(),
        }
    }

    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }

    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ServiceError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            ServiceError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// A synthesized narration clip.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechClip {
    pub path: PathBuf,
    /// Measured duration in seconds.
    pub duration: f64,
}

/// Vision model that proposes regions and narration for an image.
pub trait PlanningClient: Send + Sync {
    /// Send the image with a prompt and return the raw model text.
    fn plan_image(&self, image: &Path, prompt: &str) -> Result<String, ServiceError>;
}

/// Text-to-speech service.
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` into `out_path` and report the clip's duration.
    fn synthesize(
        &self,
        text: &str,
        voice: &str,
        speed: f64,
        out_path: &Path,
    ) -> Result<SpeechClip, ServiceError>;
}

/// Text-to-video service.
pub trait VideoGenerator: Send + Sync {
    /// Generate a clip of roughly `duration` seconds into `out_path`.
    fn generate(&self, prompt: &str, duration: f64, out_path: &Path) -> Result<PathBuf, ServiceError>;
}

pub(crate) fn api_key_from_env(var: &str) -> Result<String, ServiceError> {
    match std::env::var(var) {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        _ => Err(ServiceError::MissingApiKey(var.to_string())),
    }
}

/// Read the body of a non-success response into a [`ServiceError::Status`].
pub(crate) fn check_status(
    service: &str,
    response: reqwest::blocking::Response,
) -> Result<reqwest::blocking::Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(ServiceError::Status {
        service: service.to_string(),
        status: status.as_u16(),
        body,
    })
}
