//! OpenAI-compatible client: vision chat completions and speech synthesis.

use std::fs;
use std::path::Path;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::json;

use super::retry::RetryPolicy;
use super::wav::wav_duration;
use super::{api_key_from_env, check_status, PlanningClient, ServiceError, SpeechClip, SpeechSynthesizer};
use crate::config::{PlanningSettings, RetrySettings, SpeechSettings};

/// Blocking client for an OpenAI-compatible API.
///
/// One instance serves one purpose (planning or speech) since the two use
/// different models and timeouts.
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    model: String,
    api_key_env: String,
    max_tokens: u32,
    retry: RetryPolicy,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiClient {
    fn build(
        base_url: &str,
        model: &str,
        api_key_env: &str,
        max_tokens: u32,
        timeout_secs: u64,
        retry: &RetrySettings,
    ) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key_env: api_key_env.to_string(),
            max_tokens,
            retry: RetryPolicy::from_settings(retry),
        })
    }

    /// Client for the planning (vision) model.
    pub fn for_planning(settings: &PlanningSettings, retry: &RetrySettings) -> Result<Self, ServiceError> {
        Self::build(
            &settings.base_url,
            &settings.model,
            &settings.api_key_env,
            settings.max_tokens,
            settings.timeout_secs,
            retry,
        )
    }

    /// Client for text-to-speech.
    pub fn for_speech(settings: &SpeechSettings, retry: &RetrySettings) -> Result<Self, ServiceError> {
        Self::build(
            &settings.base_url,
            &settings.model,
            &settings.api_key_env,
            0,
            settings.timeout_secs,
            retry,
        )
    }
}

/// `data:` URL for an image file, used to inline it in a chat message.
fn image_data_url(image: &Path) -> Result<String, ServiceError> {
    let bytes = fs::read(image).map_err(|e| ServiceError::io("reading image for upload", e))?;
    let mime = match image
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "image/png",
    };
    Ok(format!("data:{};base64,{}", mime, BASE64.encode(bytes)))
}

fn chat_request_body(model: &str, max_tokens: u32, prompt: &str, data_url: &str) -> serde_json::Value {
    json!({
        "model": model,
        "max_tokens": max_tokens,
        "messages": [{
            "role": "user",
            "content": [
                { "type": "text", "text": prompt },
                { "type": "image_url", "image_url": { "url": data_url, "detail": "high" } }
            ]
        }]
    })
}

fn speech_request_body(model: &str, text: &str, voice: &str, speed: f64) -> serde_json::Value {
    json!({
        "model": model,
        "input": text,
        "voice": voice,
        "speed": speed,
        "response_format": "wav"
    })
}

fn first_message_content(response: ChatResponse) -> Result<String, ServiceError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| ServiceError::invalid_response("planning", "response has no message content"))
}

impl PlanningClient for OpenAiClient {
    fn plan_image(&self, image: &Path, prompt: &str) -> Result<String, ServiceError> {
        let api_key = api_key_from_env(&self.api_key_env)?;
        let body = chat_request_body(&self.model, self.max_tokens, prompt, &image_data_url(image)?);
        let url = format!("{}/chat/completions", self.base_url);

        tracing::info!("Requesting region plan from {} ({})", self.model, image.display());
        let response: ChatResponse = self.retry.run("planning request", || {
            let response = self
                .client
                .post(&url)
                .bearer_auth(&api_key)
                .json(&body)
                .send()?;
            Ok(check_status("planning", response)?.json()?)
        })?;

        first_message_content(response)
    }
}

impl SpeechSynthesizer for OpenAiClient {
    fn synthesize(
        &self,
        text: &str,
        voice: &str,
        speed: f64,
        out_path: &Path,
    ) -> Result<SpeechClip, ServiceError> {
        if text.trim().is_empty() {
            return Err(ServiceError::invalid_response("speech", "narration text is empty"));
        }
        let api_key = api_key_from_env(&self.api_key_env)?;
        let body = speech_request_body(&self.model, text, voice, speed);
        let url = format!("{}/audio/speech", self.base_url);

        let audio = self.retry.run("speech request", || {
            let response = self
                .client
                .post(&url)
                .bearer_auth(&api_key)
                .json(&body)
                .send()?;
            Ok(check_status("speech", response)?.bytes()?)
        })?;

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(|e| ServiceError::io("creating audio directory", e))?;
        }
        fs::write(out_path, &audio).map_err(|e| ServiceError::io("writing audio file", e))?;

        let duration = wav_duration(out_path)?;
        tracing::debug!("Synthesized {:.2}s of speech to {}", duration, out_path.display());

        Ok(SpeechClip {
            path: out_path.to_path_buf(),
            duration,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn chat_body_inlines_image() {
        let body = chat_request_body("gpt-4o", 4000, "Describe", "data:image/png;base64,AAAA");
        assert_eq!(body["model"], "gpt-4o");
        let content = &body["messages"][0]["content"];
        assert_eq!(content[0]["text"], "Describe");
        assert_eq!(content[1]["image_url"]["url"], "data:image/png;base64,AAAA");
    }

    #[test]
    fn speech_body_requests_wav() {
        let body = speech_request_body("tts-1", "Hello", "nova", 1.25);
        assert_eq!(body["response_format"], "wav");
        assert_eq!(body["voice"], "nova");
        assert_eq!(body["speed"], 1.25);
    }

    #[test]
    fn data_url_uses_extension_mime() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("photo.JPG");
        fs::write(&path, [0xFF, 0xD8, 0xFF]).unwrap();
        let url = image_data_url(&path).unwrap();
        assert_eq!(url, "data:image/jpeg;base64,/9j/");
    }

    #[test]
    fn empty_choice_is_invalid() {
        let response: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":"  "}}]}"#).unwrap();
        assert!(first_message_content(response).is_err());

        let response: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":"{\"a\":1}"}}]}"#).unwrap();
        assert_eq!(first_message_content(response).unwrap(), "{\"a\":1}");
    }
}
