//! Generative text model client.
//!
//! The pipeline only sees the [`TextGenerator`] trait: a prompt goes in, text
//! comes out, or the call fails. There are no retries and no streaming; a
//! failed call is handled by the caller's deterministic fallback.
//!
//! [`GeminiClient`] talks to a `generateContent`-style HTTP endpoint.
//! [`Unavailable`] stands in when no credentials are configured, so every
//! narrative step degrades to its template path.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::GeneratorSettings;

/// Result type for generator operations
pub type GenerateResult<T> = Result<T, GenerateError>;

/// Errors that can occur during a generative call
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    /// No usable credentials or endpoint
    #[error("Generator not configured: {0}")]
    NotConfigured(String),
    /// Transport-level failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// The endpoint answered with a non-success status
    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },
    /// The endpoint answered but carried no usable text
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Text in, text out.
pub trait TextGenerator {
    /// Send one prompt and return the raw response text
    fn generate(&self, prompt: &str) -> GenerateResult<String>;

    /// Model identifier, for logs and generated-script metadata
    fn model_name(&self) -> &str {
        "unknown"
    }
}

impl<F> TextGenerator for F
where
    F: Fn(&str) -> GenerateResult<String>,
{
    fn generate(&self, prompt: &str) -> GenerateResult<String> {
        self(prompt)
    }
}

/// Generator that always fails, used when no API key is configured
#[derive(Debug, Clone)]
pub struct Unavailable {
    reason: String,
}

impl Unavailable {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl TextGenerator for Unavailable {
    fn generate(&self, _prompt: &str) -> GenerateResult<String> {
        Err(GenerateError::NotConfigured(self.reason.clone()))
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

/// Blocking client for a `models/{model}:generateContent` endpoint
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: reqwest::blocking::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl GeminiClient {
    /// Build a client from settings. Fails with `NotConfigured` when no API key is set.
    pub fn new(settings: &GeneratorSettings) -> GenerateResult<Self> {
        let api_key = settings
            .api_key
            .clone()
            .ok_or_else(|| GenerateError::NotConfigured("no API key set".to_string()))?;

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout))
            .build()?;

        Ok(Self {
            client,
            endpoint: settings.endpoint.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            api_key,
        })
    }

    fn model_url(&self) -> String {
        format!("{}/models/{}", self.endpoint, self.model)
    }

    /// Check that the model endpoint answers for these credentials.
    ///
    /// Any HTTP answer means the server is reachable; only a success status
    /// means the model and key are usable.
    pub fn check_health(&self) -> GenerateResult<bool> {
        let response = self
            .client
            .get(self.model_url())
            .header("x-goog-api-key", &self.api_key)
            .send()?;
        Ok(response.status().is_success())
    }
}

impl TextGenerator for GeminiClient {
    fn generate(&self, prompt: &str) -> GenerateResult<String> {
        let request = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![RequestPart { text: prompt }],
            }],
        };

        debug!(model = %self.model, prompt_chars = prompt.len(), "sending generate request");

        let response = self
            .client
            .post(format!("{}:generateContent", self.model_url()))
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(GenerateError::Api {
                status: status.as_u16(),
                body: body.chars().take(500).collect(),
            });
        }

        let parsed: GenerateResponse = response
            .json()
            .map_err(|e| GenerateError::InvalidResponse(e.to_string()))?;

        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect()
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(GenerateError::InvalidResponse(
                "response contained no text".to_string(),
            ));
        }

        Ok(text)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
