//! Text-generation client
//!
//! Generic interface for the hosted model that writes optimization advice.
//! The real client talks to the Gemini `generateContent` REST endpoint; a
//! fake client with canned responses is provided for tests.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variable holding the API key
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// LLM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Never read from the config file; taken from `GEMINI_API_KEY`
    #[serde(skip)]
    pub api_key: Option<String>,

    /// No timeout unless set
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_endpoint() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_model() -> String {
    "gemini-1.5-flash-002".to_string()
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            api_key: None,
            timeout_secs: None,
        }
    }
}

impl LlmConfig {
    /// Fill the API key from the environment
    pub fn with_api_key_from_env(mut self) -> Self {
        self.api_key = std::env::var(API_KEY_ENV).ok().filter(|k| !k.trim().is_empty());
        self
    }
}

/// LLM errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum LlmError {
    #[error("API key not found. Please set the 'GEMINI_API_KEY' environment variable.")]
    MissingApiKey,

    #[error("HTTP error: {0}")]
    HttpError(String),

    #[error("Invalid JSON response: {0}")]
    InvalidJson(String),

    #[error("Request timeout after {0} seconds")]
    Timeout(u64),
}

/// One generated candidate: its text parts in order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Candidate {
    pub parts: Vec<String>,
}

impl Candidate {
    pub fn text(text: &str) -> Self {
        Self {
            parts: vec![text.to_string()],
        }
    }
}

/// Generic LLM client trait
pub trait LlmClient: Send + Sync {
    /// Generate candidates for a single prompt
    fn generate(&self, prompt: &str) -> Result<Vec<Candidate>, LlmError>;
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<ResponseCandidate>,
}

#[derive(Debug, Deserialize)]
struct ResponseCandidate {
    #[serde(default)]
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

impl From<ResponseCandidate> for Candidate {
    fn from(raw: ResponseCandidate) -> Self {
        let parts = raw
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();
        Candidate { parts }
    }
}

/// Gemini REST client
pub struct GeminiClient {
    config: LlmConfig,
    api_key: String,
    client: reqwest::blocking::Client,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("endpoint", &self.config.endpoint)
            .field("model", &self.config.model)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    /// Build a client; fails without an API key
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let api_key = config.api_key.clone().ok_or(LlmError::MissingApiKey)?;

        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout_secs.map(Duration::from_secs))
            .build()
            .map_err(|e| LlmError::HttpError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config,
            api_key,
            client,
        })
    }

    fn url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.endpoint.trim_end_matches('/'),
            self.config.model
        )
    }
}

impl LlmClient for GeminiClient {
    fn generate(&self, prompt: &str) -> Result<Vec<Candidate>, LlmError> {
        let request_body = serde_json::json!({
            "contents": [
                {"parts": [{"text": prompt}]}
            ],
        });

        let response = self
            .client
            .post(self.url())
            .query(&[("key", self.api_key.as_str())])
            .json(&request_body)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout(self.config.timeout_secs.unwrap_or_default())
                } else {
                    LlmError::HttpError(format!("Request failed: {}", e.without_url()))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(LlmError::HttpError(format!("HTTP {}: {}", status, snippet)));
        }

        let parsed: GenerateResponse = response
            .json()
            .map_err(|e| LlmError::InvalidJson(format!("Failed to parse response: {}", e)))?;

        tracing::debug!("Model returned {} candidate(s)", parsed.candidates.len());
        Ok(parsed.candidates.into_iter().map(Candidate::from).collect())
    }
}

/// Fake LLM client for testing
pub struct FakeLlmClient {
    responses: std::sync::Mutex<Vec<Result<Vec<Candidate>, LlmError>>>,
    prompts: std::sync::Mutex<Vec<String>>,
}

impl FakeLlmClient {
    /// Create a fake client with pre-defined responses
    pub fn new(responses: Vec<Result<Vec<Candidate>, LlmError>>) -> Self {
        Self {
            responses: std::sync::Mutex::new(responses),
            prompts: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Always answer with a single candidate holding `text`
    pub fn always_text(text: &str) -> Self {
        Self::new(vec![Ok(vec![Candidate::text(text)])])
    }

    /// Always fail with `error`
    pub fn always_error(error: LlmError) -> Self {
        Self::new(vec![Err(error)])
    }

    /// Get the number of calls made
    pub fn call_count(&self) -> usize {
        self.prompts.lock().map(|p| p.len()).unwrap_or_default()
    }

    /// Prompts received so far
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

impl LlmClient for FakeLlmClient {
    fn generate(&self, prompt: &str) -> Result<Vec<Candidate>, LlmError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }

        let mut responses = self
            .responses
            .lock()
            .map_err(|_| LlmError::HttpError("fake client poisoned".to_string()))?;

        match responses.len() {
            0 => Ok(Vec::new()),
            // Keep returning the last response
            1 => responses[0].clone(),
            _ => responses.remove(0),
        }
    }
}
