//! Generation adapter for Epicforge: text generation via the Gemini API
//!
//! Provides a `GenerationBackend` trait so handlers can be exercised against
//! fakes, and a `GeminiGenerationClient` that calls `generateContent` with a
//! fixed system instruction and sampling preset. One client is built per
//! preset at startup; callers only ever pass the user message.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::config::{GenerationPreset, GenerationSettings};
use crate::error::EpicforgeError;

const API_KEY_HEADER: &str = "x-goog-api-key";

// ============================================================================
// GenerationBackend trait
// ============================================================================

/// Abstraction over text generation providers.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Send a single user message and return the raw generated text.
    async fn generate(&self, message: &str) -> Result<String, GenerationError>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

// ============================================================================
// Error types
// ============================================================================

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("HTTP request failed: {0}")]
    Http(reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Missing API key")]
    MissingApiKey,

    #[error("Model returned no text (reason: {reason})")]
    EmptyResponse { reason: String },
}

// reqwest renders the request URL into its messages; keep it out of anything
// that can reach a log line or an HTTP response.
impl From<reqwest::Error> for GenerationError {
    fn from(e: reqwest::Error) -> Self {
        GenerationError::Http(e.without_url())
    }
}

// ============================================================================
// Config types
// ============================================================================

/// Gemini generation client configuration
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub api_key: String,
    pub model: String,
    pub system_instruction: String,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
    pub response_mime_type: String,
    pub timeout_seconds: u64,
}

impl GenerationConfig {
    pub fn new(
        api_key: String,
        settings: &GenerationSettings,
        preset: &GenerationPreset,
        system_instruction: String,
    ) -> Self {
        Self {
            api_key,
            model: settings.model.clone(),
            system_instruction,
            temperature: preset.temperature,
            top_p: preset.top_p,
            top_k: preset.top_k,
            max_output_tokens: preset.max_output_tokens,
            response_mime_type: preset.response_mime_type.clone(),
            timeout_seconds: settings.request_timeout_seconds,
        }
    }
}

/// Read a system instruction from disk.
pub fn load_system_instruction(path: impl AsRef<Path>) -> Result<String, EpicforgeError> {
    let path = path.as_ref();
    std::fs::read_to_string(path).map_err(|e| {
        tracing::error!(path = %path.display(), error = %e, "Failed to read prompt file");
        EpicforgeError::Io(e)
    })
}

// ============================================================================
// Gemini API structs (private)
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    system_instruction: GeminiContent<'a>,
    contents: Vec<GeminiContent<'a>>,
    generation_config: GeminiGenerationConfig<'a>,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<GeminiPartOut<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiPartOut<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig<'a> {
    temperature: f32,
    top_p: f32,
    top_k: u32,
    max_output_tokens: u32,
    response_mime_type: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    prompt_feedback: Option<GeminiPromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiCandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiPartIn>,
}

#[derive(Debug, Deserialize)]
struct GeminiPartIn {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: Option<GeminiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    code: u16,
    message: String,
}

impl GeminiResponse {
    /// Concatenated text of the first candidate, or the reason there is none.
    fn into_text(self) -> Result<String, GenerationError> {
        let block_reason = self.prompt_feedback.and_then(|f| f.block_reason);
        let Some(candidate) = self.candidates.into_iter().next() else {
            return Err(GenerationError::EmptyResponse {
                reason: block_reason.unwrap_or_else(|| "no candidates".to_string()),
            });
        };

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.is_empty() {
            return Err(GenerationError::EmptyResponse {
                reason: candidate
                    .finish_reason
                    .unwrap_or_else(|| "empty content".to_string()),
            });
        }

        Ok(text)
    }
}

// ============================================================================
// GeminiGenerationClient
// ============================================================================

/// Gemini generation client; calls the Gemini `generateContent` API.
#[derive(Debug, Clone)]
pub struct GeminiGenerationClient {
    client: Client,
    config: GenerationConfig,
    base_url: String,
}

impl GeminiGenerationClient {
    pub fn new(config: GenerationConfig) -> Result<Self, GenerationError> {
        Self::with_base_url(
            config,
            "https://generativelanguage.googleapis.com/v1beta".to_string(),
        )
    }

    /// Create a client with a custom base URL (for testing / proxies)
    pub fn with_base_url(
        config: GenerationConfig,
        base_url: String,
    ) -> Result<Self, GenerationError> {
        if config.api_key.is_empty() {
            return Err(GenerationError::MissingApiKey);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            config,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Build a client for one preset, reading its system instruction from
    /// the preset's prompt file.
    pub fn from_preset(
        api_key: String,
        settings: &GenerationSettings,
        preset: &GenerationPreset,
    ) -> Result<Self, EpicforgeError> {
        let system_instruction = load_system_instruction(&preset.prompt_file)?;
        let config = GenerationConfig::new(api_key, settings, preset, system_instruction);
        Ok(Self::with_base_url(config, settings.base_url.clone())?)
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    async fn generate_once(&self, message: &str) -> Result<String, GenerationError> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url, self.config.model
        );

        let request = GeminiRequest {
            system_instruction: GeminiContent {
                role: None,
                parts: vec![GeminiPartOut {
                    text: &self.config.system_instruction,
                }],
            },
            contents: vec![GeminiContent {
                role: Some("user"),
                parts: vec![GeminiPartOut { text: message }],
            }],
            generation_config: GeminiGenerationConfig {
                temperature: self.config.temperature,
                top_p: self.config.top_p,
                top_k: self.config.top_k,
                max_output_tokens: self.config.max_output_tokens,
                response_mime_type: &self.config.response_mime_type,
            },
        };

        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let error_detail = serde_json::from_str::<GeminiErrorResponse>(&error_body)
                .ok()
                .and_then(|e| e.error);

            let (code, message) = error_detail
                .map(|e| (e.code, e.message))
                .unwrap_or((status.as_u16(), error_body));

            tracing::error!(code = code, message = %message, "Gemini API error");

            return Err(GenerationError::Api { code, message });
        }

        let gemini_response: GeminiResponse = response.json().await?;
        gemini_response.into_text()
    }
}

#[async_trait]
impl GenerationBackend for GeminiGenerationClient {
    async fn generate(&self, message: &str) -> Result<String, GenerationError> {
        tracing::debug!(model = %self.config.model, "Sending generation request");
        self.generate_once(message).await
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

// ============================================================================
// TESTS
// ============================================================================
