//! Gemini Provider Implementation
//!
//! Provides integration with the Google Generative Language API
//! (`models/{model}:generateContent`). Prompt text and attachments travel in a
//! single user turn; attachments are sent inline as base64.
//!
//! # Features
//!
//! - Blocking HTTP communication (callers run it on a blocking thread)
//! - Configurable endpoint, model and transport timeout
//! - JSON response mode for structured extraction
//! - No retries: a failed call fails the request
//!
//! # Examples
//!
//! ```no_run
//! use welfill_llm::{GeminiConfig, GeminiProvider};
//!
//! let provider = GeminiProvider::new(GeminiConfig {
//!     api_key: Some("key".to_string()),
//!     ..GeminiConfig::default()
//! });
//! ```

use crate::LlmError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use welfill_domain::traits::{LlmProvider as LlmProviderTrait, LlmRequest};

/// Default Generative Language API endpoint
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com";

/// Default model
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Default transport timeout for a single call (3 minutes)
pub const DEFAULT_TIMEOUT_SECS: u64 = 180;

/// Gemini connection settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeminiConfig {
    /// API base URL
    pub endpoint: String,
    /// Model name, e.g. `gemini-2.5-flash`
    pub model: String,
    /// API key; calls fail with `NotConfigured` when absent
    pub api_key: Option<String>,
    /// HTTP client timeout in seconds
    pub timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Gemini API provider
pub struct GeminiProvider {
    config: GeminiConfig,
}

#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text {
        text: &'a str,
    },
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Serialize)]
struct InlineData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: &'static str,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(rename = "promptFeedback")]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct PromptFeedback {
    #[serde(rename = "blockReason")]
    block_reason: Option<String>,
}

impl GeminiProvider {
    /// Create a new Gemini provider
    pub fn new(config: GeminiConfig) -> Self {
        Self { config }
    }

    /// Model this provider calls
    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.endpoint.trim_end_matches('/'),
            self.config.model
        )
    }

    fn call(&self, request: &LlmRequest, json_mode: bool) -> Result<String, LlmError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| LlmError::NotConfigured("Gemini API key is not set".to_string()))?;

        let body = build_request_body(request, json_mode);

        // Built per call: the blocking client must live on the blocking thread.
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .build()
            .map_err(|e| LlmError::Communication(format!("Failed to build client: {}", e)))?;

        debug!(
            "Calling Gemini model '{}' with {} attachment(s)",
            self.config.model,
            request.attachments.len()
        );

        let response = client
            .post(self.url())
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .map_err(|e| LlmError::Communication(format!("Request failed: {}", e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::RateLimitExceeded);
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(LlmError::ModelNotAvailable(self.config.model.clone()));
        }
        if !status.is_success() {
            let error_text = response
                .text()
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(LlmError::Communication(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .map_err(|e| LlmError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

        response_text(parsed)
    }
}

fn build_request_body(request: &LlmRequest, json_mode: bool) -> GenerateContentRequest<'_> {
    let mut parts = vec![Part::Text {
        text: &request.prompt,
    }];
    for blob in &request.attachments {
        parts.push(Part::Inline {
            inline_data: InlineData {
                mime_type: blob.mime_type.clone(),
                data: STANDARD.encode(&blob.data),
            },
        });
    }

    GenerateContentRequest {
        contents: vec![Content { role: "user", parts }],
        generation_config: json_mode.then_some(GenerationConfig {
            response_mime_type: "application/json",
        }),
    }
}

fn response_text(response: GenerateContentResponse) -> Result<String, LlmError> {
    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(LlmError::InvalidResponse(format!(
            "Prompt blocked: {}",
            reason
        )));
    }

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::InvalidResponse("No candidates returned".to_string()))?;

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(LlmError::InvalidResponse(format!(
            "Empty response (finish reason: {})",
            candidate.finish_reason.as_deref().unwrap_or("unknown")
        )));
    }

    Ok(text)
}

impl LlmProviderTrait for GeminiProvider {
    type Error = LlmError;

    fn generate(&self, request: &LlmRequest) -> Result<String, Self::Error> {
        self.call(request, false)
    }

    fn generate_json(&self, request: &LlmRequest) -> Result<String, Self::Error> {
        self.call(request, true)
    }
}
