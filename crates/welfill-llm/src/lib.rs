//! Welfill LLM Provider Layer
//!
//! Pluggable LLM provider implementations.
//!
//! # Architecture
//!
//! This crate provides implementations of the `LlmProvider` trait from `welfill-domain`.
//! Providers are blocking; the extractor runs them on tokio's blocking pool.
//!
//! # Providers
//!
//! - `MockProvider`: Deterministic mock for testing
//! - `GeminiProvider`: Google Generative Language API (`generateContent`)
//!
//! # Examples
//!
//! ```
//! use welfill_llm::MockProvider;
//! use welfill_domain::traits::{LlmProvider, LlmRequest};
//!
//! let provider = MockProvider::new(r#"{"氏名": "山田"}"#);
//! let result = provider.generate(&LlmRequest::text("test prompt")).unwrap();
//! assert_eq!(result, r#"{"氏名": "山田"}"#);
//! ```

#![warn(missing_docs)]

pub mod gemini;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use welfill_domain::traits::{LlmProvider as LlmProviderTrait, LlmRequest};

pub use gemini::{GeminiConfig, GeminiProvider, DEFAULT_ENDPOINT};

/// Errors that can occur during LLM operations
#[derive(Error, Debug)]
pub enum LlmError {
    /// Network or API communication error
    #[error("Communication error: {0}")]
    Communication(String),

    /// Invalid response from LLM
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Quota or rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Model not available
    #[error("Model not available: {0}")]
    ModelNotAvailable(String),

    /// Provider is not configured (e.g. missing API key)
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    /// Generic error
    #[error("LLM error: {0}")]
    Other(String),
}

/// Mock LLM provider for deterministic testing
///
/// Returns pre-configured responses without making any network calls and
/// records every request it receives.
///
/// # Examples
///
/// ```
/// use welfill_llm::MockProvider;
/// use welfill_domain::traits::{LlmProvider, LlmRequest};
///
/// let mut provider = MockProvider::default();
/// provider.add_response("prompt1", "response1");
/// assert_eq!(provider.generate(&LlmRequest::text("prompt1")).unwrap(), "response1");
/// assert_eq!(provider.call_count(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct MockProvider {
    default_response: String,
    responses: Arc<Mutex<HashMap<String, String>>>,
    requests: Arc<Mutex<Vec<LlmRequest>>>,
    fail_all: bool,
}

impl MockProvider {
    /// Create a new MockProvider with a fixed response for all prompts
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            default_response: response.into(),
            responses: Arc::new(Mutex::new(HashMap::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
            fail_all: false,
        }
    }

    /// Create a provider that fails every call
    pub fn failing() -> Self {
        Self {
            fail_all: true,
            ..Self::default()
        }
    }

    /// Add a specific response for a given prompt
    pub fn add_response(&mut self, prompt: impl Into<String>, response: impl Into<String>) {
        self.responses
            .lock()
            .unwrap()
            .insert(prompt.into(), response.into());
    }

    /// Get the number of times generate was called
    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Requests received so far, in call order
    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new("{}")
    }
}

impl LlmProviderTrait for MockProvider {
    type Error = LlmError;

    fn generate(&self, request: &LlmRequest) -> Result<String, Self::Error> {
        self.requests.lock().unwrap().push(request.clone());

        if self.fail_all {
            return Err(LlmError::Other("Mock error".to_string()));
        }

        let responses = self.responses.lock().unwrap();
        if let Some(response) = responses.get(&request.prompt) {
            return Ok(response.clone());
        }

        Ok(self.default_response.clone())
    }

    fn generate_json(&self, request: &LlmRequest) -> Result<String, Self::Error> {
        self.generate(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use welfill_domain::traits::InlineBlob;

    fn photo_request(prompt: &str) -> LlmRequest {
        LlmRequest {
            prompt: prompt.to_string(),
            attachments: vec![InlineBlob {
                mime_type: "image/jpeg".to_string(),
                data: vec![0xFF, 0xD8, 0xFF],
            }],
        }
    }

    #[test]
    fn test_fixed_response_for_any_prompt() {
        let provider = MockProvider::new(r#"{"支援内容": "散歩"}"#);
        let result = provider.generate_json(&photo_request("記録を読んでください"));
        assert_eq!(result.unwrap(), r#"{"支援内容": "散歩"}"#);
    }

    #[test]
    fn test_prompt_specific_response_falls_back_to_default() {
        let mut provider = MockProvider::default();
        provider.add_response("中間記録", r#"{"評価": "安定"}"#);

        assert_eq!(
            provider.generate(&LlmRequest::text("中間記録")).unwrap(),
            r#"{"評価": "安定"}"#
        );
        assert_eq!(provider.generate(&LlmRequest::text("別の記録")).unwrap(), "{}");
    }

    #[test]
    fn test_requests_keep_attachments() {
        let provider = MockProvider::default();
        provider.generate_json(&photo_request("一件目")).unwrap();
        provider.generate_json(&LlmRequest::text("二件目")).unwrap();

        let requests = provider.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].attachments[0].mime_type, "image/jpeg");
        assert!(requests[1].attachments.is_empty());
    }

    #[test]
    fn test_failing_provider_still_counts_calls() {
        let provider = MockProvider::failing();
        assert!(matches!(
            provider.generate_json(&LlmRequest::text("x")),
            Err(LlmError::Other(_))
        ));
        assert_eq!(provider.call_count(), 1);
    }

    #[test]
    fn test_clones_share_recorded_requests() {
        let provider = MockProvider::default();
        let handle = provider.clone();

        provider.generate(&LlmRequest::text("記録")).unwrap();
        assert_eq!(handle.call_count(), 1);
    }
}
