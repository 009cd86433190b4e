//! Trait definitions for external interactions
//!
//! These traits define the boundaries between domain logic and infrastructure.
//! Infrastructure implementations live in other crates.

use crate::fields::FieldValues;
use crate::input::ExtractionInput;
use crate::template::TemplateDescriptor;

/// A binary payload sent inline with a prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineBlob {
    /// MIME type of `data`
    pub mime_type: String,
    /// Raw bytes
    pub data: Vec<u8>,
}

/// One model call: prompt text plus ordered attachments
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LlmRequest {
    /// Prompt text
    pub prompt: String,
    /// Attachments in upload order
    pub attachments: Vec<InlineBlob>,
}

impl LlmRequest {
    /// A text-only request
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            attachments: Vec::new(),
        }
    }
}

/// Trait for LLM provider operations
///
/// Implemented by the infrastructure layer (welfill-llm). Calls are
/// blocking; async callers run them on a blocking thread.
pub trait LlmProvider {
    /// Error type for LLM operations
    type Error;

    /// Generate a completion for the request
    fn generate(&self, request: &LlmRequest) -> Result<String, Self::Error>;

    /// Generate a completion constrained to JSON output (if supported)
    fn generate_json(&self, request: &LlmRequest) -> Result<String, Self::Error>;
}

/// Trait for turning notes into template field values
///
/// Implemented by the application layer (welfill-extractor).
pub trait FieldExtractor {
    /// Error type for extraction operations
    type Error;

    /// Extract values for the template's field vocabulary
    fn extract_fields(
        &self,
        input: &ExtractionInput,
        template: &TemplateDescriptor,
    ) -> Result<FieldValues, Self::Error>;
}
