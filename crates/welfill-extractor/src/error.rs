//! Error types for the Extractor

use thiserror::Error;

/// Errors that can occur during normalization and extraction
#[derive(Error, Debug)]
pub enum ExtractorError {
    /// Neither text nor attachments were supplied
    #[error("No input provided (files or text)")]
    NoInputProvided,

    /// LLM provider error
    #[error("LLM error: {0}")]
    Llm(String),

    /// Text exceeds maximum length
    #[error("Text too long: {0} chars (max: {1})")]
    TextTooLong(usize, usize),

    /// Attachments exceed the inline size limit
    #[error("Attachments too large: {0} bytes (max: {1})")]
    AttachmentsTooLarge(u64, u64),

    /// An attachment could not be read from scratch storage
    #[error("Failed to read attachment '{0}': {1}")]
    Attachment(String, String),

    /// LLM response is not a usable field object
    #[error("Invalid response format: {0}")]
    InvalidFormat(String),

    /// JSON parsing error
    #[error("JSON parse error: {0}")]
    JsonParse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for ExtractorError {
    fn from(e: serde_json::Error) -> Self {
        ExtractorError::JsonParse(e.to_string())
    }
}
