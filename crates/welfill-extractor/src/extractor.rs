//! Core Extractor implementation

use crate::config::ExtractorConfig;
use crate::error::ExtractorError;
use crate::parser::parse_llm_response;
use crate::prompt::PromptBuilder;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};
use welfill_domain::traits::{FieldExtractor, InlineBlob, LlmProvider, LlmRequest};
use welfill_domain::{AttachmentKind, ExtractionInput, FieldValues, TemplateDescriptor};

/// The Extractor turns normalized input into template field values
///
/// One opaque model call per request. Failures are not retried.
pub struct Extractor<L>
where
    L: LlmProvider,
{
    llm_provider: Arc<L>,
    config: ExtractorConfig,
}

impl<L: LlmProvider> Clone for Extractor<L> {
    fn clone(&self) -> Self {
        Self {
            llm_provider: Arc::clone(&self.llm_provider),
            config: self.config.clone(),
        }
    }
}

impl<L> Extractor<L>
where
    L: LlmProvider + Send + Sync + 'static,
    L::Error: std::fmt::Display,
{
    /// Create a new Extractor
    pub fn new(llm_provider: L, config: ExtractorConfig) -> Self {
        Self {
            llm_provider: Arc::new(llm_provider),
            config,
        }
    }

    /// The underlying provider
    pub fn provider(&self) -> &L {
        &self.llm_provider
    }

    /// Extract field values, running the blocking model call off the runtime
    pub async fn extract(
        &self,
        input: ExtractionInput,
        template: TemplateDescriptor,
    ) -> Result<FieldValues, ExtractorError> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.extract_fields(&input, &template))
            .await
            .map_err(|e| ExtractorError::Llm(format!("Task join error: {}", e)))?
    }

    /// Build the model request: prompt plus inline attachments
    fn build_request(
        &self,
        input: &ExtractionInput,
        template: &TemplateDescriptor,
    ) -> Result<LlmRequest, ExtractorError> {
        let text_len = input.free_text.chars().count();
        if text_len > self.config.max_text_length {
            return Err(ExtractorError::TextTooLong(
                text_len,
                self.config.max_text_length,
            ));
        }

        let prompt = PromptBuilder::new(
            &template.display_name,
            template.field_mapping.field_names(),
            &input.free_text,
        )
        .with_hint(template.extraction_hint.as_deref())
        .with_prior(input.prior_structured_data.as_ref())
        .build();

        let mut attachments = Vec::new();
        let mut total_bytes: u64 = 0;
        for attachment in &input.attachments {
            match attachment.kind {
                AttachmentKind::Image | AttachmentKind::Pdf | AttachmentKind::Text => {}
                AttachmentKind::Spreadsheet | AttachmentKind::Other => {
                    debug!(
                        "Not sending '{}' to the model ({:?})",
                        attachment.original_name, attachment.kind
                    );
                    continue;
                }
            }

            let data = std::fs::read(&attachment.path).map_err(|e| {
                ExtractorError::Attachment(attachment.original_name.clone(), e.to_string())
            })?;
            total_bytes += data.len() as u64;
            if total_bytes > self.config.max_attachment_bytes {
                return Err(ExtractorError::AttachmentsTooLarge(
                    total_bytes,
                    self.config.max_attachment_bytes,
                ));
            }

            attachments.push(InlineBlob {
                mime_type: attachment.mime_type().to_string(),
                data,
            });
        }

        debug!(
            "Prompt length: {} chars, {} inline attachment(s), {} bytes",
            prompt.chars().count(),
            attachments.len(),
            total_bytes
        );

        Ok(LlmRequest {
            prompt,
            attachments,
        })
    }
}

impl<L> FieldExtractor for Extractor<L>
where
    L: LlmProvider + Send + Sync + 'static,
    L::Error: std::fmt::Display,
{
    type Error = ExtractorError;

    fn extract_fields(
        &self,
        input: &ExtractionInput,
        template: &TemplateDescriptor,
    ) -> Result<FieldValues, Self::Error> {
        let start = Instant::now();
        info!("Starting extraction for template '{}'", template.id);

        let request = self.build_request(input, template)?;

        let response = self
            .llm_provider
            .generate_json(&request)
            .map_err(|e| ExtractorError::Llm(e.to_string()))?;

        debug!("LLM response length: {} chars", response.chars().count());

        let vocabulary = template.field_mapping.field_names();
        let values = parse_llm_response(&response, &vocabulary)?;

        info!(
            "Extraction complete: {} of {} field(s) filled in {} ms",
            values.len(),
            vocabulary.len(),
            start.elapsed().as_millis()
        );

        Ok(values)
    }
}
