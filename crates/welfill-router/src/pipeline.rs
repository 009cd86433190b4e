//! Request pipeline
//!
//! One `/process` request runs start to finish here:
//!
//! ```text
//! lookup ─► normalize ─► extract ─► merge ─► name ─► fill
//! ```
//!
//! The template is looked up before anything else, so an unknown id never
//! reaches the extractor. Spreadsheet work and the model call run on the
//! blocking pool.

use crate::registry::{RegistryError, TemplateRegistry};
use chrono::{Local, NaiveDate};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;
use welfill_domain::traits::LlmProvider;
use welfill_domain::{Attachment, ManualField, OutputArtifact};
use welfill_extractor::{normalize, Extractor, ExtractorError};
use welfill_janitor::ScratchSet;
use welfill_merger::OverrideMerger;
use welfill_sheet::{output_file_name, TemplateFiller};

/// Pipeline error
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Template id not configured
    #[error("Invalid template ID")]
    UnknownTemplate(String),

    /// Neither text nor files were sent
    #[error("No input provided (files or text)")]
    NoInputProvided,

    /// Input exceeds a configured limit
    #[error("{0}")]
    InputRejected(String),

    /// Multipart body could not be decoded
    #[error("Malformed upload: {0}")]
    BadUpload(String),

    /// An upload could not be written to scratch storage
    #[error("Failed to save upload: {0}")]
    Upload(String),

    /// The model call or its response failed
    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    /// The template could not be filled
    #[error("Failed to write output: {0}")]
    TemplateWriteFailed(String),

    /// Requested output does not exist
    #[error("File not found")]
    NotFound,

    /// Requested filename is not a plain name
    #[error("Invalid filename")]
    InvalidFilename,

    /// Internal failure
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<RegistryError> for PipelineError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::UnknownTemplate(id) => PipelineError::UnknownTemplate(id),
            other => PipelineError::Internal(other.to_string()),
        }
    }
}

impl From<ExtractorError> for PipelineError {
    fn from(e: ExtractorError) -> Self {
        match e {
            ExtractorError::NoInputProvided => PipelineError::NoInputProvided,
            ExtractorError::TextTooLong(..) | ExtractorError::AttachmentsTooLarge(..) => {
                PipelineError::InputRejected(e.to_string())
            }
            other => PipelineError::ExtractionFailed(other.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for PipelineError {
    fn from(e: tokio::task::JoinError) -> Self {
        PipelineError::Internal(format!("Task join error: {}", e))
    }
}

/// Files uploaded with one request
///
/// Saved under a random prefix in the scratch directory and deleted when
/// this value drops.
#[derive(Debug, Default)]
pub struct Uploads {
    scratch: ScratchSet,
    attachments: Vec<Attachment>,
}

impl Uploads {
    /// Create an empty upload set
    pub fn new() -> Self {
        Self::default()
    }

    /// Save `data` as `{uuid}_{name}` in `dir`
    ///
    /// Uploads without a usable filename are skipped.
    pub async fn save(&mut self, dir: &Path, name: &str, data: &[u8]) -> Result<(), PipelineError> {
        let name = upload_file_name(name);
        if name.is_empty() {
            debug!("Skipping upload without a filename");
            return Ok(());
        }

        let path = dir.join(format!("{}_{}", Uuid::now_v7(), name));
        // Guard before writing so a partial file is still removed
        self.scratch.push(path.clone());
        tokio::fs::write(&path, data)
            .await
            .map_err(|e| PipelineError::Upload(format!("{}: {}", name, e)))?;

        debug!("Saved upload '{}' ({} bytes)", name, data.len());
        self.attachments.push(Attachment::new(path, name));
        Ok(())
    }

    /// Saved uploads, in arrival order
    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    /// Number of saved uploads
    pub fn len(&self) -> usize {
        self.attachments.len()
    }

    /// Whether nothing was saved
    pub fn is_empty(&self) -> bool {
        self.attachments.is_empty()
    }
}

/// Final path component of a client-supplied filename
fn upload_file_name(name: &str) -> String {
    name.rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim()
        .trim_start_matches('.')
        .to_string()
}

/// Inputs of one `/process` request
#[derive(Debug, Default)]
pub struct ProcessRequest {
    /// Registry id of the target template
    pub template_id: String,
    /// Free-text notes
    pub text: Option<String>,
    /// Manual form fields, possibly blank
    pub manual_fields: Vec<(ManualField, String)>,
    /// Uploaded files
    pub uploads: Uploads,
}

/// The fill pipeline and its collaborators
pub struct Pipeline<P: LlmProvider> {
    registry: Arc<TemplateRegistry>,
    extractor: Extractor<P>,
    merger: OverrideMerger,
    filler: TemplateFiller,
}

impl<P: LlmProvider> Clone for Pipeline<P> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            extractor: self.extractor.clone(),
            merger: self.merger.clone(),
            filler: self.filler.clone(),
        }
    }
}

impl<P> Pipeline<P>
where
    P: LlmProvider + Send + Sync + 'static,
    P::Error: std::fmt::Display,
{
    /// Assemble a pipeline
    pub fn new(
        registry: Arc<TemplateRegistry>,
        extractor: Extractor<P>,
        merger: OverrideMerger,
        filler: TemplateFiller,
    ) -> Self {
        Self {
            registry,
            extractor,
            merger,
            filler,
        }
    }

    /// Template registry
    pub fn registry(&self) -> &TemplateRegistry {
        &self.registry
    }

    /// Extractor (and through it, the provider)
    pub fn extractor(&self) -> &Extractor<P> {
        &self.extractor
    }

    /// Directory outputs are written to
    pub fn output_dir(&self) -> &Path {
        self.filler.output_dir()
    }

    /// Run a request, dating the output today
    pub async fn run(&self, request: ProcessRequest) -> Result<OutputArtifact, PipelineError> {
        self.run_on(request, Local::now().date_naive()).await
    }

    /// Run a request, dating the output `today`
    pub async fn run_on(
        &self,
        request: ProcessRequest,
        today: NaiveDate,
    ) -> Result<OutputArtifact, PipelineError> {
        let template = self.registry.lookup(&request.template_id)?.clone();
        let prior_template = self.registry.prior_template_of(&template).cloned();

        info!(
            "Processing '{}' with {} upload(s)",
            template.id,
            request.uploads.len()
        );

        // Uploads stay guarded until the end of this function
        let ProcessRequest {
            text,
            manual_fields,
            uploads,
            ..
        } = request;
        let attachments = uploads.attachments().to_vec();

        let (input, manual) = {
            let template = template.clone();
            tokio::task::spawn_blocking(move || {
                normalize(
                    text.as_deref(),
                    manual_fields,
                    attachments,
                    &template,
                    prior_template.as_ref(),
                )
            })
            .await??
        };
        let prior = input.prior_structured_data.clone();

        let extracted = self.extractor.extract(input, template.clone()).await?;
        debug!("Extracted {} field(s)", extracted.len());

        let resolved = self.merger.merge_with_prior(
            extracted,
            prior.as_ref(),
            &manual,
            manual.get(ManualField::Date),
            &template,
        );

        let output_name = output_file_name(&template, &resolved, today);

        let filler = self.filler.clone();
        let artifact = tokio::task::spawn_blocking(move || {
            filler.fill(
                &template.source_file,
                &resolved,
                &template.field_mapping,
                &output_name,
            )
        })
        .await?
        .map_err(|e| PipelineError::TemplateWriteFailed(e.to_string()))?;

        info!("Generated '{}'", artifact.logical_name);
        drop(uploads);
        Ok(artifact)
    }
}
