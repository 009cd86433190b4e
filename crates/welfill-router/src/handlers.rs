//! HTTP request handlers.
//!
//! Every route except `/health` sits behind basic auth.

use crate::auth::{require_basic_auth, Credentials};
use crate::pipeline::{Pipeline, PipelineError, ProcessRequest};
use axum::{
    extract::{DefaultBodyLimit, Multipart, Path as AxumPath, State},
    http::{header, HeaderValue, StatusCode},
    middleware,
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Router as AxumRouter,
};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, warn};
use welfill_domain::traits::LlmProvider;
use welfill_domain::ManualField;
use welfill_janitor::ScratchFile;

/// Content type of generated workbooks
pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Shared application state
pub struct AppState<P: LlmProvider> {
    /// Fill pipeline
    pub pipeline: Pipeline<P>,
    /// Credentials checked by the auth middleware
    pub credentials: Arc<Credentials>,
    /// Scratch directory for uploads
    pub temp_dir: PathBuf,
    /// Request body limit in bytes
    pub max_upload_bytes: usize,
}

impl<P: LlmProvider> Clone for AppState<P> {
    fn clone(&self) -> Self {
        Self {
            pipeline: self.pipeline.clone(),
            credentials: Arc::clone(&self.credentials),
            temp_dir: self.temp_dir.clone(),
            max_upload_bytes: self.max_upload_bytes,
        }
    }
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthCheckResponse {
    /// Overall health status
    pub status: String,
    /// Number of configured templates
    pub templates: usize,
}

/// One entry of `GET /templates`
#[derive(Debug, Serialize, Deserialize)]
pub struct TemplateSummary {
    /// Registry id
    pub id: String,
    /// Display name
    pub name: String,
    /// Target sheet, if configured
    pub sheet_name: Option<String>,
    /// Field names in mapping order
    pub fields: Vec<String>,
    /// Template this one chains off
    pub prior_stage: Option<String>,
}

/// Response of `POST /process`
#[derive(Debug, Serialize, Deserialize)]
pub struct ProcessResponse {
    /// Name to pass to `/download/{filename}`
    pub filename: String,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        let status = match &self {
            PipelineError::UnknownTemplate(_)
            | PipelineError::NoInputProvided
            | PipelineError::InputRejected(_)
            | PipelineError::BadUpload(_)
            | PipelineError::InvalidFilename => StatusCode::BAD_REQUEST,
            PipelineError::NotFound => StatusCode::NOT_FOUND,
            PipelineError::Upload(_)
            | PipelineError::ExtractionFailed(_)
            | PipelineError::TemplateWriteFailed(_)
            | PipelineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            error!("{}", self);
        } else {
            debug!("Rejected request: {}", self);
        }

        let body = Json(ErrorResponse {
            error: self.to_string(),
        });
        (status, body).into_response()
    }
}

/// GET / - Upload page
async fn index() -> Html<&'static str> {
    Html(include_str!("../assets/index.html"))
}

/// GET /health - Health check endpoint
async fn health_check<P>(State(state): State<AppState<P>>) -> Json<HealthCheckResponse>
where
    P: LlmProvider + Send + Sync + 'static,
    P::Error: std::fmt::Display,
{
    let templates = state.pipeline.registry().len();
    Json(HealthCheckResponse {
        status: if templates > 0 { "healthy" } else { "degraded" }.to_string(),
        templates,
    })
}

/// GET /templates - Configured templates, ordered by id
async fn list_templates<P>(State(state): State<AppState<P>>) -> Json<Vec<TemplateSummary>>
where
    P: LlmProvider + Send + Sync + 'static,
    P::Error: std::fmt::Display,
{
    let templates = state
        .pipeline
        .registry()
        .list()
        .map(|t| TemplateSummary {
            id: t.id.clone(),
            name: t.display_name.clone(),
            sheet_name: t.sheet_name.clone(),
            fields: t
                .field_mapping
                .field_names()
                .into_iter()
                .map(str::to_string)
                .collect(),
            prior_stage: t.prior_stage.clone(),
        })
        .collect();
    Json(templates)
}

/// POST /process - Extract, merge and fill one record
///
/// Multipart fields: `template_id` (required), `text_input`, the manual
/// fields by form key, and any number of `files`.
async fn process<P>(
    State(state): State<AppState<P>>,
    mut multipart: Multipart,
) -> Result<Json<ProcessResponse>, PipelineError>
where
    P: LlmProvider + Send + Sync + 'static,
    P::Error: std::fmt::Display,
{
    let bad_upload = |e: axum::extract::multipart::MultipartError| {
        PipelineError::BadUpload(e.body_text())
    };

    let mut request = ProcessRequest::default();
    let mut template_id = None;

    while let Some(field) = multipart.next_field().await.map_err(bad_upload)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "files" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let data = field.bytes().await.map_err(bad_upload)?;
                request
                    .uploads
                    .save(&state.temp_dir, &file_name, &data)
                    .await?;
            }
            "template_id" => template_id = Some(field.text().await.map_err(bad_upload)?),
            "text_input" => request.text = Some(field.text().await.map_err(bad_upload)?),
            other => match ManualField::from_form_key(other) {
                Some(manual) => {
                    let value = field.text().await.map_err(bad_upload)?;
                    request.manual_fields.push((manual, value));
                }
                None => debug!("Ignoring unknown form field '{}'", other),
            },
        }
    }

    request.template_id = template_id
        .map(|id| id.trim().to_string())
        .ok_or_else(|| PipelineError::BadUpload("template_id is required".to_string()))?;

    let artifact = state.pipeline.run(request).await?;
    Ok(Json(ProcessResponse {
        filename: artifact.logical_name,
    }))
}

/// GET /download/:filename - Serve a generated workbook once
///
/// The file is deleted after its bytes are read, whether or not the client
/// receives them.
async fn download<P>(
    State(state): State<AppState<P>>,
    AxumPath(filename): AxumPath<String>,
) -> Result<Response, PipelineError>
where
    P: LlmProvider + Send + Sync + 'static,
    P::Error: std::fmt::Display,
{
    if !is_plain_file_name(&filename) {
        warn!("Rejected download of '{}'", filename);
        return Err(PipelineError::InvalidFilename);
    }

    let path = state.pipeline.output_dir().join(&filename);
    let data = match tokio::fs::read(&path).await {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(PipelineError::NotFound)
        }
        Err(e) => return Err(PipelineError::Internal(e.to_string())),
    };
    let _served = ScratchFile::new(path);

    let disposition = HeaderValue::from_str(&content_disposition(&filename))
        .map_err(|e| PipelineError::Internal(e.to_string()))?;
    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(XLSX_CONTENT_TYPE)),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        data,
    )
        .into_response())
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(['/', '\\']) && !name.contains("..")
}

/// Bytes RFC 5987 `attr-char` leaves unescaped, besides letters and digits
const ATTR_CHAR: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'#')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b'-')
    .remove(b'.')
    .remove(b'^')
    .remove(b'_')
    .remove(b'`')
    .remove(b'|')
    .remove(b'~');

/// `attachment` disposition with an RFC 5987 UTF-8 filename
fn content_disposition(filename: &str) -> String {
    format!(
        "attachment; filename*=UTF-8''{}",
        utf8_percent_encode(filename, ATTR_CHAR)
    )
}

/// Create the axum router with all routes
pub fn create_router<P>(state: AppState<P>) -> AxumRouter
where
    P: LlmProvider + Send + Sync + 'static,
    P::Error: std::fmt::Display,
{
    let protected = AxumRouter::new()
        .route("/", get(index))
        .route("/templates", get(list_templates::<P>))
        .route("/process", post(process::<P>))
        .route("/download/:filename", get(download::<P>))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state.credentials),
            require_basic_auth,
        ));

    AxumRouter::new()
        .route("/health", get(health_check::<P>))
        .merge(protected)
        .layer(DefaultBodyLimit::max(state.max_upload_bytes))
        .with_state(state)
}
