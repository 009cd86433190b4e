//! Welfill Router
//!
//! HTTP front end for the fill pipeline: an upload page, template listing,
//! `/process` to turn notes into a filled workbook, and one-shot downloads.
//!
//! # Architecture
//!
//! ```text
//! POST /process ──► Uploads (temp_dir) ──► Pipeline ──► output_dir
//!                                             │
//!           TemplateRegistry · Extractor · OverrideMerger · TemplateFiller
//!
//! GET /download/{name} ──► read ──► delete
//! SweeperWorker ──► removes outputs nobody downloaded
//! ```

#![warn(missing_docs)]

pub mod auth;
pub mod config;
pub mod handlers;
pub mod pipeline;
pub mod registry;

use auth::Credentials;
use config::RouterConfig;
use handlers::{create_router, AppState};
use pipeline::Pipeline;
use registry::TemplateRegistry;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use welfill_domain::traits::LlmProvider;
use welfill_extractor::Extractor;
use welfill_janitor::{OutputSweeper, SweeperWorker};
use welfill_llm::GeminiProvider;
use welfill_merger::OverrideMerger;
use welfill_sheet::TemplateFiller;

/// Router error
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Template registry error
    #[error("Template registry error: {0}")]
    Registry(#[from] registry::RegistryError),

    /// Server binding error
    #[error("Failed to bind server: {0}")]
    Bind(#[from] std::io::Error),

    /// Server error
    #[error("Server error: {0}")]
    Server(String),
}

/// Build application state from configuration and a provider
///
/// Loads the template registry and creates the scratch directories.
pub fn build_state<P>(config: &RouterConfig, provider: P) -> Result<AppState<P>, RouterError>
where
    P: LlmProvider + Send + Sync + 'static,
    P::Error: std::fmt::Display,
{
    let registry = Arc::new(TemplateRegistry::load(
        &config.storage.template_config,
        &config.storage.template_dir,
    )?);

    std::fs::create_dir_all(&config.storage.temp_dir)?;
    std::fs::create_dir_all(&config.storage.output_dir)?;

    let pipeline = Pipeline::new(
        registry,
        Extractor::new(provider, config.extractor.clone()),
        OverrideMerger::new(config.era.clone()),
        TemplateFiller::new(&config.storage.output_dir),
    );

    Ok(AppState {
        pipeline,
        credentials: Arc::new(Credentials::new(
            &config.auth.username,
            &config.auth.password,
        )),
        temp_dir: config.storage.temp_dir.clone(),
        max_upload_bytes: config.storage.max_upload_bytes(),
    })
}

/// Start the HTTP server
///
/// Connects to Gemini, loads templates, starts the output sweeper and
/// serves until the process is stopped.
pub async fn start_server(config: RouterConfig) -> Result<(), RouterError> {
    info!("Starting Welfill server");
    info!("Bind address: {}", config.bind_addr());
    info!(
        "Model: {} (timeout {}s)",
        config.llm.model, config.llm.timeout_secs
    );
    if config.llm.api_key.is_none() {
        warn!("No Gemini API key configured; /process will fail until one is set");
    }

    let provider = GeminiProvider::new(config.llm.gemini_config());
    let state = build_state(&config, provider)?;
    info!(
        "Templates: {}, uploads: {}, outputs: {}",
        state.pipeline.registry().len(),
        config.storage.temp_dir.display(),
        config.storage.output_dir.display()
    );

    let sweeper = OutputSweeper::new(&config.storage.output_dir, config.storage.sweeper.clone());
    tokio::spawn(async move {
        if let Err(e) = SweeperWorker::new(sweeper).run().await {
            warn!("Output sweeper stopped: {}", e);
        }
    });

    let app = create_router(state);

    // Bind and serve
    let listener = TcpListener::bind(&config.bind_addr()).await?;
    info!("Listening on {}", config.bind_addr());

    axum::serve(listener, app)
        .await
        .map_err(|e| RouterError::Server(e.to_string()))?;

    Ok(())
}
