//! Welfill server
//!
//! Starts the HTTP server that turns caregiver notes into filled workbooks.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use welfill_router::{config::RouterConfig, start_server};

#[derive(Parser)]
#[command(name = "welfill-server")]
#[command(version, about = "Fill spreadsheet records from caregiver notes", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, env = "WELFILL_CONFIG", default_value = "config/welfill.toml")]
    config: PathBuf,

    /// Override the configured bind port
    #[arg(short = 'p', long, env = "WELFILL_PORT")]
    bind_port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Secrets may live in .env next to the binary's working directory
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = RouterConfig::from_file(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    if let Some(port) = cli.bind_port {
        config.bind_port = port;
    }

    start_server(config).await?;
    Ok(())
}
