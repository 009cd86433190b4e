//! Welfill Janitor
//!
//! Filesystem hygiene for the request pipeline.
//!
//! # Overview
//!
//! - **Scratch guards**: [`ScratchFile`] and [`ScratchSet`] delete uploads
//!   and served outputs when the request that owns them finishes, on every
//!   path out of the handler
//! - **Output sweeping**: [`OutputSweeper`] removes outputs nobody
//!   downloaded once they pass the retention age
//! - **Background worker**: [`SweeperWorker`] runs the sweeper on an
//!   interval until Ctrl+C
//!
//! # Usage
//!
//! ```no_run
//! use welfill_janitor::{OutputSweeper, SweeperConfig, SweeperWorker};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let sweeper = OutputSweeper::new("output", SweeperConfig::default());
//!     SweeperWorker::new(sweeper).run().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Configuration
//!
//! ```toml
//! [storage.sweeper]
//! retention_minutes = 60
//! sweep_interval_minutes = 10
//! dry_run = false
//! ```

#![warn(missing_docs)]

mod config;
mod error;
mod metrics;
mod scratch;
mod sweeper;
mod worker;

pub use config::SweeperConfig;
pub use error::JanitorError;
pub use metrics::SweepMetrics;
pub use scratch::{ScratchFile, ScratchSet};
pub use sweeper::OutputSweeper;
pub use worker::SweeperWorker;
