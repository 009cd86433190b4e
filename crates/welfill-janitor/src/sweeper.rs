//! Output directory sweeping
//!
//! Outputs are normally deleted when downloaded. Anything left behind (never
//! downloaded, or staging files from an interrupted write) is removed once it
//! is older than the retention age.

use crate::{JanitorError, SweepMetrics, SweeperConfig};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

/// Deletes stale files from one directory
#[derive(Debug)]
pub struct OutputSweeper {
    dir: PathBuf,
    config: SweeperConfig,
    metrics: SweepMetrics,
}

impl OutputSweeper {
    /// Create a sweeper for `dir`
    pub fn new(dir: impl Into<PathBuf>, config: SweeperConfig) -> Self {
        Self {
            dir: dir.into(),
            config,
            metrics: SweepMetrics::new(),
        }
    }

    /// Directory being swept
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Configuration in use
    pub fn config(&self) -> &SweeperConfig {
        &self.config
    }

    /// Run one sweep cycle
    ///
    /// Only regular files directly inside the directory are considered.
    /// Per-file failures are counted and logged; only failing to read the
    /// directory itself is an error.
    pub fn sweep(&mut self) -> Result<SweepMetrics, JanitorError> {
        self.sweep_at(SystemTime::now())
    }

    /// Sweep as if the current time were `now`
    pub fn sweep_at(&mut self, now: SystemTime) -> Result<SweepMetrics, JanitorError> {
        let retention = self.config.retention();
        let mut cycle = SweepMetrics::new();

        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("{} does not exist yet, nothing to sweep", self.dir.display());
                cycle.record_sweep();
                self.metrics.absorb(&cycle);
                return Ok(cycle);
            }
            Err(e) => return Err(e.into()),
        };

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Failed to read entry in {}: {}", self.dir.display(), e);
                    cycle.record_error();
                    continue;
                }
            };

            let metadata = match entry.metadata() {
                Ok(metadata) if metadata.is_file() => metadata,
                Ok(_) => continue,
                Err(e) => {
                    warn!("Failed to stat {}: {}", entry.path().display(), e);
                    cycle.record_error();
                    continue;
                }
            };

            let age = metadata
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .unwrap_or(Duration::ZERO);
            if age < retention {
                continue;
            }

            let path = entry.path();
            if self.config.dry_run {
                info!("[dry run] Would delete {} (age {:?})", path.display(), age);
                continue;
            }

            match std::fs::remove_file(&path) {
                Ok(()) => {
                    debug!("Deleted stale output {}", path.display());
                    cycle.record_deletion(metadata.len());
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!("Failed to delete {}: {}", path.display(), e);
                    cycle.record_error();
                }
            }
        }

        cycle.record_sweep();
        self.metrics.absorb(&cycle);
        Ok(cycle)
    }

    /// Running totals across all sweeps
    pub fn metrics(&self) -> &SweepMetrics {
        &self.metrics
    }

    /// Reset the running totals
    pub fn reset_metrics(&mut self) {
        self.metrics.reset();
    }

    /// Fold a cycle run elsewhere (on the blocking pool) into the totals
    pub(crate) fn record(&mut self, cycle: &SweepMetrics) {
        self.metrics.absorb(cycle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sweeper(dir: &Path, dry_run: bool) -> OutputSweeper {
        OutputSweeper::new(
            dir,
            SweeperConfig {
                retention_minutes: 30,
                sweep_interval_minutes: 5,
                dry_run,
            },
        )
    }

    #[test]
    fn test_deletes_only_files_past_retention() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("26.05.20_記録【山田】.xlsx");
        std::fs::write(&output, b"0123456789").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        let mut sweeper = sweeper(dir.path(), false);

        let fresh = sweeper.sweep().unwrap();
        assert_eq!(fresh.files_deleted, 0);
        assert!(output.exists());

        let later = SystemTime::now() + Duration::from_secs(31 * 60);
        let stale = sweeper.sweep_at(later).unwrap();
        assert_eq!(stale.files_deleted, 1);
        assert_eq!(stale.bytes_reclaimed, 10);
        assert!(!output.exists());
        assert!(dir.path().join("nested").exists());

        assert_eq!(sweeper.metrics().sweep_count, 2);
        assert_eq!(sweeper.metrics().files_deleted, 1);
    }

    #[test]
    fn test_dry_run_keeps_files() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("out.xlsx");
        std::fs::write(&output, b"x").unwrap();

        let mut sweeper = sweeper(dir.path(), true);
        let later = SystemTime::now() + Duration::from_secs(3600);
        let cycle = sweeper.sweep_at(later).unwrap();

        assert_eq!(cycle.files_deleted, 0);
        assert!(output.exists());
    }

    #[test]
    fn test_missing_directory_is_empty_sweep() {
        let dir = TempDir::new().unwrap();
        let mut sweeper = sweeper(&dir.path().join("not-created"), false);
        let cycle = sweeper.sweep().unwrap();
        assert_eq!(cycle.sweep_count, 1);
        assert_eq!(cycle.files_deleted, 0);
    }
}
