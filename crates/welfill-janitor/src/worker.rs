//! Background worker for continuous sweeping

use crate::{JanitorError, OutputSweeper, SweepMetrics};
use tokio::time::{interval, Duration};

/// Background worker that runs an [`OutputSweeper`] on a schedule
pub struct SweeperWorker {
    sweeper: OutputSweeper,
    interval: Duration,
}

impl SweeperWorker {
    /// Create a worker sweeping at the sweeper's configured interval
    pub fn new(sweeper: OutputSweeper) -> Self {
        let interval = sweeper.config().sweep_interval();
        Self { sweeper, interval }
    }

    /// Run the worker until a shutdown signal (Ctrl+C) is received
    ///
    /// Sweep failures are logged and the worker keeps going.
    pub async fn run(mut self) -> Result<(), JanitorError> {
        let mut ticker = interval(self.interval);

        tracing::info!(
            "Sweeper started for {} (interval: {:?}, retention: {:?})",
            self.sweeper.dir().display(),
            self.interval,
            self.sweeper.config().retention()
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep_cycle().await;
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Shutdown signal received, stopping sweeper");
                    break;
                }
            }
        }

        tracing::info!("Sweeper stopped: {}", self.sweeper.metrics().summary());
        Ok(())
    }

    /// Run a fixed number of cycles (useful for testing)
    pub async fn run_cycles(mut self, cycles: usize) -> Result<SweepMetrics, JanitorError> {
        let mut ticker = interval(self.interval);
        for cycle in 0..cycles {
            ticker.tick().await;
            tracing::debug!("Starting sweep cycle {}/{}", cycle + 1, cycles);
            self.sweep_cycle().await;
        }
        Ok(self.sweeper.metrics().clone())
    }

    /// Directory I/O runs on the blocking pool
    async fn sweep_cycle(&mut self) {
        let dir = self.sweeper.dir().to_path_buf();
        let config = self.sweeper.config().clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut once = OutputSweeper::new(dir, config);
            once.sweep()
        })
        .await
        .map_err(|e| JanitorError::Worker(format!("Task join error: {}", e)));

        match result {
            Ok(Ok(cycle)) => {
                if cycle.files_deleted > 0 || cycle.errors > 0 {
                    tracing::info!("Sweep completed: {}", cycle.summary());
                }
                self.sweeper.record(&cycle);
            }
            Ok(Err(e)) | Err(e) => {
                tracing::error!("Sweep failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SweeperConfig;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_run_cycles_counts_sweeps() {
        let dir = TempDir::new().unwrap();
        let config = SweeperConfig {
            sweep_interval_minutes: 1,
            ..SweeperConfig::default()
        };
        let worker = SweeperWorker::new(OutputSweeper::new(dir.path(), config));

        // The first tick completes immediately
        let metrics = worker.run_cycles(1).await.unwrap();
        assert_eq!(metrics.sweep_count, 1);
        assert_eq!(metrics.files_deleted, 0);
    }
}
