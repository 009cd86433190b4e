//! Metrics collection for sweeps

/// Counters collected by the output sweeper
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepMetrics {
    /// Files deleted
    pub files_deleted: usize,

    /// Bytes reclaimed by deletions
    pub bytes_reclaimed: u64,

    /// Files that could not be inspected or deleted
    pub errors: usize,

    /// Total sweep iterations completed
    pub sweep_count: usize,
}

impl SweepMetrics {
    /// Create new empty metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a deleted file
    pub fn record_deletion(&mut self, bytes: u64) {
        self.files_deleted += 1;
        self.bytes_reclaimed += bytes;
    }

    /// Record a file that could not be handled
    pub fn record_error(&mut self) {
        self.errors += 1;
    }

    /// Record a sweep cycle completion
    pub fn record_sweep(&mut self) {
        self.sweep_count += 1;
    }

    /// Fold one cycle's counters into the running totals
    pub fn absorb(&mut self, cycle: &SweepMetrics) {
        self.files_deleted += cycle.files_deleted;
        self.bytes_reclaimed += cycle.bytes_reclaimed;
        self.errors += cycle.errors;
        self.sweep_count += cycle.sweep_count;
    }

    /// Reset all metrics
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// One-line summary for logs
    pub fn summary(&self) -> String {
        format!(
            "{} sweep(s), {} file(s) deleted, {} byte(s) reclaimed, {} error(s)",
            self.sweep_count, self.files_deleted, self.bytes_reclaimed, self.errors
        )
    }
}
