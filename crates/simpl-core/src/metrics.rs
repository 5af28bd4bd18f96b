//! Process-wide counters for evaluation runs.
//!
//! Counters are bumped silently at the call site. [`Metrics::flush`] emits
//! the current values as one `tracing::info!` event.

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    runs_triggered: AtomicU64,
    runs_completed: AtomicU64,
    runs_failed: AtomicU64,
    scorers_skipped: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            runs_triggered: AtomicU64::new(0),
            runs_completed: AtomicU64::new(0),
            runs_failed: AtomicU64::new(0),
            scorers_skipped: AtomicU64::new(0),
        }
    }

    pub fn inc_runs_triggered(&self) {
        self.runs_triggered.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "runs_triggered", "counter incremented");
    }

    pub fn inc_runs_completed(&self) {
        self.runs_completed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "runs_completed", "counter incremented");
    }

    pub fn inc_runs_failed(&self) {
        self.runs_failed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "runs_failed", "counter incremented");
    }

    /// A profile referenced a scorer that no longer exists.
    pub fn inc_scorers_skipped(&self) {
        self.scorers_skipped.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "scorers_skipped", "counter incremented");
    }

    /// Emit all counters as a single `info!` event, e.g. after each run.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            runs_triggered = self.runs_triggered(),
            runs_completed = self.runs_completed(),
            runs_failed = self.runs_failed(),
            scorers_skipped = self.scorers_skipped(),
        );
    }

    pub fn runs_triggered(&self) -> u64 {
        self.runs_triggered.load(Ordering::Relaxed)
    }

    pub fn runs_completed(&self) -> u64 {
        self.runs_completed.load(Ordering::Relaxed)
    }

    pub fn runs_failed(&self) -> u64 {
        self.runs_failed.load(Ordering::Relaxed)
    }

    pub fn scorers_skipped(&self) -> u64 {
        self.scorers_skipped.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.runs_triggered.store(0, Ordering::Relaxed);
        self.runs_completed.store(0, Ordering::Relaxed);
        self.runs_failed.store(0, Ordering::Relaxed);
        self.scorers_skipped.store(0, Ordering::Relaxed);
    }
}
