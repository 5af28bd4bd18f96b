//! Structured lifecycle events for evaluation runs.
//!
//! - `RunSpan` / [`run_span`]: spans tagged with the run id
//! - `emit_*`: one event per lifecycle step (trigger, start, skip, engine
//!   attach, finish, failure, finalisation error)

use tracing::{info, warn};

/// RAII guard that enters a run-scoped span for synchronous code.
///
/// ```ignore
/// let _span = RunSpan::enter("5f0c...");
/// ```
pub struct RunSpan {
    _span: tracing::span::EnteredSpan,
}

impl RunSpan {
    pub fn enter(run_id: &str) -> Self {
        Self {
            _span: run_span(run_id).entered(),
        }
    }
}

/// Span for a run, for use with `tracing::Instrument` in async code.
pub fn run_span(run_id: &str) -> tracing::Span {
    tracing::info_span!("simpl.run", run_id = %run_id)
}

pub fn emit_run_triggered(run_id: &str, profile_id: &str, dataset_path: &str) {
    info!(
        event = "run.triggered",
        run_id = %run_id,
        profile_id = %profile_id,
        dataset_path = %dataset_path,
    );
}

/// The run moved to PROCESSING.
pub fn emit_run_started(run_id: &str) {
    info!(event = "run.started", run_id = %run_id);
}

pub fn emit_scorer_skipped(run_id: &str, scorer_id: &str, profile_name: &str) {
    warn!(
        event = "run.scorer_skipped",
        run_id = %run_id,
        scorer_id = %scorer_id,
        profile = %profile_name,
        "scorer not found, skipping",
    );
}

pub fn emit_engine_run_attached(run_id: &str, engine_run_id: &str, scorers: usize) {
    info!(
        event = "run.engine_attached",
        run_id = %run_id,
        engine_run_id = %engine_run_id,
        scorers = scorers,
    );
}

/// Run reached COMPLETED.
pub fn emit_run_finished(run_id: &str, duration_ms: u64, metrics: usize, has_rows: bool) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        duration_ms = duration_ms,
        metrics = metrics,
        has_rows = has_rows,
    );
}

/// Run reached FAILED.
pub fn emit_run_failed(run_id: &str, duration_ms: u64, error: &dyn std::fmt::Display) {
    warn!(
        event = "run.failed",
        run_id = %run_id,
        duration_ms = duration_ms,
        error = %error,
    );
}

/// The final status write itself failed.
pub fn emit_run_finalize_error(run_id: &str, error: &dyn std::fmt::Display) {
    tracing::error!(event = "run.finalize_error", run_id = %run_id, error = %error);
}
