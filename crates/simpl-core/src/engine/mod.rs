//! Evaluation engine seam.
//!
//! The orchestrator drives an [`EvaluationEngine`] through three calls:
//! open an engine-side run, evaluate a dataset with resolved scorers, then
//! materialise the row-level table it produced.

pub mod aggregate;
pub mod builtin;
pub mod judge;
pub mod local;

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;

use crate::dataset::Dataset;
use crate::resolver::ResolvedScorer;

pub use builtin::BuiltinMetric;
pub use judge::{JudgeClient, JudgeError, OpenAiJudgeClient};
pub use local::LocalEngine;

/// Name of the row-level results table.
pub const EVAL_RESULTS_TABLE: &str = "eval_results_table";

/// Errors raised by an evaluation engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("unknown built-in metric: {0}")]
    UnknownMetric(String),

    #[error("metric {metric} requires column {column:?}")]
    MissingColumn { metric: String, column: String },

    #[error("unknown engine run: {0}")]
    UnknownRun(String),

    #[error("artifact {artifact} not found for run {run_id}")]
    ArtifactNotFound { run_id: String, artifact: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// What an evaluation produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvaluationOutput {
    /// Aggregate metrics keyed `<metric>/<aggregation>`.
    pub metrics: BTreeMap<String, f64>,
    /// Table name to artifact path, relative to the engine run.
    pub tables: BTreeMap<String, String>,
}

#[async_trait]
pub trait EvaluationEngine: Send + Sync {
    /// Open a fresh engine-side run and return its identifier.
    async fn start_run(&self) -> Result<String, EngineError>;

    /// Score every row of `dataset` with every scorer.
    async fn evaluate(
        &self,
        engine_run_id: &str,
        dataset: &Dataset,
        scorers: &[ResolvedScorer],
    ) -> Result<EvaluationOutput, EngineError>;

    /// Materialise an artifact of `engine_run_id` at a local path.
    async fn download_artifact(
        &self,
        engine_run_id: &str,
        artifact_path: &str,
    ) -> Result<PathBuf, EngineError>;
}
