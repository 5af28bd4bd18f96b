//! simpl-core: evaluation runs over uploaded datasets
//!
//! Resolves scorer definitions, evaluates datasets through an
//! [`engine::EvaluationEngine`], drives runs through their lifecycle and
//! pages through the row-level results.

pub mod dataset;
pub mod domain;
pub mod engine;
pub mod metrics;
pub mod obs;
pub mod orchestrator;
pub mod report;
pub mod resolver;
pub mod telemetry;

pub use dataset::{detect_columns, store_upload, Dataset, DatasetError, StoredUpload};
pub use domain::{Aggregation, EvalError, JudgeConfig, JudgeExample, Result};
pub use engine::{
    EngineError, EvaluationEngine, EvaluationOutput, JudgeClient, JudgeError, LocalEngine,
    OpenAiJudgeClient, EVAL_RESULTS_TABLE,
};
pub use metrics::METRICS;
pub use obs::{
    emit_engine_run_attached, emit_run_failed, emit_run_finalize_error, emit_run_finished,
    emit_run_started, emit_run_triggered, emit_scorer_skipped, RunSpan,
};
pub use orchestrator::{RunOrchestrator, TriggerRequest, DEFAULT_EVAL_TYPE};
pub use report::{read_page, run_rows, ReportError, RowPage, DEFAULT_PAGE_SIZE};
pub use resolver::{resolve, ResolvedScorer, ScorerError};
pub use telemetry::init_tracing;
