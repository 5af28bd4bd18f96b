//! Evaluation run orchestration.
//!
//! `trigger` validates inputs, persists a PENDING run and detaches a task.
//! The task drives the run through PENDING → PROCESSING → COMPLETED | FAILED:
//!
//! 1. mark PROCESSING before any slow work
//! 2. load the dataset, the profile and every resolvable scorer
//! 3. evaluate under a fresh engine run, recording its id on the run
//! 4. capture the aggregates and materialise the row table
//! 5. mark COMPLETED, or FAILED with the error text if anything in 2-4 failed
//!
//! A panic in steps 2-4 is caught and recorded as a failure. Nothing is
//! retried.

use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use simpl_state::{EvalRunRecord, EvalStore, NewEvalRun, RunCompletion, RunStatus, StorageError};
use tokio::task::JoinHandle;
use tracing::{error, Instrument};
use uuid::Uuid;

use crate::dataset::{Dataset, DatasetError};
use crate::domain::{EvalError, Result};
use crate::engine::{EvaluationEngine, EVAL_RESULTS_TABLE};
use crate::metrics::METRICS;
use crate::obs;
use crate::resolver::{self, ResolvedScorer};

/// Eval-type hint recorded when the trigger does not supply one.
pub const DEFAULT_EVAL_TYPE: &str = "rag";

/// Request to start a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerRequest {
    pub profile_id: Uuid,
    /// Path of an uploaded dataset.
    pub dataset_id: String,
    #[serde(default)]
    pub eval_type: Option<String>,
}

/// Owns run execution. Cheap to clone.
#[derive(Clone)]
pub struct RunOrchestrator {
    store: Arc<dyn EvalStore>,
    engine: Arc<dyn EvaluationEngine>,
}

impl RunOrchestrator {
    pub fn new(store: Arc<dyn EvalStore>, engine: Arc<dyn EvaluationEngine>) -> Self {
        Self { store, engine }
    }

    pub fn store(&self) -> &Arc<dyn EvalStore> {
        &self.store
    }

    /// Validate the request, persist a PENDING run and schedule it.
    ///
    /// A missing profile or dataset fails here and creates no run.
    pub async fn trigger(&self, request: TriggerRequest) -> Result<EvalRunRecord> {
        self.store
            .get_profile(request.profile_id)
            .await
            .map_err(|err| not_found_or(err, EvalError::ProfileNotFound(request.profile_id)))?;

        if !tokio::fs::try_exists(&request.dataset_id)
            .await
            .unwrap_or(false)
        {
            return Err(EvalError::DatasetNotFound(request.dataset_id));
        }

        let run = self
            .store
            .create_run(NewEvalRun {
                profile_id: request.profile_id,
                dataset_path: request.dataset_id,
                eval_type: Some(
                    request
                        .eval_type
                        .unwrap_or_else(|| DEFAULT_EVAL_TYPE.to_string()),
                ),
            })
            .await?;

        METRICS.inc_runs_triggered();
        obs::emit_run_triggered(
            &run.id.to_string(),
            &run.profile_id.to_string(),
            &run.dataset_path,
        );

        self.spawn(run.id);
        Ok(run)
    }

    /// Execute `run_id` on a detached task.
    pub fn spawn(&self, run_id: Uuid) -> JoinHandle<Option<RunStatus>> {
        let this = self.clone();
        let span = obs::run_span(&run_id.to_string());
        tokio::spawn(async move { this.execute(run_id).await }.instrument(span))
    }

    /// Drive one run to a terminal state.
    ///
    /// Returns the terminal status written, or `None` if the run was absent,
    /// was not PENDING, or the final write failed.
    pub async fn execute(&self, run_id: Uuid) -> Option<RunStatus> {
        let rid = run_id.to_string();
        let started = Instant::now();

        let run = match self.store.mark_processing(run_id).await {
            Ok(run) => run,
            Err(err) if err.is_not_found() => {
                error!(run_id = %rid, "run not found");
                return None;
            }
            Err(err) => {
                obs::emit_run_finalize_error(&rid, &err);
                return None;
            }
        };
        obs::emit_run_started(&rid);

        let outcome = match AssertUnwindSafe(self.process(&run)).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(panic) => Err(EvalError::Panicked(panic_message(panic.as_ref()))),
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;
        let status = self.finalize(run_id, outcome, elapsed_ms).await;
        METRICS.flush();
        status
    }

    async fn process(&self, run: &EvalRunRecord) -> Result<RunCompletion> {
        let rid = run.id.to_string();

        let dataset = load_dataset(PathBuf::from(&run.dataset_path)).await?;

        let profile = self
            .store
            .get_profile(run.profile_id)
            .await
            .map_err(|err| not_found_or(err, EvalError::ProfileNotFound(run.profile_id)))?;

        let mut scorers: Vec<ResolvedScorer> = Vec::with_capacity(profile.scorer_ids.len());
        for scorer_id in &profile.scorer_ids {
            match self.store.get_scorer(*scorer_id).await {
                Ok(record) => scorers.push(resolver::resolve(&record)?),
                Err(err) if err.is_not_found() => {
                    METRICS.inc_scorers_skipped();
                    obs::emit_scorer_skipped(&rid, &scorer_id.to_string(), &profile.name);
                }
                Err(err) => return Err(err.into()),
            }
        }
        if scorers.is_empty() {
            return Err(EvalError::NoValidScorers);
        }
        if let Some(name) = duplicate_name(&scorers) {
            return Err(EvalError::DuplicateMetric(name.to_string()));
        }

        let engine_run_id = self.engine.start_run().await?;
        self.store
            .attach_engine_run(run.id, &engine_run_id)
            .await?;
        obs::emit_engine_run_attached(&rid, &engine_run_id, scorers.len());

        let output = self
            .engine
            .evaluate(&engine_run_id, &dataset, &scorers)
            .await?;

        let row_details_path = match output.tables.get(EVAL_RESULTS_TABLE) {
            Some(artifact) => Some(
                self.engine
                    .download_artifact(&engine_run_id, artifact)
                    .await?
                    .display()
                    .to_string(),
            ),
            None => None,
        };

        Ok(RunCompletion {
            summary_results: output.metrics,
            row_details_path,
        })
    }

    async fn finalize(
        &self,
        run_id: Uuid,
        outcome: Result<RunCompletion>,
        elapsed_ms: u64,
    ) -> Option<RunStatus> {
        let rid = run_id.to_string();

        let failure = match outcome {
            Ok(completion) => {
                let metrics = completion.summary_results.len();
                let has_rows = completion.row_details_path.is_some();
                match self.store.complete_run(run_id, completion).await {
                    Ok(_) => {
                        METRICS.inc_runs_completed();
                        obs::emit_run_finished(&rid, elapsed_ms, metrics, has_rows);
                        return Some(RunStatus::Completed);
                    }
                    Err(err) if err.is_not_found() => {
                        obs::emit_run_finalize_error(&rid, &err);
                        return None;
                    }
                    Err(err) => EvalError::Storage(err),
                }
            }
            Err(err) => err,
        };

        error!(run_id = %rid, error = %failure, "run failed");
        match self.store.fail_run(run_id, &failure.to_string()).await {
            Ok(_) => {
                METRICS.inc_runs_failed();
                obs::emit_run_failed(&rid, elapsed_ms, &failure);
                Some(RunStatus::Failed)
            }
            Err(err) => {
                obs::emit_run_finalize_error(&rid, &err);
                None
            }
        }
    }
}

fn not_found_or(err: StorageError, not_found: EvalError) -> EvalError {
    if err.is_not_found() {
        not_found
    } else {
        EvalError::Storage(err)
    }
}

/// First metric name claimed by more than one scorer.
fn duplicate_name(scorers: &[ResolvedScorer]) -> Option<&str> {
    let mut seen = HashSet::new();
    scorers
        .iter()
        .map(ResolvedScorer::name)
        .find(|name| !seen.insert(*name))
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

async fn load_dataset(path: PathBuf) -> Result<Dataset> {
    let display = path.display().to_string();
    tokio::task::spawn_blocking(move || Dataset::from_path(Path::new(&path)))
        .await
        .map_err(|e| EvalError::Io(std::io::Error::other(e)))?
        .map_err(|err| match err {
            DatasetError::NotFound(_) => EvalError::DatasetNotFound(display),
            other => EvalError::Dataset(other),
        })
}
