//! In-process evaluation engine.
//!
//! Each engine run owns a directory under the artifact root. Evaluation
//! writes the row table there as a JSON array:
//!
//! ```text
//! <artifact_root>/<engine_run_id>/eval_results_table.json
//! ```

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Number, Value};
use tempfile::NamedTempFile;
use tracing::{debug, info};
use uuid::Uuid;

use super::aggregate::summarize;
use super::builtin::{BuiltinMetric, BUILTIN_AGGREGATIONS, OUTPUTS_COLUMN};
use super::judge::{grade_rows, JudgeClient};
use super::{EngineError, EvaluationEngine, EvaluationOutput, EVAL_RESULTS_TABLE};
use crate::dataset::Dataset;
use crate::resolver::ResolvedScorer;

/// Column holding the prompt shown to judges.
pub const INPUTS_COLUMN: &str = "inputs";

const TABLE_FILE: &str = "eval_results_table.json";

/// Evaluation engine that scores rows in process and keeps artifacts on disk.
pub struct LocalEngine {
    artifact_root: PathBuf,
    judge: Arc<dyn JudgeClient>,
}

impl LocalEngine {
    pub fn new(artifact_root: impl Into<PathBuf>, judge: Arc<dyn JudgeClient>) -> Self {
        Self {
            artifact_root: artifact_root.into(),
            judge,
        }
    }

    pub fn artifact_root(&self) -> &Path {
        &self.artifact_root
    }

    fn run_dir(&self, engine_run_id: &str) -> Result<PathBuf, EngineError> {
        let dir = self.artifact_root.join(engine_run_id);
        if !is_plain_relative(Path::new(engine_run_id)) || !dir.is_dir() {
            return Err(EngineError::UnknownRun(engine_run_id.to_string()));
        }
        Ok(dir)
    }
}

/// True if `path` stays inside whatever directory it is joined to.
fn is_plain_relative(path: &Path) -> bool {
    path.components().all(|c| matches!(c, Component::Normal(_)))
}

fn score_value(score: Option<f64>) -> Value {
    score
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// Write `rows` to `path` via a temp file in the same directory.
fn write_table(dir: &Path, path: &Path, rows: &[Map<String, Value>]) -> Result<(), EngineError> {
    let body = serde_json::to_vec(rows)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(&body)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[async_trait]
impl EvaluationEngine for LocalEngine {
    async fn start_run(&self) -> Result<String, EngineError> {
        let engine_run_id = Uuid::new_v4().simple().to_string();
        tokio::fs::create_dir_all(self.artifact_root.join(&engine_run_id)).await?;
        debug!(%engine_run_id, "engine run started");
        Ok(engine_run_id)
    }

    async fn evaluate(
        &self,
        engine_run_id: &str,
        dataset: &Dataset,
        scorers: &[ResolvedScorer],
    ) -> Result<EvaluationOutput, EngineError> {
        let dir = self.run_dir(engine_run_id)?;

        // Reject unknown built-ins before any judge traffic.
        for scorer in scorers {
            if let ResolvedScorer::Builtin { metric_name } = scorer {
                if BuiltinMetric::from_name(metric_name).is_none() {
                    return Err(EngineError::UnknownMetric(metric_name.clone()));
                }
            }
        }

        let mut rows: Vec<Map<String, Value>> =
            (0..dataset.len()).map(|i| dataset.row_object(i)).collect();
        let mut metrics = BTreeMap::new();

        for scorer in scorers {
            let name = scorer.name();
            match scorer {
                ResolvedScorer::Builtin { metric_name } => {
                    let metric = BuiltinMetric::from_name(metric_name)
                        .ok_or_else(|| EngineError::UnknownMetric(metric_name.clone()))?;
                    let scores = metric.score(dataset)?;
                    metrics.extend(summarize(name, &scores, &BUILTIN_AGGREGATIONS));
                    for (row, score) in rows.iter_mut().zip(&scores) {
                        row.insert(format!("{name}/score"), score_value(*score));
                    }
                }
                ResolvedScorer::Judge(metric) => {
                    let outputs = dataset.column(OUTPUTS_COLUMN).ok_or_else(|| {
                        EngineError::MissingColumn {
                            metric: name.to_string(),
                            column: OUTPUTS_COLUMN.to_string(),
                        }
                    })?;
                    let inputs = dataset
                        .column(INPUTS_COLUMN)
                        .unwrap_or_else(|| vec![""; outputs.len()]);

                    let graded = grade_rows(self.judge.as_ref(), metric, &inputs, &outputs).await;
                    metrics.extend(summarize(
                        name,
                        &graded.scores,
                        &metric.config.aggregations,
                    ));
                    for ((row, score), justification) in rows
                        .iter_mut()
                        .zip(&graded.scores)
                        .zip(graded.justifications)
                    {
                        row.insert(format!("{name}/score"), score_value(*score));
                        row.insert(
                            format!("{name}/justification"),
                            Value::String(justification),
                        );
                    }
                }
            }
        }

        let table_path = dir.join(TABLE_FILE);
        write_table(&dir, &table_path, &rows)?;
        info!(
            %engine_run_id,
            rows = rows.len(),
            metrics = metrics.len(),
            "evaluation finished"
        );

        let mut tables = BTreeMap::new();
        tables.insert(EVAL_RESULTS_TABLE.to_string(), TABLE_FILE.to_string());
        Ok(EvaluationOutput { metrics, tables })
    }

    async fn download_artifact(
        &self,
        engine_run_id: &str,
        artifact_path: &str,
    ) -> Result<PathBuf, EngineError> {
        let dir = self.run_dir(engine_run_id)?;
        let relative = Path::new(artifact_path);
        let path = dir.join(relative);
        if !is_plain_relative(relative) || !path.is_file() {
            return Err(EngineError::ArtifactNotFound {
                run_id: engine_run_id.to_string(),
                artifact: artifact_path.to_string(),
            });
        }
        Ok(path)
    }
}
