//! Scorer resolution: stored definition to executable scoring unit.

use serde_json::Value;
use simpl_state::{ScorerRecord, ScorerType};

use crate::domain::{BuiltinConfig, JudgeConfig};

/// Errors produced while resolving a scorer definition.
#[derive(Debug, thiserror::Error)]
pub enum ScorerError {
    #[error("invalid configuration for scorer {scorer}: {reason}")]
    InvalidConfiguration { scorer: String, reason: String },

    #[error("Code-based scorers are not yet implemented")]
    Unsupported { kind: ScorerType },

    #[error("Unknown scorer type: {kind}")]
    UnknownType { kind: String },
}

/// A judge-backed metric built from an LLM_JUDGE definition.
#[derive(Debug, Clone, PartialEq)]
pub struct JudgeMetric {
    /// Scorer display name, used as the metric name.
    pub name: String,
    pub config: JudgeConfig,
}

/// A scoring unit the evaluation engine can run.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedScorer {
    /// Name of an engine built-in metric. Not checked against the registry here.
    Builtin { metric_name: String },
    Judge(JudgeMetric),
}

impl ResolvedScorer {
    /// Metric name used for result columns and aggregate keys.
    pub fn name(&self) -> &str {
        match self {
            ResolvedScorer::Builtin { metric_name } => metric_name,
            ResolvedScorer::Judge(metric) => &metric.name,
        }
    }
}

/// Resolve a stored scorer definition.
pub fn resolve(scorer: &ScorerRecord) -> Result<ResolvedScorer, ScorerError> {
    match &scorer.scorer_type {
        ScorerType::Builtin => {
            let config: BuiltinConfig = parse_config(scorer, scorer.configuration.clone())?;
            Ok(ResolvedScorer::Builtin {
                metric_name: config.metric_name,
            })
        }
        ScorerType::LlmJudge => {
            // An absent configuration means "all defaults".
            let raw = match &scorer.configuration {
                Value::Null => Value::Object(Default::default()),
                other => other.clone(),
            };
            let config: JudgeConfig = parse_config(scorer, raw)?;
            if config.max_workers == 0 {
                return Err(ScorerError::InvalidConfiguration {
                    scorer: scorer.name.clone(),
                    reason: "max_workers must be at least 1".to_string(),
                });
            }
            Ok(ResolvedScorer::Judge(JudgeMetric {
                name: scorer.name.clone(),
                config,
            }))
        }
        ScorerType::Code => Err(ScorerError::Unsupported {
            kind: ScorerType::Code,
        }),
        ScorerType::Unknown(kind) => Err(ScorerError::UnknownType { kind: kind.clone() }),
    }
}

fn parse_config<T: serde::de::DeserializeOwned>(
    scorer: &ScorerRecord,
    raw: Value,
) -> Result<T, ScorerError> {
    serde_json::from_value(raw).map_err(|e| ScorerError::InvalidConfiguration {
        scorer: scorer.name.clone(),
        reason: e.to_string(),
    })
}
