//! Scorer configuration payloads.
//!
//! A stored scorer carries an opaque JSON `configuration`; these types are
//! its parsed, kind-specific forms.

use serde::{Deserialize, Serialize};

/// Default judge model reference.
pub const DEFAULT_JUDGE_MODEL: &str = "openai:/gpt-4";

/// Default bound on concurrent judge calls per metric.
pub const DEFAULT_MAX_WORKERS: usize = 10;

/// Configuration of a BUILTIN scorer: `{"metric_name": "toxicity"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuiltinConfig {
    pub metric_name: String,
}

/// Reduction applied to a metric's per-row scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    Min,
    Max,
    Mean,
    Median,
    Variance,
    P90,
}

impl Aggregation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Aggregation::Min => "min",
            Aggregation::Max => "max",
            Aggregation::Mean => "mean",
            Aggregation::Median => "median",
            Aggregation::Variance => "variance",
            Aggregation::P90 => "p90",
        }
    }
}

impl std::fmt::Display for Aggregation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A graded few-shot example shown to the judge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeExample {
    pub input: String,
    pub output: String,
    pub score: f64,
    #[serde(default)]
    pub justification: Option<String>,
}

/// Configuration of an LLM_JUDGE scorer. Every field is optional on input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JudgeConfig {
    /// What the metric measures.
    pub definition: String,
    /// Rubric mapping scores to criteria.
    pub grading_prompt: String,
    /// `<provider>:/<model>`
    pub judge_model: String,
    pub examples: Vec<JudgeExample>,
    pub greater_is_better: bool,
    pub aggregations: Vec<Aggregation>,
    pub max_workers: usize,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            definition: String::new(),
            grading_prompt: String::new(),
            judge_model: DEFAULT_JUDGE_MODEL.to_string(),
            examples: Vec::new(),
            greater_is_better: true,
            aggregations: vec![Aggregation::Mean],
            max_workers: DEFAULT_MAX_WORKERS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn judge_config_fills_defaults() {
        let config: JudgeConfig = serde_json::from_value(json!({
            "definition": "Is the answer polite?"
        }))
        .unwrap();
        assert_eq!(config.definition, "Is the answer polite?");
        assert_eq!(config.grading_prompt, "");
        assert_eq!(config.judge_model, "openai:/gpt-4");
        assert!(config.examples.is_empty());
        assert!(config.greater_is_better);
        assert_eq!(config.aggregations, vec![Aggregation::Mean]);
        assert_eq!(config.max_workers, 10);
    }

    #[test]
    fn judge_examples_parse_with_optional_justification() {
        let config: JudgeConfig = serde_json::from_value(json!({
            "examples": [
                {"input": "hi", "output": "hello", "score": 5},
                {"input": "hi", "output": "go away", "score": 1, "justification": "rude"}
            ],
            "aggregations": ["mean", "p90"]
        }))
        .unwrap();
        assert_eq!(config.examples.len(), 2);
        assert_eq!(config.examples[0].score, 5.0);
        assert_eq!(config.examples[1].justification.as_deref(), Some("rude"));
        assert_eq!(
            config.aggregations,
            vec![Aggregation::Mean, Aggregation::P90]
        );
    }

    #[test]
    fn unknown_aggregation_is_rejected() {
        let err = serde_json::from_value::<JudgeConfig>(json!({"aggregations": ["mode"]}));
        assert!(err.is_err());
    }
}
