//! Built-in metrics computed in process.
//!
//! Every metric scores the `outputs` column; `exact_match` also needs
//! `ground_truth`.

use crate::dataset::Dataset;
use crate::domain::Aggregation;
use crate::engine::EngineError;

/// Column scored by every built-in.
pub const OUTPUTS_COLUMN: &str = "outputs";
/// Reference column for `exact_match`.
pub const GROUND_TRUTH_COLUMN: &str = "ground_truth";

/// Aggregations reported for every built-in metric.
pub const BUILTIN_AGGREGATIONS: [Aggregation; 3] =
    [Aggregation::Mean, Aggregation::Variance, Aggregation::P90];

/// Words that count as toxic for the lexicon heuristic.
const TOXIC_LEXICON: &[&str] = &[
    "idiot", "stupid", "dumb", "moron", "hate", "kill", "shut", "loser", "ugly", "trash",
    "pathetic", "worthless", "disgusting", "damn", "hell", "crap",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinMetric {
    Toxicity,
    FleschKincaidGradeLevel,
    AriGradeLevel,
    ExactMatch,
    TokenCount,
}

impl BuiltinMetric {
    pub const ALL: [BuiltinMetric; 5] = [
        BuiltinMetric::Toxicity,
        BuiltinMetric::FleschKincaidGradeLevel,
        BuiltinMetric::AriGradeLevel,
        BuiltinMetric::ExactMatch,
        BuiltinMetric::TokenCount,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.name() == name)
    }

    pub fn name(&self) -> &'static str {
        match self {
            BuiltinMetric::Toxicity => "toxicity",
            BuiltinMetric::FleschKincaidGradeLevel => "flesch_kincaid_grade_level",
            BuiltinMetric::AriGradeLevel => "ari_grade_level",
            BuiltinMetric::ExactMatch => "exact_match",
            BuiltinMetric::TokenCount => "token_count",
        }
    }

    /// Score every row of `dataset`. Empty outputs get no score.
    pub fn score(&self, dataset: &Dataset) -> Result<Vec<Option<f64>>, EngineError> {
        let outputs = require_column(dataset, self.name(), OUTPUTS_COLUMN)?;
        let scores = match self {
            BuiltinMetric::Toxicity => outputs.iter().map(|o| toxicity(o)).collect(),
            BuiltinMetric::FleschKincaidGradeLevel => {
                outputs.iter().map(|o| flesch_kincaid_grade(o)).collect()
            }
            BuiltinMetric::AriGradeLevel => outputs.iter().map(|o| ari_grade(o)).collect(),
            BuiltinMetric::TokenCount => outputs
                .iter()
                .map(|o| Some(o.split_whitespace().count() as f64))
                .collect(),
            BuiltinMetric::ExactMatch => {
                let truth = require_column(dataset, self.name(), GROUND_TRUTH_COLUMN)?;
                outputs
                    .iter()
                    .zip(truth)
                    .map(|(o, t)| Some(if o.trim() == t.trim() { 1.0 } else { 0.0 }))
                    .collect()
            }
        };
        Ok(scores)
    }
}

fn require_column<'a>(
    dataset: &'a Dataset,
    metric: &str,
    column: &str,
) -> Result<Vec<&'a str>, EngineError> {
    dataset
        .column(column)
        .ok_or_else(|| EngineError::MissingColumn {
            metric: metric.to_string(),
            column: column.to_string(),
        })
}

fn words(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|w| {
            w.chars()
                .filter(|c| c.is_alphanumeric() || *c == '\'')
                .collect::<String>()
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
        .collect()
}

fn sentence_count(text: &str) -> usize {
    let terminators = text
        .split(|c| matches!(c, '.' | '!' | '?'))
        .filter(|s| !s.trim().is_empty())
        .count();
    terminators.max(1)
}

/// Vowel-group syllable estimate with a silent trailing `e`.
fn syllables(word: &str) -> usize {
    let is_vowel = |c: char| matches!(c, 'a' | 'e' | 'i' | 'o' | 'u' | 'y');
    let mut count = 0;
    let mut prev_vowel = false;
    for c in word.chars() {
        let vowel = is_vowel(c);
        if vowel && !prev_vowel {
            count += 1;
        }
        prev_vowel = vowel;
    }
    if word.ends_with('e') && !word.ends_with("le") && count > 1 {
        count -= 1;
    }
    count.max(1)
}

/// Fraction of tokens found in the toxic lexicon.
fn toxicity(text: &str) -> Option<f64> {
    let tokens = words(text);
    if tokens.is_empty() {
        return None;
    }
    let flagged = tokens
        .iter()
        .filter(|t| TOXIC_LEXICON.contains(&t.as_str()))
        .count();
    Some(flagged as f64 / tokens.len() as f64)
}

fn flesch_kincaid_grade(text: &str) -> Option<f64> {
    let tokens = words(text);
    if tokens.is_empty() {
        return None;
    }
    let n_words = tokens.len() as f64;
    let n_sentences = sentence_count(text) as f64;
    let n_syllables: usize = tokens.iter().map(|w| syllables(w)).sum();
    Some(0.39 * (n_words / n_sentences) + 11.8 * (n_syllables as f64 / n_words) - 15.59)
}

/// Automated Readability Index.
fn ari_grade(text: &str) -> Option<f64> {
    let tokens = words(text);
    if tokens.is_empty() {
        return None;
    }
    let n_words = tokens.len() as f64;
    let n_sentences = sentence_count(text) as f64;
    let n_chars: usize = tokens
        .iter()
        .map(|w| w.chars().filter(|c| c.is_alphanumeric()).count())
        .sum();
    Some(4.71 * (n_chars as f64 / n_words) + 0.5 * (n_words / n_sentences) - 21.43)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(csv: &str) -> Dataset {
        Dataset::from_reader(csv.as_bytes()).unwrap()
    }

    #[test]
    fn names_round_trip() {
        for metric in BuiltinMetric::ALL {
            assert_eq!(BuiltinMetric::from_name(metric.name()), Some(metric));
        }
        assert_eq!(BuiltinMetric::from_name("bleu"), None);
    }

    #[test]
    fn toxicity_is_fraction_of_flagged_tokens() {
        let ds = dataset("inputs,outputs\nq,You are an idiot\nq,Have a nice day\nq,\n");
        let scores = BuiltinMetric::Toxicity.score(&ds).unwrap();
        assert_eq!(scores, vec![Some(0.25), Some(0.0), None]);
    }

    #[test]
    fn exact_match_requires_ground_truth() {
        let ds = dataset("inputs,outputs\nq,a\n");
        let err = BuiltinMetric::ExactMatch.score(&ds).unwrap_err();
        assert!(matches!(err, EngineError::MissingColumn { ref column, .. } if column == "ground_truth"));

        let ds = dataset("inputs,outputs,ground_truth\nq,Paris,Paris\nq,Rome , Rome\nq,Lyon,Paris\n");
        let scores = BuiltinMetric::ExactMatch.score(&ds).unwrap();
        assert_eq!(scores, vec![Some(1.0), Some(1.0), Some(0.0)]);
    }

    #[test]
    fn every_metric_needs_outputs() {
        let ds = dataset("inputs,response\nq,a\n");
        for metric in BuiltinMetric::ALL {
            assert!(matches!(
                metric.score(&ds),
                Err(EngineError::MissingColumn { .. })
            ));
        }
    }

    #[test]
    fn readability_grades_rank_simple_below_complex() {
        let simple = flesch_kincaid_grade("The cat sat. The dog ran.").unwrap();
        let complex = flesch_kincaid_grade(
            "Institutional considerations necessitate comprehensive organizational restructuring.",
        )
        .unwrap();
        assert!(simple < complex);

        let simple_ari = ari_grade("The cat sat. The dog ran.").unwrap();
        let complex_ari = ari_grade(
            "Institutional considerations necessitate comprehensive organizational restructuring.",
        )
        .unwrap();
        assert!(simple_ari < complex_ari);
    }

    #[test]
    fn token_count_counts_whitespace_tokens() {
        let ds = dataset("outputs\none two  three\n");
        let scores = BuiltinMetric::TokenCount.score(&ds).unwrap();
        assert_eq!(scores, vec![Some(3.0)]);
    }

    #[test]
    fn syllable_heuristic() {
        assert_eq!(syllables("cat"), 1);
        assert_eq!(syllables("table"), 2);
        assert_eq!(syllables("make"), 1);
        assert_eq!(syllables("organization"), 5);
    }
}
