//! Reductions over per-row metric scores.

use std::collections::BTreeMap;

use crate::domain::Aggregation;

/// Apply one aggregation. `None` for an empty slice.
pub fn aggregate(values: &[f64], aggregation: Aggregation) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let value = match aggregation {
        Aggregation::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
        Aggregation::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        Aggregation::Mean => values.iter().sum::<f64>() / n,
        Aggregation::Median => percentile(values, 50.0),
        // Population variance.
        Aggregation::Variance => {
            let mean = values.iter().sum::<f64>() / n;
            values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n
        }
        Aggregation::P90 => percentile(values, 90.0),
    };
    Some(value)
}

/// Linear-interpolated percentile, `q` in `[0, 100]`.
fn percentile(values: &[f64], q: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let rank = (q / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Aggregate a metric's scores into `<metric>/<aggregation>` keys.
///
/// Rows without a score and non-finite scores are skipped. A metric with no
/// scored rows contributes nothing.
pub fn summarize(
    metric: &str,
    scores: &[Option<f64>],
    aggregations: &[Aggregation],
) -> BTreeMap<String, f64> {
    let values: Vec<f64> = scores
        .iter()
        .flatten()
        .copied()
        .filter(|v| v.is_finite())
        .collect();

    aggregations
        .iter()
        .filter_map(|agg| {
            aggregate(&values, *agg).map(|value| (format!("{metric}/{agg}"), value))
        })
        .collect()
}
