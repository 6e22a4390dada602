//! Confidence scoring over a surviving observation set.

use std::collections::HashSet;

use crate::stats;
use crate::types::Observation;

/// Scalar in [0, 1] combining data quantity, source diversity, price
/// consistency and source trust:
///
/// ```text
/// 0.30 * min(n / 10, 1)
/// + 0.30 * min(sources / 3, 1)
/// + 0.30 * max(0, 1 - stddev / mean)
/// + 0.10 * mean source weight
/// ```
pub fn score(survivors: &[Observation]) -> f64 {
    if survivors.is_empty() {
        return 0.0;
    }

    let prices: Vec<f64> = survivors.iter().map(|o| o.price).collect();
    let weights: Vec<f64> = survivors.iter().map(|o| o.weight).collect();
    let sources: HashSet<&str> = survivors.iter().map(|o| o.source.as_str()).collect();

    let data_factor = (survivors.len() as f64 / 10.0).min(1.0);
    let diversity_factor = (sources.len() as f64 / 3.0).min(1.0);

    let price_mean = stats::mean(&prices);
    let consistency_factor = if price_mean > 0.0 {
        (1.0 - stats::stddev(&prices) / price_mean).max(0.0)
    } else {
        0.0
    };

    let trust_factor = stats::mean(&weights);

    let score = 0.30 * data_factor
        + 0.30 * diversity_factor
        + 0.30 * consistency_factor
        + 0.10 * trust_factor;
    score.clamp(0.0, 1.0)
}
