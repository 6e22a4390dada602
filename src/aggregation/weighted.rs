//! Source-weighted mean over the most recent observations.
//!
//! The fallback algorithm: cheap, needs no volume and no time spread.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::aggregation::{confidence, dec, distinct_sources, outliers};
use crate::config::AggregationConfig;
use crate::error::{Error, Result};
use crate::types::{AggregatedPrice, Algorithm, AlgorithmDetail, Observation, Pair};

/// Number of most-recent survivors the mean is taken over.
const RECENT_WINDOW: usize = 10;

pub fn compute(
    pair: &Pair,
    snapshot: &[Observation],
    config: &AggregationConfig,
    now_ms: u64,
) -> Result<AggregatedPrice> {
    if snapshot.len() < config.min_data_points {
        return Err(Error::InsufficientData {
            required: config.min_data_points,
            available: snapshot.len(),
        });
    }

    let (survivors, removed) = outliers::filter_outliers(snapshot, config);
    if survivors.is_empty() {
        return Err(Error::AllOutliers { removed });
    }

    let recent: &[Observation] = if survivors.len() > RECENT_WINDOW {
        &survivors[survivors.len() - RECENT_WINDOW..]
    } else {
        &survivors
    };

    let mut numerator = Decimal::ZERO;
    let mut weight_sum = Decimal::ZERO;
    for obs in recent {
        let weight = dec(obs.weight);
        numerator += dec(obs.price) * weight;
        weight_sum += weight;
    }

    if weight_sum <= Decimal::ZERO {
        return Err(Error::ZeroWeight);
    }

    let price = (numerator / weight_sum).to_f64().unwrap_or(0.0);

    Ok(AggregatedPrice {
        pair: pair.clone(),
        price,
        algorithm: Algorithm::Weighted,
        confidence: confidence::score(recent),
        inputs_used: recent.len(),
        outliers_removed: removed,
        sources: distinct_sources(recent),
        timestamp_ms: now_ms,
        detail: AlgorithmDetail::Weighted {
            weight_sum: weight_sum.to_f64().unwrap_or(0.0),
        },
    })
}
