//! Volume-weighted average price.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::aggregation::{confidence, dec, distinct_sources, outliers};
use crate::config::AggregationConfig;
use crate::error::{Error, Result};
use crate::types::{AggregatedPrice, Algorithm, AlgorithmDetail, Observation, Pair};

/// Compute VWAP over a volume snapshot.
///
/// The running numerator Σ(price·volume) mixes magnitudes badly enough that
/// a single dominant observation loses the small ones in f64; both sums are
/// kept in `Decimal` and converted only at the boundary.
pub fn compute(
    pair: &Pair,
    snapshot: &[Observation],
    config: &AggregationConfig,
    now_ms: u64,
) -> Result<AggregatedPrice> {
    if snapshot.is_empty() {
        return Err(Error::NoVolumeData);
    }
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

    let mut numerator = Decimal::ZERO;
    let mut total_volume = Decimal::ZERO;
    for obs in &survivors {
        // The store only admits volume-bearing observations into this ring.
        let volume = dec(obs.volume.unwrap_or(0.0));
        numerator += dec(obs.price) * volume;
        total_volume += volume;
    }

    if total_volume <= Decimal::ZERO {
        return Err(Error::NoVolumeData);
    }

    let price = (numerator / total_volume).to_f64().unwrap_or(0.0);
    let total_volume_f = total_volume.to_f64().unwrap_or(0.0);

    let min_price = survivors.iter().map(|o| o.price).fold(f64::INFINITY, f64::min);
    let max_price = survivors
        .iter()
        .map(|o| o.price)
        .fold(f64::NEG_INFINITY, f64::max);

    Ok(AggregatedPrice {
        pair: pair.clone(),
        price,
        algorithm: Algorithm::Vwap,
        confidence: confidence::score(&survivors),
        inputs_used: survivors.len(),
        outliers_removed: removed,
        sources: distinct_sources(&survivors),
        timestamp_ms: now_ms,
        detail: AlgorithmDetail::Vwap {
            total_volume: total_volume_f,
            mean_volume: total_volume_f / survivors.len() as f64,
            min_price,
            max_price,
        },
    })
}
