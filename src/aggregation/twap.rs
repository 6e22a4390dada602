//! Time-weighted average price, scaled by source trust.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::aggregation::{confidence, dec, distinct_sources, outliers};
use crate::config::AggregationConfig;
use crate::error::{Error, Result};
use crate::stats;
use crate::types::{AggregatedPrice, Algorithm, AlgorithmDetail, Observation, Pair};

/// Compute TWAP over a price snapshot.
///
/// Each observation is weighted by the duration until the next one (the last
/// by the duration until `now_ms`) multiplied by its source weight. Adjacent
/// equal timestamps get zero time weight and contribute nothing.
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

    let (mut survivors, removed) = outliers::filter_outliers(snapshot, config);
    if survivors.is_empty() {
        return Err(Error::AllOutliers { removed });
    }

    // Stable sort: equal timestamps keep insertion order, so the "last"
    // duplicate is the one that picks up the now-tail weight.
    survivors.sort_by_key(|o| o.timestamp_ms);

    // A snapshot with zero time spread has no time dimension to average
    // over, even though the tail interval to `now` may be positive.
    if survivors.first().map(|o| o.timestamp_ms) == survivors.last().map(|o| o.timestamp_ms) {
        return Err(Error::ZeroWeight);
    }

    let mut numerator = Decimal::ZERO;
    let mut total_weight = Decimal::ZERO;
    for (i, obs) in survivors.iter().enumerate() {
        let time_weight_ms = if i + 1 < survivors.len() {
            survivors[i + 1].timestamp_ms.saturating_sub(obs.timestamp_ms)
        } else {
            now_ms.saturating_sub(obs.timestamp_ms)
        };
        let combined = Decimal::from(time_weight_ms) * dec(obs.weight);
        numerator += dec(obs.price) * combined;
        total_weight += combined;
    }

    if total_weight <= Decimal::ZERO {
        return Err(Error::ZeroWeight);
    }

    let price = (numerator / total_weight).to_f64().unwrap_or(0.0);

    let prices: Vec<f64> = survivors.iter().map(|o| o.price).collect();
    let min_price = prices.iter().cloned().fold(f64::INFINITY, f64::min);
    let max_price = prices.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let span_ms = survivors
        .last()
        .map(|last| last.timestamp_ms - survivors[0].timestamp_ms)
        .unwrap_or(0);

    Ok(AggregatedPrice {
        pair: pair.clone(),
        price,
        algorithm: Algorithm::Twap,
        confidence: confidence::score(&survivors),
        inputs_used: survivors.len(),
        outliers_removed: removed,
        sources: distinct_sources(&survivors),
        timestamp_ms: now_ms,
        detail: AlgorithmDetail::Twap {
            span_ms,
            price_stddev: stats::stddev(&prices),
            min_price,
            max_price,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(price: f64, timestamp_ms: u64, source: &str, weight: f64) -> Observation {
        let mut o = Observation::new(price, timestamp_ms, source);
        o.weight = weight;
        o
    }

    fn pair() -> Pair {
        Pair::new("SOL/USDC")
    }

    #[test]
    fn test_basic_twap() {
        let now = 600_000;
        let snapshot = vec![
            obs(177.50, now - 300_000, "okx", 1.0),
            obs(177.60, now - 240_000, "binance", 1.0),
            obs(177.45, now - 180_000, "coinbase", 0.9),
            obs(177.70, now - 120_000, "kraken", 0.5),
            obs(177.55, now - 60_000, "huobi", 0.5),
        ];
        let config = AggregationConfig::default();
        let result = compute(&pair(), &snapshot, &config, now).unwrap();

        assert!(result.price >= 177.45 && result.price <= 177.70);
        assert_eq!(result.inputs_used, 5);
        match result.detail {
            AlgorithmDetail::Twap {
                span_ms,
                price_stddev,
                ..
            } => {
                assert_eq!(span_ms, 240_000);
                assert!(price_stddev > 0.0);
            }
            _ => panic!("wrong detail"),
        }
    }

    #[test]
    fn test_longer_intervals_dominate() {
        // Price 100 prevails for 90% of the window.
        let now = 1_000_000;
        let snapshot = vec![
            obs(100.0, now - 1_000_000, "a", 1.0),
            obs(100.0, now - 550_000, "b", 1.0),
            obs(200.0, now - 100_000, "c", 1.0),
        ];
        let config = AggregationConfig::default();
        let result = compute(&pair(), &snapshot, &config, now).unwrap();
        assert!((result.price - 110.0).abs() < 1e-9);
    }

    #[test]
    fn test_identical_timestamps_are_zero_weight() {
        let snapshot = vec![
            obs(177.50, 5_000, "a", 1.0),
            obs(177.60, 5_000, "b", 1.0),
            obs(177.45, 5_000, "c", 1.0),
            obs(177.70, 5_000, "d", 1.0),
            obs(177.55, 5_000, "e", 1.0),
        ];
        let config = AggregationConfig::default();
        assert!(matches!(
            compute(&pair(), &snapshot, &config, 60_000),
            Err(Error::ZeroWeight)
        ));
    }

    #[test]
    fn test_duplicate_timestamp_contributes_once() {
        let now = 400_000;
        let dup_ts = now - 200_000;
        let base = vec![
            obs(100.0, now - 300_000, "a", 1.0),
            obs(150.0, dup_ts, "b", 1.0),
            obs(120.0, now - 100_000, "c", 1.0),
        ];
        let mut with_dup = base.clone();
        with_dup.insert(2, obs(150.0, dup_ts, "b", 1.0));

        let config = AggregationConfig::default();
        let a = compute(&pair(), &base, &config, now).unwrap();
        let b = compute(&pair(), &with_dup, &config, now).unwrap();
        assert!((a.price - b.price).abs() < 1e-9);
    }

    #[test]
    fn test_invariant_under_constant_weight_multiplier() {
        let now = 500_000;
        let base = vec![
            obs(100.0, now - 300_000, "a", 1.0),
            obs(110.0, now - 200_000, "b", 1.0),
            obs(120.0, now - 100_000, "c", 1.0),
        ];
        let halved: Vec<Observation> = base
            .iter()
            .map(|o| {
                let mut s = o.clone();
                s.weight *= 0.5;
                s
            })
            .collect();
        let config = AggregationConfig::default();
        let a = compute(&pair(), &base, &config, now).unwrap();
        let b = compute(&pair(), &halved, &config, now).unwrap();
        assert!((a.price - b.price).abs() < 1e-9);
    }

    #[test]
    fn test_unsorted_snapshot_sorted_by_timestamp() {
        let now = 500_000;
        let snapshot = vec![
            obs(120.0, now - 100_000, "c", 1.0),
            obs(100.0, now - 300_000, "a", 1.0),
            obs(110.0, now - 200_000, "b", 1.0),
        ];
        let config = AggregationConfig::default();
        let result = compute(&pair(), &snapshot, &config, now).unwrap();
        // 100 for 100s, 110 for 100s, 120 for 100s.
        assert!((result.price - 110.0).abs() < 1e-9);
    }

    #[test]
    fn test_too_few_is_insufficient_data() {
        let config = AggregationConfig::default();
        let snapshot = vec![obs(100.0, 1_000, "a", 1.0)];
        assert!(matches!(
            compute(&pair(), &snapshot, &config, 2_000),
            Err(Error::InsufficientData { .. })
        ));
    }
}
