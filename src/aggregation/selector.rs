//! Best-price selector: run every algorithm, keep the strongest result.

use crate::aggregation::AggregationEngine;
use crate::error::{AlgorithmFailure, Error, Result};
use crate::types::{AggregatedPrice, Algorithm, Pair};

/// Rank successful results by `confidence * ln(1 + inputs_used)`; ties fall
/// to the preference order VWAP > TWAP > weighted mean. When every
/// algorithm fails the caller gets all three reasons back.
pub(crate) fn select(
    engine: &AggregationEngine,
    pair: &Pair,
    now_ms: u64,
) -> Result<AggregatedPrice> {
    if let Some(forced) = engine.config().force_algorithm {
        return run(engine, forced, pair, now_ms);
    }

    let mut failures = Vec::new();
    let mut best: Option<(f64, AggregatedPrice)> = None;

    for algorithm in [Algorithm::Vwap, Algorithm::Twap, Algorithm::Weighted] {
        match run(engine, algorithm, pair, now_ms) {
            Ok(agg) => {
                let score = agg.confidence * (1.0 + agg.inputs_used as f64).ln();
                let better = best.as_ref().map_or(true, |(top, held)| {
                    score > *top
                        || (score == *top
                            && agg.algorithm.preference() < held.algorithm.preference())
                });
                if better {
                    best = Some((score, agg));
                }
            }
            Err(e) => failures.push(AlgorithmFailure {
                algorithm,
                reason: e.to_string(),
            }),
        }
    }

    match best {
        Some((_, agg)) => Ok(agg),
        None => Err(Error::NoAlgorithmSucceeded { reasons: failures }),
    }
}

fn run(
    engine: &AggregationEngine,
    algorithm: Algorithm,
    pair: &Pair,
    now_ms: u64,
) -> Result<AggregatedPrice> {
    match algorithm {
        Algorithm::Vwap => engine.vwap_at(pair, None, now_ms),
        Algorithm::Twap => engine.twap_at(pair, None, now_ms),
        Algorithm::Weighted => engine.weighted_mean_at(pair, now_ms),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::AggregationConfig;
    use crate::store::ObservationStore;
    use crate::types::Observation;
    use crate::utils::helper::current_timestamp_ms;

    fn engine_with(config: AggregationConfig) -> AggregationEngine {
        let store = Arc::new(ObservationStore::new(config.clone()));
        AggregationEngine::new(store, config)
    }

    fn engine() -> AggregationEngine {
        engine_with(AggregationConfig::default())
    }

    fn seed_store(engine: &AggregationEngine, with_volume: bool) {
        let now = current_timestamp_ms();
        let pair = Pair::new("SOL/USDC");
        let prices = [177.50, 177.45, 177.55, 177.48, 177.52];
        let sources = ["okx", "binance", "coinbase", "kraken", "huobi"];
        for (i, (price, source)) in prices.iter().zip(sources).enumerate() {
            let ts = now - 240_000 + i as u64 * 60_000;
            let obs = if with_volume {
                Observation::with_volume(*price, 1_000.0, ts, source)
            } else {
                Observation::new(*price, ts, source)
            };
            engine.store.insert(&pair, obs);
        }
    }

    #[test]
    fn test_equal_scores_prefer_vwap() {
        let engine = engine();
        seed_store(&engine, true);
        let result = engine.best_price(&Pair::new("SOL/USDC")).unwrap();
        assert_eq!(result.algorithm, Algorithm::Vwap);
    }

    #[test]
    fn test_falls_back_when_volume_missing() {
        let engine = engine();
        seed_store(&engine, false);
        let result = engine.best_price(&Pair::new("SOL/USDC")).unwrap();
        assert_eq!(result.algorithm, Algorithm::Twap);
    }

    #[test]
    fn test_empty_store_reports_all_reasons() {
        let engine = engine();
        match engine.best_price(&Pair::new("SOL/USDC")) {
            Err(Error::NoAlgorithmSucceeded { reasons }) => {
                assert_eq!(reasons.len(), 3);
                let algos: Vec<Algorithm> = reasons.iter().map(|r| r.algorithm).collect();
                assert!(algos.contains(&Algorithm::Vwap));
                assert!(algos.contains(&Algorithm::Twap));
                assert!(algos.contains(&Algorithm::Weighted));
            }
            other => panic!("expected NoAlgorithmSucceeded, got {:?}", other),
        }
    }

    #[test]
    fn test_forced_algorithm_wins() {
        let config = AggregationConfig {
            force_algorithm: Some(Algorithm::Weighted),
            ..AggregationConfig::default()
        };
        let engine = engine_with(config);
        seed_store(&engine, true);
        let result = engine.best_price(&Pair::new("SOL/USDC")).unwrap();
        assert_eq!(result.algorithm, Algorithm::Weighted);
    }

    #[test]
    fn test_forced_algorithm_surfaces_its_own_failure() {
        let config = AggregationConfig {
            force_algorithm: Some(Algorithm::Vwap),
            ..AggregationConfig::default()
        };
        let engine = engine_with(config);
        seed_store(&engine, false); // no volume anywhere
        assert!(matches!(
            engine.best_price(&Pair::new("SOL/USDC")),
            Err(Error::NoVolumeData)
        ));
    }
}
