//! Query facade: the synchronous read/write surface downstream callers use.

use std::sync::Arc;

use serde::Serialize;

use crate::aggregation::{AggregationEngine, EngineStats};
use crate::candles::{build_candles, Candle};
use crate::collector::{Collector, CollectorStats};
use crate::config::AggregationConfig;
use crate::error::Result;
use crate::store::{ObservationStore, StoreStats};
use crate::types::{AggregatedPrice, Observation, Pair};
use crate::utils::helper::current_timestamp_ms;

/// Counters and config snapshot returned by [`PriceService::stats`].
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStats {
    pub store: StoreStats,
    pub engine: EngineStats,
    pub collector: Option<CollectorStats>,
    pub config: AggregationConfig,
}

/// One source's most recent contribution to a pair.
#[derive(Debug, Clone, Serialize)]
pub struct SourceBreakdown {
    pub source: String,
    pub price: f64,
    pub age_ms: u64,
    pub weight: f64,
    /// Signed divergence from the current best price, percent. Absent when
    /// no algorithm currently succeeds.
    pub deviation_pct: Option<f64>,
}

pub struct PriceService {
    store: Arc<ObservationStore>,
    engine: AggregationEngine,
    collector: Option<Arc<Collector>>,
}

impl PriceService {
    pub fn new(config: AggregationConfig) -> Self {
        let store = Arc::new(ObservationStore::new(config.clone()));
        let engine = AggregationEngine::new(store.clone(), config);
        PriceService {
            store,
            engine,
            collector: None,
        }
    }

    /// The store handle, for wiring a collector against this service.
    pub fn store(&self) -> Arc<ObservationStore> {
        self.store.clone()
    }

    /// Attach a collector so its counters appear in [`stats`](Self::stats).
    pub fn attach_collector(&mut self, collector: Arc<Collector>) {
        self.collector = Some(collector);
    }

    /// Synchronous insert; retention invariants hold when this returns.
    pub fn record(&self, pair: &Pair, obs: Observation) {
        self.store.insert(pair, obs);
    }

    pub fn vwap(&self, pair: &Pair, window_ms: Option<u64>) -> Result<AggregatedPrice> {
        self.engine.vwap(pair, window_ms)
    }

    pub fn twap(&self, pair: &Pair, window_ms: Option<u64>) -> Result<AggregatedPrice> {
        self.engine.twap(pair, window_ms)
    }

    /// Best available price across all three algorithms.
    pub fn current_price(&self, pair: &Pair) -> Result<AggregatedPrice> {
        self.engine.best_price(pair)
    }

    /// OHLCV candles of `interval_ms` width over the retained window.
    pub fn candles(&self, pair: &Pair, interval_ms: u64, window_ms: Option<u64>) -> Vec<Candle> {
        let window = window_ms.unwrap_or(self.engine.config().max_age_ms);
        let snapshot = self.store.snapshot(pair, window);
        build_candles(pair, &snapshot, interval_ms)
    }

    /// Latest observation per source with its divergence from the current
    /// aggregate, for dashboards and provenance checks.
    pub fn source_breakdown(&self, pair: &Pair) -> Vec<SourceBreakdown> {
        let snapshot = self
            .store
            .snapshot(pair, self.engine.config().max_age_ms);
        let reference = self.current_price(pair).ok().map(|agg| agg.price);
        let now = current_timestamp_ms();

        let mut latest: Vec<&Observation> = Vec::new();
        for obs in &snapshot {
            match latest.iter_mut().find(|o| o.source == obs.source) {
                Some(slot) if slot.timestamp_ms <= obs.timestamp_ms => *slot = obs,
                Some(_) => {}
                None => latest.push(obs),
            }
        }

        latest
            .into_iter()
            .map(|obs| SourceBreakdown {
                source: obs.source.clone(),
                price: obs.price,
                age_ms: now.saturating_sub(obs.timestamp_ms),
                weight: obs.weight,
                deviation_pct: reference.and_then(|r| {
                    (r > 0.0).then(|| (obs.price - r) / r * 100.0)
                }),
            })
            .collect()
    }

    pub fn stats(&self) -> ServiceStats {
        ServiceStats {
            store: self.store.stats(),
            engine: self.engine.stats(),
            collector: self.collector.as_ref().map(|c| c.stats()),
            config: self.engine.config().clone(),
        }
    }

    /// Test-only reset hook.
    pub fn clear(&self, pair: &Pair) {
        self.store.clear(pair);
    }

    /// Test-only reset hook.
    pub fn clear_all(&self) {
        self.store.clear_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::helper::current_timestamp_ms;

    fn pair() -> Pair {
        Pair::new("SOL/USDC")
    }

    #[test]
    fn test_record_then_current_price() {
        let service = PriceService::new(AggregationConfig::default());
        let now = current_timestamp_ms();
        for (i, (price, source)) in [
            (177.50, "okx"),
            (177.45, "binance"),
            (177.55, "coinbase"),
        ]
        .iter()
        .enumerate()
        {
            service.record(
                &pair(),
                Observation::with_volume(*price, 1_000.0, now - 60_000 + i as u64 * 1_000, *source),
            );
        }

        let best = service.current_price(&pair()).unwrap();
        assert!(best.price >= 177.45 && best.price <= 177.55);
        assert!(best.confidence > 0.0 && best.confidence <= 1.0);
        assert_eq!(best.inputs_used, 3);
    }

    #[test]
    fn test_stats_reflect_activity() {
        let service = PriceService::new(AggregationConfig::default());
        let now = current_timestamp_ms();
        service.record(&pair(), Observation::new(100.0, now, "okx"));

        let _ = service.twap(&pair(), None);
        let stats = service.stats();
        assert_eq!(stats.store.observations, 1);
        assert_eq!(stats.engine.calculations, 1);
        assert!(stats.collector.is_none());
        assert_eq!(stats.config.min_data_points, 3);
    }

    #[test]
    fn test_candles_from_history() {
        let service = PriceService::new(AggregationConfig::default());
        let now = current_timestamp_ms();
        service.record(
            &pair(),
            Observation::with_volume(100.0, 10.0, now - 100_000, "okx"),
        );
        service.record(
            &pair(),
            Observation::with_volume(102.0, 5.0, now - 1_000, "okx"),
        );

        let candles = service.candles(&pair(), 60_000, None);
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].close, 100.0);
        assert_eq!(candles[1].close, 102.0);
    }

    #[test]
    fn test_source_breakdown_latest_per_source() {
        let service = PriceService::new(AggregationConfig::default());
        let now = current_timestamp_ms();
        service.record(&pair(), Observation::new(177.40, now - 20_000, "okx"));
        service.record(&pair(), Observation::new(177.50, now - 10_000, "okx"));
        service.record(&pair(), Observation::new(177.60, now - 5_000, "binance"));

        let breakdown = service.source_breakdown(&pair());
        assert_eq!(breakdown.len(), 2);
        let okx = breakdown.iter().find(|b| b.source == "okx").unwrap();
        assert_eq!(okx.price, 177.50);
        assert_eq!(okx.weight, 1.0);
        assert!(okx.age_ms >= 10_000);
    }

    #[test]
    fn test_clear_hooks() {
        let service = PriceService::new(AggregationConfig::default());
        let now = current_timestamp_ms();
        service.record(&pair(), Observation::new(100.0, now, "okx"));
        service.clear(&pair());
        assert_eq!(service.stats().store.observations, 0);
    }
}
