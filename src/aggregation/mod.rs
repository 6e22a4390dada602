//! Aggregation engine: VWAP, TWAP, source-weighted mean, and the
//! best-price selector, all behind a shared outlier pipeline.

pub mod confidence;
pub mod outliers;
pub mod selector;
pub mod twap;
pub mod vwap;
pub mod weighted;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::config::AggregationConfig;
use crate::error::{Error, Result};
use crate::observability::metrics;
use crate::observability::tracing::trace_aggregation;
use crate::store::ObservationStore;
use crate::types::{AggregatedPrice, Algorithm, Pair};
use crate::utils::helper::current_timestamp_ms;

/// Counter snapshot for the engine.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EngineStats {
    pub calculations: u64,
    pub outliers_detected: u64,
}

pub struct AggregationEngine {
    store: Arc<ObservationStore>,
    config: AggregationConfig,
    calculations: AtomicU64,
    outliers_detected: AtomicU64,
}

impl AggregationEngine {
    pub fn new(store: Arc<ObservationStore>, config: AggregationConfig) -> Self {
        AggregationEngine {
            store,
            config,
            calculations: AtomicU64::new(0),
            outliers_detected: AtomicU64::new(0),
        }
    }

    /// Volume-weighted average price over `window` (defaults to the
    /// configured VWAP look-back).
    pub fn vwap(&self, pair: &Pair, window_ms: Option<u64>) -> Result<AggregatedPrice> {
        self.vwap_at(pair, window_ms, current_timestamp_ms())
    }

    pub(crate) fn vwap_at(
        &self,
        pair: &Pair,
        window_ms: Option<u64>,
        now_ms: u64,
    ) -> Result<AggregatedPrice> {
        let _span = trace_aggregation(pair, Algorithm::Vwap.as_str()).entered();
        let window = window_ms.unwrap_or(self.config.vwap_window_ms);
        let snapshot = self.store.volume_snapshot(pair, window);
        let result = vwap::compute(pair, &snapshot, &self.config, now_ms);
        self.finish(pair, Algorithm::Vwap, result)
    }

    /// Time-weighted average price over `window` (defaults to the
    /// configured TWAP look-back), additionally scaled by source weight.
    pub fn twap(&self, pair: &Pair, window_ms: Option<u64>) -> Result<AggregatedPrice> {
        self.twap_at(pair, window_ms, current_timestamp_ms())
    }

    pub(crate) fn twap_at(
        &self,
        pair: &Pair,
        window_ms: Option<u64>,
        now_ms: u64,
    ) -> Result<AggregatedPrice> {
        let _span = trace_aggregation(pair, Algorithm::Twap.as_str()).entered();
        let window = window_ms.unwrap_or(self.config.twap_window_ms);
        let snapshot = self.store.snapshot(pair, window);
        let result = twap::compute(pair, &snapshot, &self.config, now_ms);
        self.finish(pair, Algorithm::Twap, result)
    }

    /// Source-weighted mean over the most recent observations. The fallback
    /// when VWAP and TWAP both fail.
    pub fn weighted_mean(&self, pair: &Pair) -> Result<AggregatedPrice> {
        self.weighted_mean_at(pair, current_timestamp_ms())
    }

    pub(crate) fn weighted_mean_at(&self, pair: &Pair, now_ms: u64) -> Result<AggregatedPrice> {
        let _span = trace_aggregation(pair, Algorithm::Weighted.as_str()).entered();
        let snapshot = self.store.snapshot(pair, self.config.max_age_ms);
        let result = weighted::compute(pair, &snapshot, &self.config, now_ms);
        self.finish(pair, Algorithm::Weighted, result)
    }

    /// Run all three algorithms and keep the strongest result.
    pub fn best_price(&self, pair: &Pair) -> Result<AggregatedPrice> {
        self.best_price_at(pair, current_timestamp_ms())
    }

    pub(crate) fn best_price_at(&self, pair: &Pair, now_ms: u64) -> Result<AggregatedPrice> {
        selector::select(self, pair, now_ms)
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            calculations: self.calculations.load(Ordering::Relaxed),
            outliers_detected: self.outliers_detected.load(Ordering::Relaxed),
        }
    }

    pub fn config(&self) -> &AggregationConfig {
        &self.config
    }

    fn finish(
        &self,
        pair: &Pair,
        algorithm: Algorithm,
        result: Result<AggregatedPrice>,
    ) -> Result<AggregatedPrice> {
        self.calculations.fetch_add(1, Ordering::Relaxed);
        match &result {
            Ok(agg) => {
                self.outliers_detected
                    .fetch_add(agg.outliers_removed as u64, Ordering::Relaxed);
                metrics::record_aggregation(algorithm.as_str(), "success");
                metrics::record_outliers(pair.as_str(), agg.outliers_removed);
                metrics::record_aggregated_price(
                    pair.as_str(),
                    algorithm.as_str(),
                    agg.price,
                    agg.confidence,
                );
            }
            Err(e) => {
                metrics::record_aggregation(algorithm.as_str(), failure_label(e));
            }
        }
        result
    }
}

fn failure_label(e: &Error) -> &'static str {
    match e {
        Error::InsufficientData { .. } => "insufficient_data",
        Error::NoVolumeData => "no_volume_data",
        Error::AllOutliers { .. } => "all_outliers",
        Error::ZeroWeight => "zero_weight",
        _ => "error",
    }
}

/// Lossless-enough conversion for the inner sums. Inputs are validated
/// finite at insertion, so failure can only mean NaN/inf snuck in.
pub(crate) fn dec(x: f64) -> Decimal {
    Decimal::from_f64(x).unwrap_or_default()
}

/// Distinct sources among a surviving set, first-seen order.
pub(crate) fn distinct_sources(observations: &[crate::types::Observation]) -> Vec<String> {
    let mut seen = Vec::new();
    for obs in observations {
        if !seen.iter().any(|s| s == &obs.source) {
            seen.push(obs.source.clone());
        }
    }
    seen
}
