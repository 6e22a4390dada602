use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub mod loader;

pub use loader::AppConfig;

use crate::error::{Error, Result};
use crate::types::Algorithm;

/// Built-in source trust table. Part of the public contract: configuration
/// may override entries but the defaults themselves never change silently.
pub const DEFAULT_SOURCE_WEIGHTS: &[(&str, f64)] = &[
    ("okx", 1.0),
    ("binance", 1.0),
    ("coinbase", 0.9),
    ("raydium", 0.8),
    ("orca", 0.8),
];

/// Weight assigned to sources absent from the table and from overrides.
pub const FALLBACK_SOURCE_WEIGHT: f64 = 0.5;

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct SourceWeights {
    /// Overrides on top of [`DEFAULT_SOURCE_WEIGHTS`].
    #[serde(default)]
    pub overrides: HashMap<String, f64>,
}

impl SourceWeights {
    pub fn weight_for(&self, source: &str) -> f64 {
        if let Some(w) = self.overrides.get(source) {
            return *w;
        }
        DEFAULT_SOURCE_WEIGHTS
            .iter()
            .find(|(name, _)| *name == source)
            .map(|(_, w)| *w)
            .unwrap_or(FALLBACK_SOURCE_WEIGHT)
    }

    fn validate(&self) -> Result<()> {
        for (source, w) in &self.overrides {
            if !(0.0..=1.0).contains(w) {
                return Err(Error::ConfigError(format!(
                    "source weight for {} must be in [0, 1], got {}",
                    source, w
                )));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// Z-score cutoff; higher tolerates more spread.
    pub z_score_threshold: f64,
    /// IQR fence multiplier; higher tolerates more spread.
    pub iqr_multiplier: f64,
    /// Minimum inputs to attempt any aggregation.
    pub min_data_points: usize,
    /// Observations older than this are purged on insert.
    pub max_age_ms: u64,
    /// Default VWAP look-back.
    pub vwap_window_ms: u64,
    /// Default TWAP look-back.
    pub twap_window_ms: u64,
    /// Volume floor for the VWAP ring.
    pub min_volume: f64,
    /// Per-pair retention cap, oldest dropped first.
    pub max_history_size: usize,
    pub source_weights: SourceWeights,
    /// Pin the best-price selector to one algorithm instead of the
    /// confidence ranking.
    pub force_algorithm: Option<Algorithm>,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        AggregationConfig {
            z_score_threshold: 2.5,
            iqr_multiplier: 1.5,
            min_data_points: 3,
            max_age_ms: 300_000,
            vwap_window_ms: 3_600_000,
            twap_window_ms: 3_600_000,
            min_volume: 0.01,
            max_history_size: 1000,
            source_weights: SourceWeights::default(),
            force_algorithm: None,
        }
    }
}

impl AggregationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.z_score_threshold <= 0.0 {
            return Err(Error::ConfigError(
                "z_score_threshold must be positive".to_string(),
            ));
        }
        if self.iqr_multiplier <= 0.0 {
            return Err(Error::ConfigError(
                "iqr_multiplier must be positive".to_string(),
            ));
        }
        if self.min_data_points == 0 {
            return Err(Error::ConfigError(
                "min_data_points must be at least 1".to_string(),
            ));
        }
        if self.max_age_ms == 0 {
            return Err(Error::ConfigError("max_age_ms must be positive".to_string()));
        }
        if self.min_volume < 0.0 {
            return Err(Error::ConfigError(
                "min_volume must be non-negative".to_string(),
            ));
        }
        if self.max_history_size == 0 {
            return Err(Error::ConfigError(
                "max_history_size must be at least 1".to_string(),
            ));
        }
        self.source_weights.validate()
    }
}

/// Per-source enable flags.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct SourceToggles {
    pub okx: bool,
    pub binance: bool,
    pub coinbase: bool,
    pub kraken: bool,
    pub coingecko: bool,
    pub mock: bool,
}

impl Default for SourceToggles {
    fn default() -> Self {
        SourceToggles {
            okx: true,
            binance: true,
            coinbase: true,
            kraken: true,
            coingecko: true,
            mock: false,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Tick cadence; a long tick delays the next one, ticks never overlap.
    pub collect_interval_ms: u64,
    /// Budget for a single HTTP request.
    pub request_timeout_ms: u64,
    /// Retries per request within one tick; backoff is 2^attempt seconds.
    pub retry_attempts: u32,
    /// Cap on in-flight requests across the whole tick fan-out.
    pub max_concurrent_requests: usize,
    pub sources: SourceToggles,
    /// Pairs the scheduler drives.
    pub pairs: Vec<String>,
    /// Canonical pair -> per-source symbol, e.g.
    /// "SOL/USDC" -> { "okx": "SOL-USDC", "binance": "SOLUSDC" }.
    pub token_mappings: HashMap<String, HashMap<String, String>>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        CollectorConfig {
            collect_interval_ms: 30_000,
            request_timeout_ms: 10_000,
            retry_attempts: 3,
            max_concurrent_requests: 64,
            sources: SourceToggles::default(),
            pairs: Vec::new(),
            token_mappings: HashMap::new(),
        }
    }
}

impl CollectorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.collect_interval_ms == 0 {
            return Err(Error::ConfigError(
                "collect_interval_ms must be positive".to_string(),
            ));
        }
        if self.request_timeout_ms == 0 {
            return Err(Error::ConfigError(
                "request_timeout_ms must be positive".to_string(),
            ));
        }
        if self.max_concurrent_requests == 0 {
            return Err(Error::ConfigError(
                "max_concurrent_requests must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Source-specific symbol for a canonical pair, if configured.
    pub fn symbol_for(&self, pair: &str, source: &str) -> Option<&str> {
        self.token_mappings
            .get(pair)
            .and_then(|by_source| by_source.get(source))
            .map(|s| s.as_str())
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct PublisherConfig {
    /// Cadence of pushed aggregated prices.
    pub publish_interval_ms: u64,
    /// Maximum fraction the published price may move between rounds before
    /// the publication is suppressed.
    pub max_price_movement: f64,
    /// Broadcast channel capacity; slow subscribers lag past this.
    pub buffer_size: usize,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        PublisherConfig {
            publish_interval_ms: 30_000,
            max_price_movement: 0.10,
            buffer_size: 64,
        }
    }
}

impl PublisherConfig {
    pub fn validate(&self) -> Result<()> {
        if self.publish_interval_ms == 0 {
            return Err(Error::ConfigError(
                "publish_interval_ms must be positive".to_string(),
            ));
        }
        if self.max_price_movement <= 0.0 {
            return Err(Error::ConfigError(
                "max_price_movement must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Synthetic source settings. The mock feed is a first-class citizen so the
/// whole pipeline can run deterministically without network access.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct MockSourceConfig {
    /// Seed for the deterministic walk.
    pub seed: u64,
    /// Base price per canonical pair.
    pub base_prices: HashMap<String, f64>,
    /// Half-width of the walk around the base price, as a fraction.
    pub spread: f64,
    /// Synthetic volume attached to every observation.
    pub volume: f64,
}

impl Default for MockSourceConfig {
    fn default() -> Self {
        MockSourceConfig {
            seed: 42,
            base_prices: HashMap::new(),
            spread: 0.001,
            volume: 1_000.0,
        }
    }
}
