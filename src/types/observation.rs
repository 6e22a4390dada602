use serde::{Deserialize, Serialize};

/// A single price observation produced by one source.
///
/// `weight` is stamped by the store at insertion time from the source weight
/// table; adapters leave it at the neutral default.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Observation {
    /// Last traded (or quoted) price. Non-negative.
    pub price: f64,
    /// Traded volume backing this observation. Observations without volume
    /// do not participate in VWAP.
    pub volume: Option<f64>,
    /// Wall-clock instant the source produced the observation, in epoch
    /// milliseconds. Monotonic ordering is not assumed.
    pub timestamp_ms: u64,
    /// Short symbolic source name ("okx", "binance", "mock", ...).
    pub source: String,
    /// Trust scalar in [0, 1] derived from `source` at insertion.
    pub weight: f64,
    /// Free-form provenance bag (bid, ask, 24h change). Preserved, never
    /// used in math.
    pub metadata: Option<serde_json::Value>,
}

impl Observation {
    pub const DEFAULT_WEIGHT: f64 = 0.5;

    pub fn new(price: f64, timestamp_ms: u64, source: impl Into<String>) -> Self {
        Observation {
            price,
            volume: None,
            timestamp_ms,
            source: source.into(),
            weight: Self::DEFAULT_WEIGHT,
            metadata: None,
        }
    }

    pub fn with_volume(
        price: f64,
        volume: f64,
        timestamp_ms: u64,
        source: impl Into<String>,
    ) -> Self {
        Observation {
            price,
            volume: Some(volume),
            timestamp_ms,
            source: source.into(),
            weight: Self::DEFAULT_WEIGHT,
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}
