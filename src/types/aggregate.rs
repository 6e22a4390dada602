use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::Pair;

/// Aggregation algorithm identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    Vwap,
    Twap,
    Weighted,
}

impl Algorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Vwap => "vwap",
            Algorithm::Twap => "twap",
            Algorithm::Weighted => "weighted",
        }
    }

    /// Tie-break preference order for the best-price selector.
    pub fn preference(&self) -> u8 {
        match self {
            Algorithm::Vwap => 0,
            Algorithm::Twap => 1,
            Algorithm::Weighted => 2,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The result of one aggregation run. Computed on demand, never stored.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AggregatedPrice {
    pub pair: Pair,
    pub price: f64,
    pub algorithm: Algorithm,
    /// Scalar in [0, 1] summarizing data quantity, source diversity,
    /// consistency and trust.
    pub confidence: f64,
    /// Observations that survived outlier filtering and fed the value.
    pub inputs_used: usize,
    /// Observations removed by the z-score / IQR pipeline.
    pub outliers_removed: usize,
    /// Distinct sources among the surviving observations.
    pub sources: Vec<String>,
    /// When the aggregation ran, epoch milliseconds.
    pub timestamp_ms: u64,
    pub detail: AlgorithmDetail,
}

/// Algorithm-specific metadata attached to an aggregation result.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum AlgorithmDetail {
    Vwap {
        total_volume: f64,
        mean_volume: f64,
        min_price: f64,
        max_price: f64,
    },
    Twap {
        /// Width of the surviving window, first to last timestamp.
        span_ms: u64,
        price_stddev: f64,
        min_price: f64,
        max_price: f64,
    },
    Weighted {
        weight_sum: f64,
    },
}
