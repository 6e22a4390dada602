use thiserror::Error;

use crate::types::Algorithm;

#[derive(Error, Debug)]
pub enum Error {
    // Aggregation Errors
    #[error("insufficient data: need at least {required}, got {available}")]
    InsufficientData {
        required: usize,
        available: usize,
    },

    #[error("no volume data above the configured floor")]
    NoVolumeData,

    #[error("outlier filtering removed all {removed} observations")]
    AllOutliers {
        removed: usize,
    },

    #[error("combined weights sum to zero")]
    ZeroWeight,

    #[error("no aggregation algorithm succeeded: {}", format_failures(.reasons))]
    NoAlgorithmSucceeded {
        reasons: Vec<AlgorithmFailure>,
    },

    // Source Errors
    #[error("network error: {0}")]
    NetworkError(String),

    #[error("rate limited by {source_name}")]
    RateLimited {
        source_name: String,
    },

    #[error("failed to parse source response: {0}")]
    ParseError(String),

    #[error("pair {pair} not supported by {source_name}")]
    UnsupportedPair {
        source_name: String,
        pair: String,
    },

    // Collector Errors
    #[error("collector is already running")]
    AlreadyRunning,

    #[error("collector is not running")]
    NotRunning,

    // System Errors
    #[error("configuration error: {0}")]
    ConfigError(String),

    // IO Errors
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// One algorithm's failure inside the best-price selector.
#[derive(Debug, Clone)]
pub struct AlgorithmFailure {
    pub algorithm: Algorithm,
    pub reason: String,
}

impl std::fmt::Display for AlgorithmFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.algorithm, self.reason)
    }
}

fn format_failures(reasons: &[AlgorithmFailure]) -> String {
    reasons
        .iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    /// Whether a source fetch error is worth retrying within the same tick.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::NetworkError(_) | Error::RateLimited { .. })
    }
}
