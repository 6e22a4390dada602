//! OHLCV candles derived from the retained observation history.
//!
//! Candles are built on demand from a snapshot; nothing here is stateful.
//! Bucket boundaries are aligned to the epoch (`ts - ts % interval`).

use serde::{Deserialize, Serialize};

use crate::types::{Observation, Pair};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Candle {
    pub pair: Pair,
    /// Aligned bucket start, epoch milliseconds.
    pub open_time_ms: u64,
    /// Timestamp of the last observation folded in.
    pub close_time_ms: u64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Sum of the volumes that carried one.
    pub volume: f64,
    pub trades: usize,
    /// Distinct sources folded into this candle.
    pub sources: Vec<String>,
}

impl Candle {
    fn seed(pair: &Pair, open_time_ms: u64, obs: &Observation) -> Self {
        Candle {
            pair: pair.clone(),
            open_time_ms,
            close_time_ms: obs.timestamp_ms,
            open: obs.price,
            high: obs.price,
            low: obs.price,
            close: obs.price,
            volume: obs.volume.unwrap_or(0.0),
            trades: 1,
            sources: vec![obs.source.clone()],
        }
    }

    fn fold(&mut self, obs: &Observation) {
        self.high = self.high.max(obs.price);
        self.low = self.low.min(obs.price);
        self.close = obs.price;
        self.close_time_ms = obs.timestamp_ms;
        self.volume += obs.volume.unwrap_or(0.0);
        self.trades += 1;
        if !self.sources.iter().any(|s| s == &obs.source) {
            self.sources.push(obs.source.clone());
        }
    }
}

/// Build candles of `interval_ms` width from a snapshot, oldest first.
///
/// Buckets with no observations produce no candle (no gap filling).
pub fn build_candles(pair: &Pair, observations: &[Observation], interval_ms: u64) -> Vec<Candle> {
    debug_assert!(interval_ms > 0, "candle interval must be positive");
    if observations.is_empty() || interval_ms == 0 {
        return Vec::new();
    }

    let mut sorted: Vec<&Observation> = observations.iter().collect();
    sorted.sort_by_key(|o| o.timestamp_ms);

    let mut candles: Vec<Candle> = Vec::new();
    for obs in sorted {
        let bucket = obs.timestamp_ms - obs.timestamp_ms % interval_ms;
        match candles.last_mut() {
            Some(current) if current.open_time_ms == bucket => current.fold(obs),
            _ => candles.push(Candle::seed(pair, bucket, obs)),
        }
    }
    candles
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(price: f64, volume: f64, timestamp_ms: u64, source: &str) -> Observation {
        Observation::with_volume(price, volume, timestamp_ms, source)
    }

    fn pair() -> Pair {
        Pair::new("SOL/USDC")
    }

    #[test]
    fn test_single_bucket_ohlcv() {
        let observations = vec![
            obs(100.0, 10.0, 60_000, "okx"),
            obs(105.0, 5.0, 70_000, "binance"),
            obs(98.0, 2.0, 80_000, "okx"),
            obs(101.0, 3.0, 110_000, "kraken"),
        ];
        let candles = build_candles(&pair(), &observations, 60_000);
        assert_eq!(candles.len(), 1);
        let c = &candles[0];
        assert_eq!(c.open_time_ms, 60_000);
        assert_eq!(c.open, 100.0);
        assert_eq!(c.high, 105.0);
        assert_eq!(c.low, 98.0);
        assert_eq!(c.close, 101.0);
        assert_eq!(c.volume, 20.0);
        assert_eq!(c.trades, 4);
        assert_eq!(c.sources.len(), 3);
    }

    #[test]
    fn test_buckets_split_on_alignment() {
        let observations = vec![
            obs(100.0, 1.0, 59_999, "okx"),
            obs(200.0, 1.0, 60_000, "okx"),
            obs(300.0, 1.0, 185_000, "okx"),
        ];
        let candles = build_candles(&pair(), &observations, 60_000);
        assert_eq!(candles.len(), 3);
        assert_eq!(candles[0].open_time_ms, 0);
        assert_eq!(candles[1].open_time_ms, 60_000);
        assert_eq!(candles[2].open_time_ms, 180_000);
    }

    #[test]
    fn test_unsorted_input_handled() {
        let observations = vec![
            obs(300.0, 1.0, 185_000, "okx"),
            obs(100.0, 1.0, 10_000, "okx"),
            obs(150.0, 1.0, 20_000, "okx"),
        ];
        let candles = build_candles(&pair(), &observations, 60_000);
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].open, 100.0);
        assert_eq!(candles[0].close, 150.0);
        assert_eq!(candles[1].open, 300.0);
    }

    #[test]
    fn test_empty_input() {
        assert!(build_candles(&pair(), &[], 60_000).is_empty());
    }

    #[test]
    fn test_volumeless_observations_count_trades_only() {
        let observations = vec![
            Observation::new(100.0, 10_000, "okx"),
            Observation::new(101.0, 20_000, "okx"),
        ];
        let candles = build_candles(&pair(), &observations, 60_000);
        assert_eq!(candles[0].volume, 0.0);
        assert_eq!(candles[0].trades, 2);
    }
}
