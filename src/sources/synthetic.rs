use std::sync::Mutex;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;

use crate::config::MockSourceConfig;
use crate::error::{Error, Result};
use crate::sources::PriceSource;
use crate::types::{Observation, Pair};
use crate::utils::helper::current_timestamp_ms;

pub const SOURCE_ID: &str = "mock";

/// Deterministic synthetic feed.
///
/// First-class citizen, not a fallback: the whole pipeline can run against
/// it without network access, and a fixed seed reproduces the exact same
/// observation sequence.
pub struct SyntheticSource {
    config: MockSourceConfig,
    rng: Mutex<StdRng>,
}

impl SyntheticSource {
    pub fn new(config: MockSourceConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        SyntheticSource {
            config,
            rng: Mutex::new(rng),
        }
    }
}

#[async_trait]
impl PriceSource for SyntheticSource {
    fn id(&self) -> &str {
        SOURCE_ID
    }

    async fn fetch(&self, pair: &Pair) -> Result<Observation> {
        let base = self
            .config
            .base_prices
            .get(pair.as_str())
            .copied()
            .ok_or_else(|| Error::UnsupportedPair {
                source_name: SOURCE_ID.to_string(),
                pair: pair.to_string(),
            })?;

        let spread = self.config.spread.abs();
        let (price, volume) = {
            let mut rng = self.rng.lock().expect("rng lock poisoned");
            let offset: f64 = rng.gen_range(-spread..=spread);
            let volume_jitter: f64 = rng.gen_range(0.5..=1.5);
            (base * (1.0 + offset), self.config.volume * volume_jitter)
        };

        Ok(
            Observation::with_volume(price, volume, current_timestamp_ms(), SOURCE_ID)
                .with_metadata(json!({
                    "synthetic": true,
                    "basePrice": base,
                })),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config() -> MockSourceConfig {
        MockSourceConfig {
            seed: 7,
            base_prices: HashMap::from([("SOL/USDC".to_string(), 177.5)]),
            spread: 0.001,
            volume: 1_000.0,
        }
    }

    #[tokio::test]
    async fn test_same_seed_same_sequence() {
        let a = SyntheticSource::new(config());
        let b = SyntheticSource::new(config());
        let pair = Pair::new("SOL/USDC");
        for _ in 0..5 {
            let oa = a.fetch(&pair).await.unwrap();
            let ob = b.fetch(&pair).await.unwrap();
            assert_eq!(oa.price, ob.price);
            assert_eq!(oa.volume, ob.volume);
        }
    }

    #[tokio::test]
    async fn test_prices_stay_inside_spread() {
        let source = SyntheticSource::new(config());
        let pair = Pair::new("SOL/USDC");
        for _ in 0..50 {
            let obs = source.fetch(&pair).await.unwrap();
            assert!(obs.price >= 177.5 * 0.999 && obs.price <= 177.5 * 1.001);
            assert!(obs.volume.unwrap() >= 500.0);
        }
    }

    #[tokio::test]
    async fn test_unknown_pair_is_unsupported() {
        let source = SyntheticSource::new(config());
        let err = source.fetch(&Pair::new("ETH/USDC")).await.unwrap_err();
        assert!(matches!(err, Error::UnsupportedPair { .. }));
    }
}
