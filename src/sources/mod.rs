//! Source adapters: one capability, many feeds.
//!
//! Adapters map the canonical pair to their own symbol, fetch, and parse
//! into a canonical [`Observation`]. They never retry; the collector owns
//! retry and timeout policy.

pub mod binance;
pub mod coinbase;
pub mod coingecko;
pub mod kraken;
pub mod okx;
pub mod synthetic;

pub use binance::BinanceSource;
pub use coinbase::CoinbaseSource;
pub use coingecko::CoingeckoSource;
pub use kraken::KrakenSource;
pub use okx::OkxSource;
pub use synthetic::SyntheticSource;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::{CollectorConfig, MockSourceConfig};
use crate::error::{Error, Result};
use crate::types::{Observation, Pair};

#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Short symbolic source name, also the weight-table key.
    fn id(&self) -> &str;

    /// Fetch one observation for `pair`. Fails with `NetworkError`,
    /// `RateLimited`, `ParseError` or `UnsupportedPair`; no internal retry.
    async fn fetch(&self, pair: &Pair) -> Result<Observation>;
}

/// Instantiate every enabled adapter from configuration.
pub fn build_sources(
    collector: &CollectorConfig,
    mock: &MockSourceConfig,
) -> Result<Vec<Arc<dyn PriceSource>>> {
    let timeout = Duration::from_millis(collector.request_timeout_ms);
    let mut sources: Vec<Arc<dyn PriceSource>> = Vec::new();

    if collector.sources.okx {
        sources.push(Arc::new(OkxSource::new(
            symbol_map(collector, okx::SOURCE_ID),
            timeout,
        )?));
    }
    if collector.sources.binance {
        sources.push(Arc::new(BinanceSource::new(
            symbol_map(collector, binance::SOURCE_ID),
            timeout,
        )?));
    }
    if collector.sources.coinbase {
        sources.push(Arc::new(CoinbaseSource::new(
            symbol_map(collector, coinbase::SOURCE_ID),
            timeout,
        )?));
    }
    if collector.sources.kraken {
        sources.push(Arc::new(KrakenSource::new(
            symbol_map(collector, kraken::SOURCE_ID),
            timeout,
        )?));
    }
    if collector.sources.coingecko {
        sources.push(Arc::new(CoingeckoSource::new(
            symbol_map(collector, coingecko::SOURCE_ID),
            timeout,
        )?));
    }
    if collector.sources.mock {
        sources.push(Arc::new(SyntheticSource::new(mock.clone())));
    }

    Ok(sources)
}

fn symbol_map(collector: &CollectorConfig, source: &str) -> HashMap<String, String> {
    collector
        .token_mappings
        .keys()
        .filter_map(|pair| {
            collector
                .symbol_for(pair, source)
                .map(|symbol| (pair.clone(), symbol.to_string()))
        })
        .collect()
}

pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| Error::ConfigError(format!("failed to create HTTP client: {}", e)))
}

/// Map an HTTP response status to the adapter error kinds.
pub(crate) fn status_error(source: &str, status: reqwest::StatusCode) -> Error {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        Error::RateLimited {
            source_name: source.to_string(),
        }
    } else {
        Error::NetworkError(format!("{} returned {}", source, status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceToggles;

    #[test]
    fn test_build_sources_honors_toggles() {
        let collector = CollectorConfig {
            sources: SourceToggles {
                okx: false,
                binance: false,
                coinbase: false,
                kraken: false,
                coingecko: false,
                mock: true,
            },
            ..CollectorConfig::default()
        };
        let sources = build_sources(&collector, &MockSourceConfig::default()).unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].id(), "mock");
    }

    #[test]
    fn test_symbol_map_projects_one_source() {
        let mut collector = CollectorConfig::default();
        collector.token_mappings.insert(
            "SOL/USDC".to_string(),
            HashMap::from([
                ("okx".to_string(), "SOL-USDC".to_string()),
                ("binance".to_string(), "SOLUSDC".to_string()),
            ]),
        );
        let map = symbol_map(&collector, "okx");
        assert_eq!(map.get("SOL/USDC").map(String::as_str), Some("SOL-USDC"));
        assert!(!map.values().any(|s| s == "SOLUSDC"));
    }
}
