use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::error::{Error, Result};
use crate::sources::{http_client, status_error, PriceSource};
use crate::types::{Observation, Pair};
use crate::utils::helper::current_timestamp_ms;

pub const SOURCE_ID: &str = "coinbase";

const TICKER_URL: &str = "https://api.exchange.coinbase.com/products";

pub struct CoinbaseSource {
    symbols: HashMap<String, String>,
    client: reqwest::Client,
}

impl CoinbaseSource {
    pub fn new(symbols: HashMap<String, String>, timeout: Duration) -> Result<Self> {
        Ok(CoinbaseSource {
            symbols,
            client: http_client(timeout)?,
        })
    }
}

#[async_trait]
impl PriceSource for CoinbaseSource {
    fn id(&self) -> &str {
        SOURCE_ID
    }

    async fn fetch(&self, pair: &Pair) -> Result<Observation> {
        let product_id = self
            .symbols
            .get(pair.as_str())
            .ok_or_else(|| Error::UnsupportedPair {
                source_name: SOURCE_ID.to_string(),
                pair: pair.to_string(),
            })?;
        let url = format!("{}/{}/ticker", TICKER_URL, product_id);

        let response = self
            .client
            .get(&url)
            // Coinbase rejects requests without a UA.
            .header(reqwest::header::USER_AGENT, "pricefeed/0.1")
            .send()
            .await
            .map_err(|e| Error::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(status_error(SOURCE_ID, response.status()));
        }

        let ticker: CoinbaseTicker = response
            .json()
            .await
            .map_err(|e| Error::ParseError(e.to_string()))?;

        let price: f64 = ticker
            .price
            .parse()
            .map_err(|_| Error::ParseError(format!("coinbase price {:?}", ticker.price)))?;
        let volume: Option<f64> = ticker.volume.as_deref().and_then(|v| v.parse().ok());

        let mut obs = match volume {
            Some(v) => Observation::with_volume(price, v, current_timestamp_ms(), SOURCE_ID),
            None => Observation::new(price, current_timestamp_ms(), SOURCE_ID),
        };
        obs = obs.with_metadata(json!({
            "productId": product_id,
            "bid": ticker.bid,
            "ask": ticker.ask,
            "tradeTime": ticker.time,
        }));
        Ok(obs)
    }
}

#[derive(Deserialize)]
struct CoinbaseTicker {
    price: String,
    volume: Option<String>,
    bid: Option<String>,
    ask: Option<String>,
    time: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unmapped_pair_is_unsupported() {
        let source = CoinbaseSource::new(HashMap::new(), Duration::from_secs(1)).unwrap();
        let err = source.fetch(&Pair::new("SOL/USDC")).await.unwrap_err();
        assert!(matches!(err, Error::UnsupportedPair { .. }));
    }

    #[test]
    fn test_ticker_parsing() {
        let raw = r#"{
            "trade_id": 86326522,
            "price": "177.51",
            "size": "12.3",
            "volume": "98000.7",
            "bid": "177.50",
            "ask": "177.52",
            "time": "2026-08-01T12:00:00.000000Z"
        }"#;
        let parsed: CoinbaseTicker = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.price, "177.51");
        assert_eq!(parsed.volume.as_deref(), Some("98000.7"));
    }
}
