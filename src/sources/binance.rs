use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::error::{Error, Result};
use crate::sources::{http_client, status_error, PriceSource};
use crate::types::{Observation, Pair};
use crate::utils::helper::current_timestamp_ms;

pub const SOURCE_ID: &str = "binance";

const TICKER_URL: &str = "https://api.binance.com/api/v3/ticker/24hr";

pub struct BinanceSource {
    symbols: HashMap<String, String>,
    client: reqwest::Client,
}

impl BinanceSource {
    pub fn new(symbols: HashMap<String, String>, timeout: Duration) -> Result<Self> {
        Ok(BinanceSource {
            symbols,
            client: http_client(timeout)?,
        })
    }
}

#[async_trait]
impl PriceSource for BinanceSource {
    fn id(&self) -> &str {
        SOURCE_ID
    }

    async fn fetch(&self, pair: &Pair) -> Result<Observation> {
        let symbol = self
            .symbols
            .get(pair.as_str())
            .ok_or_else(|| Error::UnsupportedPair {
                source_name: SOURCE_ID.to_string(),
                pair: pair.to_string(),
            })?;
        let url = format!("{}?symbol={}", TICKER_URL, symbol);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(status_error(SOURCE_ID, response.status()));
        }

        let ticker: BinanceTicker = response
            .json()
            .await
            .map_err(|e| Error::ParseError(e.to_string()))?;

        let price: f64 = ticker
            .last_price
            .parse()
            .map_err(|_| Error::ParseError(format!("binance price {:?}", ticker.last_price)))?;
        let volume: Option<f64> = ticker.volume.as_deref().and_then(|v| v.parse().ok());
        let timestamp_ms = ticker.close_time.unwrap_or_else(current_timestamp_ms);

        let mut obs = match volume {
            Some(v) => Observation::with_volume(price, v, timestamp_ms, SOURCE_ID),
            None => Observation::new(price, timestamp_ms, SOURCE_ID),
        };
        obs = obs.with_metadata(json!({
            "symbol": symbol,
            "bid": ticker.bid_price,
            "ask": ticker.ask_price,
            "change24h": ticker.price_change_percent,
        }));
        Ok(obs)
    }
}

#[derive(Deserialize)]
struct BinanceTicker {
    #[serde(rename = "lastPrice")]
    last_price: String,
    volume: Option<String>,
    #[serde(rename = "closeTime")]
    close_time: Option<u64>,
    #[serde(rename = "bidPrice")]
    bid_price: Option<String>,
    #[serde(rename = "askPrice")]
    ask_price: Option<String>,
    #[serde(rename = "priceChangePercent")]
    price_change_percent: Option<String>,
}
