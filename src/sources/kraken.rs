use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::error::{Error, Result};
use crate::sources::{http_client, status_error, PriceSource};
use crate::types::{Observation, Pair};
use crate::utils::helper::current_timestamp_ms;

pub const SOURCE_ID: &str = "kraken";

const TICKER_URL: &str = "https://api.kraken.com/0/public/Ticker";

/// Kraken keys its ticker payload by its own (sometimes rewritten) pair
/// name, so the response is walked as a generic document.
pub struct KrakenSource {
    symbols: HashMap<String, String>,
    client: reqwest::Client,
}

impl KrakenSource {
    pub fn new(symbols: HashMap<String, String>, timeout: Duration) -> Result<Self> {
        Ok(KrakenSource {
            symbols,
            client: http_client(timeout)?,
        })
    }
}

#[async_trait]
impl PriceSource for KrakenSource {
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
        let url = format!("{}?pair={}", TICKER_URL, symbol);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(status_error(SOURCE_ID, response.status()));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::ParseError(e.to_string()))?;

        if let Some(errors) = body.get("error").and_then(|e| e.as_array()) {
            if !errors.is_empty() {
                return Err(Error::NetworkError(format!("kraken error: {:?}", errors)));
            }
        }

        let result = body
            .get("result")
            .and_then(|r| r.as_object())
            .and_then(|r| r.values().next())
            .ok_or_else(|| Error::ParseError("kraken result empty".to_string()))?;

        // c = last trade [price, lot volume], v = volume [today, 24h],
        // b/a = best bid/ask [price, whole lot volume, lot volume].
        let price: f64 = result
            .get("c")
            .and_then(|c| c.get(0))
            .and_then(|p| p.as_str())
            .and_then(|p| p.parse().ok())
            .ok_or_else(|| Error::ParseError("kraken last trade missing".to_string()))?;
        let volume: Option<f64> = result
            .get("v")
            .and_then(|v| v.get(1))
            .and_then(|v| v.as_str())
            .and_then(|v| v.parse().ok());
        let bid = result.get("b").and_then(|b| b.get(0)).cloned();
        let ask = result.get("a").and_then(|a| a.get(0)).cloned();

        let mut obs = match volume {
            Some(v) => Observation::with_volume(price, v, current_timestamp_ms(), SOURCE_ID),
            None => Observation::new(price, current_timestamp_ms(), SOURCE_ID),
        };
        obs = obs.with_metadata(json!({
            "pair": symbol,
            "bid": bid,
            "ask": ask,
        }));
        Ok(obs)
    }
}
