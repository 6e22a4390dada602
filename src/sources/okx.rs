use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::error::{Error, Result};
use crate::sources::{http_client, status_error, PriceSource};
use crate::types::{Observation, Pair};
use crate::utils::helper::current_timestamp_ms;

pub const SOURCE_ID: &str = "okx";

const TICKER_URL: &str = "https://www.okx.com/api/v5/market/ticker";

pub struct OkxSource {
    symbols: HashMap<String, String>,
    client: reqwest::Client,
}

impl OkxSource {
    pub fn new(symbols: HashMap<String, String>, timeout: Duration) -> Result<Self> {
        Ok(OkxSource {
            symbols,
            client: http_client(timeout)?,
        })
    }

    fn symbol(&self, pair: &Pair) -> Result<&str> {
        self.symbols
            .get(pair.as_str())
            .map(String::as_str)
            .ok_or_else(|| Error::UnsupportedPair {
                source_name: SOURCE_ID.to_string(),
                pair: pair.to_string(),
            })
    }
}

#[async_trait]
impl PriceSource for OkxSource {
    fn id(&self) -> &str {
        SOURCE_ID
    }

    async fn fetch(&self, pair: &Pair) -> Result<Observation> {
        let inst_id = self.symbol(pair)?;
        let url = format!("{}?instId={}", TICKER_URL, inst_id);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(status_error(SOURCE_ID, response.status()));
        }

        let body: OkxTickerResponse = response
            .json()
            .await
            .map_err(|e| Error::ParseError(e.to_string()))?;

        if body.code != "0" {
            return Err(Error::NetworkError(format!(
                "okx error code {}: {}",
                body.code, body.msg
            )));
        }

        let ticker = body
            .data
            .first()
            .ok_or_else(|| Error::ParseError("okx ticker payload empty".to_string()))?;

        let price: f64 = ticker
            .last
            .parse()
            .map_err(|_| Error::ParseError(format!("okx price {:?}", ticker.last)))?;
        let volume: Option<f64> = ticker.vol_24h.as_deref().and_then(|v| v.parse().ok());
        let timestamp_ms: u64 = ticker
            .ts
            .as_deref()
            .and_then(|t| t.parse().ok())
            .unwrap_or_else(current_timestamp_ms);

        let mut obs = match volume {
            Some(v) => Observation::with_volume(price, v, timestamp_ms, SOURCE_ID),
            None => Observation::new(price, timestamp_ms, SOURCE_ID),
        };
        obs = obs.with_metadata(json!({
            "instId": inst_id,
            "bid": ticker.bid_px,
            "ask": ticker.ask_px,
        }));
        Ok(obs)
    }
}

#[derive(Deserialize)]
struct OkxTickerResponse {
    code: String,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    data: Vec<OkxTicker>,
}

#[derive(Deserialize)]
struct OkxTicker {
    last: String,
    #[serde(rename = "vol24h")]
    vol_24h: Option<String>,
    ts: Option<String>,
    #[serde(rename = "bidPx")]
    bid_px: Option<String>,
    #[serde(rename = "askPx")]
    ask_px: Option<String>,
}
