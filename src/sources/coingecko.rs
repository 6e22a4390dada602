use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::error::{Error, Result};
use crate::sources::{http_client, status_error, PriceSource};
use crate::types::{Observation, Pair};
use crate::utils::helper::current_timestamp_ms;

pub const SOURCE_ID: &str = "coingecko";

const SIMPLE_PRICE_URL: &str = "https://api.coingecko.com/api/v3/simple/price";

/// Public price index. No order book, so observations carry the 24h index
/// volume and no bid/ask.
pub struct CoingeckoSource {
    /// Canonical pair -> coin id ("SOL/USDC" -> "solana").
    coin_ids: HashMap<String, String>,
    client: reqwest::Client,
}

impl CoingeckoSource {
    pub fn new(coin_ids: HashMap<String, String>, timeout: Duration) -> Result<Self> {
        Ok(CoingeckoSource {
            coin_ids,
            client: http_client(timeout)?,
        })
    }

    /// CoinGecko quotes against fiat-style vs currencies; stable quote
    /// assets collapse to "usd".
    fn vs_currency(pair: &Pair) -> &'static str {
        match pair.quote().map(|q| q.to_ascii_uppercase()) {
            Some(q) if q == "EUR" => "eur",
            Some(q) if q == "BTC" => "btc",
            Some(q) if q == "ETH" => "eth",
            _ => "usd",
        }
    }
}

#[async_trait]
impl PriceSource for CoingeckoSource {
    fn id(&self) -> &str {
        SOURCE_ID
    }

    async fn fetch(&self, pair: &Pair) -> Result<Observation> {
        let coin_id = self
            .coin_ids
            .get(pair.as_str())
            .ok_or_else(|| Error::UnsupportedPair {
                source_name: SOURCE_ID.to_string(),
                pair: pair.to_string(),
            })?;
        let vs = Self::vs_currency(pair);
        let url = format!(
            "{}?ids={}&vs_currencies={}&include_24hr_vol=true&include_24hr_change=true&include_last_updated_at=true",
            SIMPLE_PRICE_URL, coin_id, vs
        );

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

        let coin = body
            .get(coin_id)
            .ok_or_else(|| Error::ParseError(format!("coingecko missing id {}", coin_id)))?;
        let price = coin
            .get(vs)
            .and_then(|v| v.as_f64())
            .ok_or_else(|| Error::ParseError(format!("coingecko missing {} quote", vs)))?;
        let volume = coin
            .get(format!("{}_24h_vol", vs))
            .and_then(|v| v.as_f64());
        let change_24h = coin
            .get(format!("{}_24h_change", vs))
            .and_then(|v| v.as_f64());
        let timestamp_ms = coin
            .get("last_updated_at")
            .and_then(|v| v.as_u64())
            .map(|secs| secs * 1_000)
            .unwrap_or_else(current_timestamp_ms);

        let mut obs = match volume {
            Some(v) => Observation::with_volume(price, v, timestamp_ms, SOURCE_ID),
            None => Observation::new(price, timestamp_ms, SOURCE_ID),
        };
        obs = obs.with_metadata(json!({
            "coinId": coin_id,
            "vsCurrency": vs,
            "change24h": change_24h,
        }));
        Ok(obs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unmapped_pair_is_unsupported() {
        let source = CoingeckoSource::new(HashMap::new(), Duration::from_secs(1)).unwrap();
        let err = source.fetch(&Pair::new("SOL/USDC")).await.unwrap_err();
        assert!(matches!(err, Error::UnsupportedPair { .. }));
    }

    #[test]
    fn test_stable_quotes_collapse_to_usd() {
        assert_eq!(CoingeckoSource::vs_currency(&Pair::new("SOL/USDC")), "usd");
        assert_eq!(CoingeckoSource::vs_currency(&Pair::new("SOL/USDT")), "usd");
        assert_eq!(CoingeckoSource::vs_currency(&Pair::new("SOL/ETH")), "eth");
        assert_eq!(CoingeckoSource::vs_currency(&Pair::new("SOL")), "usd");
    }
}
