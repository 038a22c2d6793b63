//! Price oracle client: current exchange rate between the accepted fungible
//! token and the native asset.
//!
//! The production implementation queries the Jupiter price API. Any network,
//! parse, or missing-data failure collapses to a single unavailability
//! error; partial data is never usable as a cost basis.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use solana_pubkey::Pubkey;
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

use crate::amount::UiAmount;

/// Wrapped SOL, the vs-token every rate is denominated in.
pub const WSOL_MINT: &str = "So11111111111111111111111111111111111111112";

#[derive(Debug, Clone, thiserror::Error)]
pub enum OracleError {
    /// The price feed could not produce a usable rate.
    #[error("price feed unavailable: {0}")]
    Unavailable(String),
}

/// Current token price denominated in the native asset.
#[async_trait]
pub trait PriceOracle: Send + Sync {
    /// Returns how much native asset one unit of `mint` is worth.
    async fn exchange_rate(&self, mint: &Pubkey) -> Result<Decimal, OracleError>;
}

#[derive(Debug, Deserialize)]
struct PriceResponse {
    data: HashMap<String, PriceEntry>,
}

#[derive(Debug, Deserialize)]
struct PriceEntry {
    // Jupiter reports the price as a decimal string; older responses used a
    // bare number.
    price: serde_json::Value,
}

/// Fetches token prices from the Jupiter price v2 API.
#[derive(Debug, Clone)]
pub struct JupiterPriceOracle {
    http: reqwest::Client,
    base_url: Url,
}

impl JupiterPriceOracle {
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, OracleError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OracleError::Unavailable(format!("http client: {e}")))?;
        Ok(Self { http, base_url })
    }
}

#[async_trait]
impl PriceOracle for JupiterPriceOracle {
    async fn exchange_rate(&self, mint: &Pubkey) -> Result<Decimal, OracleError> {
        let url = self
            .base_url
            .join("price/v2")
            .map_err(|e| OracleError::Unavailable(format!("bad price url: {e}")))?;
        let response = self
            .http
            .get(url)
            .query(&[("ids", mint.to_string()), ("vsToken", WSOL_MINT.to_string())])
            .send()
            .await
            .map_err(|e| OracleError::Unavailable(format!("request failed: {e}")))?
            .error_for_status()
            .map_err(|e| OracleError::Unavailable(format!("bad status: {e}")))?;
        let body: PriceResponse = response
            .json()
            .await
            .map_err(|e| OracleError::Unavailable(format!("malformed response: {e}")))?;
        let entry = body
            .data
            .get(&mint.to_string())
            .ok_or_else(|| OracleError::Unavailable(format!("no price for mint {mint}")))?;
        rate_from_value(&entry.price)
    }
}

fn rate_from_value(value: &serde_json::Value) -> Result<Decimal, OracleError> {
    let rate = match value {
        serde_json::Value::String(s) => UiAmount::parse(s)
            .map_err(|e| OracleError::Unavailable(format!("unparsable price {s:?}: {e}")))?
            .into_inner(),
        serde_json::Value::Number(n) => {
            let float = n
                .as_f64()
                .ok_or_else(|| OracleError::Unavailable(format!("unusable price {n}")))?;
            UiAmount::try_from(float)
                .map_err(|e| OracleError::Unavailable(format!("unusable price {n}: {e}")))?
                .into_inner()
        }
        other => {
            return Err(OracleError::Unavailable(format!(
                "unexpected price shape: {other}"
            )));
        }
    };
    Ok(rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::str::FromStr;

    #[test]
    fn parses_string_and_numeric_prices() {
        assert_eq!(
            rate_from_value(&json!("0.005")).unwrap(),
            Decimal::from_str("0.005").unwrap()
        );
        assert_eq!(
            rate_from_value(&json!(0.005)).unwrap(),
            Decimal::from_str("0.005").unwrap()
        );
    }

    #[test]
    fn rejects_missing_or_malformed_prices() {
        assert!(rate_from_value(&json!(null)).is_err());
        assert!(rate_from_value(&json!("not-a-number")).is_err());
        assert!(rate_from_value(&json!(-1.0)).is_err());
    }

    #[test]
    fn price_response_deserializes_jupiter_shape() {
        let raw = json!({
            "data": {
                "iTHSaXjdqFtcnLK4EFEs7mqYQbJb6B7GostqWbBQwaV": { "price": "0.005" }
            },
            "timeTaken": 0.003
        });
        let parsed: PriceResponse = serde_json::from_value(raw).unwrap();
        let entry = &parsed.data["iTHSaXjdqFtcnLK4EFEs7mqYQbJb6B7GostqWbBQwaV"];
        assert_eq!(
            rate_from_value(&entry.price).unwrap(),
            Decimal::from_str("0.005").unwrap()
        );
    }
}
