use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

use crate::config::loader::DEFAULT_PRICE_API;
use crate::ports::{PortError, PriceOracle};

#[derive(Debug, Error)]
pub enum PriceError {
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("No price data for mint: {0}")]
    NoPriceData(String),
    #[error("Parse error: {0}")]
    ParseError(String),
}

impl From<PriceError> for PortError {
    fn from(err: PriceError) -> Self {
        match err {
            PriceError::HttpError(e) if e.is_timeout() => PortError::Timeout(e.to_string()),
            PriceError::HttpError(e) => PortError::Unavailable(e.to_string()),
            PriceError::NoPriceData(mint) => PortError::NotFound(format!("no price for {}", mint)),
            PriceError::ParseError(msg) => PortError::Serialization(msg),
        }
    }
}

/// Jupiter price API client
#[derive(Debug, Clone)]
pub struct JupiterPriceClient {
    http: Client,
    base_url: String,
}

impl JupiterPriceClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, PriceError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    pub fn with_defaults() -> Result<Self, PriceError> {
        Self::new(DEFAULT_PRICE_API, Duration::from_secs(10))
    }

    /// Get USD price for a single token
    pub async fn get_price(&self, mint: &str) -> Result<f64, PriceError> {
        let response = self
            .http
            .get(&self.base_url)
            .query(&[("ids", mint)])
            .send()
            .await?
            .error_for_status()?;
        let body = response.text().await?;
        parse_price(&body, mint)
    }
}

/// Extract the price for `mint` from a price API body
pub fn parse_price(body: &str, mint: &str) -> Result<f64, PriceError> {
    let response: PriceResponse =
        serde_json::from_str(body).map_err(|e| PriceError::ParseError(e.to_string()))?;

    let price = response
        .data
        .get(mint)
        .and_then(|entry| entry.as_ref())
        .map(|entry| entry.price)
        .ok_or_else(|| PriceError::NoPriceData(mint.to_string()))?;

    if !price.is_finite() || price <= 0.0 {
        return Err(PriceError::ParseError(format!("invalid price {} for {}", price, mint)));
    }
    Ok(price)
}

#[async_trait]
impl PriceOracle for JupiterPriceClient {
    async fn price_usd(&self, token_address: &str) -> Result<f64, PortError> {
        Ok(self.get_price(token_address).await?)
    }
}

#[derive(Debug, Deserialize)]
struct PriceResponse {
    #[serde(default)]
    data: HashMap<String, Option<PriceData>>,
}

#[derive(Debug, Deserialize)]
struct PriceData {
    #[serde(deserialize_with = "number_or_string")]
    price: f64,
}

/// Prices arrive either as JSON numbers or as decimal strings
fn number_or_string<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse::<f64>().map_err(serde::de::Error::custom),
    }
}
