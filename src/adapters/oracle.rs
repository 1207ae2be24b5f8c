//! HTTP Scoring Oracle
//!
//! Posts `{historical_data, current_metrics}` to the configured endpoint and
//! reads back `{best_params, best_value}`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::domain::{OracleRequest, OracleResponse};
use crate::ports::{PortError, ScoringOracle};

#[derive(Debug, Clone)]
pub struct HttpScoringOracle {
    http: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpScoringOracle {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, PortError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PortError::Unavailable(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
            api_key: None,
        })
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|k| !k.is_empty());
        self
    }
}

fn map_http_error(err: reqwest::Error) -> PortError {
    if err.is_timeout() {
        PortError::Timeout(err.to_string())
    } else if err.is_decode() {
        PortError::Serialization(err.to_string())
    } else {
        PortError::Unavailable(err.to_string())
    }
}

#[async_trait]
impl ScoringOracle for HttpScoringOracle {
    async fn optimize(&self, request: &OracleRequest) -> Result<OracleResponse, PortError> {
        let mut builder = self.http.post(&self.endpoint).json(request);
        if let Some(ref key) = self.api_key {
            builder = builder.header("x-api-key", key);
        }

        let response = builder.send().await.map_err(map_http_error)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PortError::Unavailable(format!("oracle returned {}: {}", status, body)));
        }

        let body = response.text().await.map_err(map_http_error)?;
        serde_json::from_str(&body).map_err(PortError::from)
    }
}
