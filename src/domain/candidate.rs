//! Token Candidates
//!
//! A migration event as delivered by the discovery feed: the token identity,
//! where it migrated to, when, and the raw metric bundle the scorers read.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for inbound candidate messages
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Missing token address")]
    MissingTokenAddress,
    #[error("Malformed candidate message: {0}")]
    Malformed(String),
    #[error("Invalid metric: {0}")]
    InvalidMetric(String),
}

/// Destination venue of a migration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Venue {
    #[serde(alias = "PumpSwap", alias = "pumpswap")]
    PumpSwap,
    #[serde(alias = "Raydium")]
    Raydium,
    #[serde(untagged)]
    Other(String),
}

impl Default for Venue {
    fn default() -> Self {
        Venue::Other("unknown".to_string())
    }
}

impl std::fmt::Display for Venue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Venue::PumpSwap => write!(f, "PumpSwap"),
            Venue::Raydium => write!(f, "Raydium"),
            Venue::Other(name) => write!(f, "{}", name),
        }
    }
}

/// One observation in a metric time series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl MetricPoint {
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Current state of the token's pool on its destination venue
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PoolSnapshot {
    /// Pool liquidity in USD
    pub liquidity_usd: f64,
    /// Trailing 24h volume in USD
    pub volume_24h_usd: f64,
    /// Spot price in USD
    pub price_usd: f64,
    /// Fractional 24h price change (0.25 = +25%)
    pub price_change_24h: f64,
}

/// Social activity counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SocialMetrics {
    #[serde(default)]
    pub twitter_mentions: u64,
    #[serde(default)]
    pub telegram_activity: u64,
    #[serde(default)]
    pub discord_activity: u64,
}

impl SocialMetrics {
    /// Number of platforms with any activity
    pub fn active_platforms(&self) -> usize {
        [self.twitter_mentions, self.telegram_activity, self.discord_activity]
            .iter()
            .filter(|count| **count > 0)
            .count()
    }
}

/// Activity of tracked "smart money" wallets on this token
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SmartMoneyActivity {
    /// Wallets being tracked in total
    pub tracked_wallets: u32,
    /// Tracked wallets that bought the token
    #[serde(default)]
    pub buying_wallets: u32,
    /// Tracked wallets that sold the token
    #[serde(default)]
    pub selling_wallets: u32,
}

impl SmartMoneyActivity {
    pub fn active_wallets(&self) -> u32 {
        self.buying_wallets + self.selling_wallets
    }
}

/// Broad market context at migration time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketConditions {
    /// Fractional SOL price trend over the recent window
    pub sol_price_trend: f64,
    /// Fractional change in aggregate memecoin volume
    #[serde(default)]
    pub memecoin_volume_trend: f64,
}

/// Statistics about the destination venue
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VenueStats {
    /// Tokens currently listed on the venue
    #[serde(default)]
    pub token_count: Option<u64>,
    /// Migrations observed today
    #[serde(default)]
    pub daily_migrations: Option<u64>,
    /// Venue total value locked in USD
    #[serde(default)]
    pub tvl_usd: Option<f64>,
}

/// Raw metrics attached to a candidate. Every field may be absent; series are
/// chronological (oldest first).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricBundle {
    pub liquidity_series: Vec<MetricPoint>,
    pub volume_series: Vec<MetricPoint>,
    pub price_series: Vec<MetricPoint>,
    pub pool: Option<PoolSnapshot>,
    /// Total USD volume since migration
    pub total_volume_usd: Option<f64>,
    pub trade_count: Option<u64>,
    pub social: Option<SocialMetrics>,
    pub smart_money: Option<SmartMoneyActivity>,
    pub market: Option<MarketConditions>,
    pub venue: Option<VenueStats>,
}

impl MetricBundle {
    pub fn liquidity_values(&self) -> Vec<f64> {
        self.liquidity_series.iter().map(|p| p.value).collect()
    }

    pub fn volume_values(&self) -> Vec<f64> {
        self.volume_series.iter().map(|p| p.value).collect()
    }

    pub fn price_values(&self) -> Vec<f64> {
        self.price_series.iter().map(|p| p.value).collect()
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let series = [
            ("liquidity_series", &self.liquidity_series),
            ("volume_series", &self.volume_series),
            ("price_series", &self.price_series),
        ];
        for (name, points) in series {
            if points.iter().any(|p| !p.value.is_finite()) {
                return Err(ValidationError::InvalidMetric(format!(
                    "{} contains a non-finite value",
                    name
                )));
            }
            if points.windows(2).any(|w| w[1].timestamp < w[0].timestamp) {
                return Err(ValidationError::InvalidMetric(format!(
                    "{} is not chronological",
                    name
                )));
            }
        }
        if let Some(pool) = &self.pool {
            let values = [
                pool.liquidity_usd,
                pool.volume_24h_usd,
                pool.price_usd,
                pool.price_change_24h,
            ];
            if values.iter().any(|v| !v.is_finite()) {
                return Err(ValidationError::InvalidMetric(
                    "pool snapshot contains a non-finite value".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// A token that graduated from its launch platform and migrated to a venue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenCandidate {
    pub token_address: String,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub destination: Venue,
    #[serde(default)]
    pub graduated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub migrated_at: Option<DateTime<Utc>>,
    pub discovered_at: DateTime<Utc>,
    #[serde(default)]
    pub metrics: MetricBundle,
}

impl TokenCandidate {
    pub fn new(token_address: impl Into<String>, destination: Venue, discovered_at: DateTime<Utc>) -> Self {
        Self {
            token_address: token_address.into(),
            symbol: None,
            name: None,
            destination,
            graduated_at: None,
            migrated_at: None,
            discovered_at,
            metrics: MetricBundle::default(),
        }
    }

    pub fn with_identity(mut self, symbol: &str, name: &str) -> Self {
        self.symbol = Some(symbol.to_string());
        self.name = Some(name.to_string());
        self
    }

    pub fn with_migrated_at(mut self, migrated_at: DateTime<Utc>) -> Self {
        self.migrated_at = Some(migrated_at);
        self
    }

    pub fn with_metrics(mut self, metrics: MetricBundle) -> Self {
        self.metrics = metrics;
        self
    }

    /// Parse and validate a discovery message.
    ///
    /// Messages without a token address are rejected here so the consumer can
    /// drop them without touching the rest of the pipeline.
    pub fn from_message(payload: &serde_json::Value) -> Result<Self, ValidationError> {
        if Self::address_of(payload).is_none() {
            return Err(ValidationError::MissingTokenAddress);
        }

        let candidate: TokenCandidate = serde_json::from_value(payload.clone())
            .map_err(|e| ValidationError::Malformed(e.to_string()))?;
        candidate.validate()?;
        Ok(candidate)
    }

    /// Non-blank token address of a raw message, if it carries one
    pub fn address_of(payload: &serde_json::Value) -> Option<&str> {
        payload
            .get("token_address")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|address| !address.is_empty())
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.token_address.trim().is_empty() {
            return Err(ValidationError::MissingTokenAddress);
        }
        self.metrics.validate()
    }

    /// Display label used in logs
    pub fn label(&self) -> String {
        match &self.symbol {
            Some(symbol) if !symbol.is_empty() => format!("{} ({})", symbol, short_address(&self.token_address)),
            _ => short_address(&self.token_address),
        }
    }
}

fn short_address(address: &str) -> String {
    address.chars().take(8).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn ts(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_minimal_message() {
        let payload = json!({
            "token_address": "9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin",
            "discovered_at": "2025-03-14T12:00:00Z"
        });

        let candidate = TokenCandidate::from_message(&payload).unwrap();
        assert_eq!(candidate.destination, Venue::Other("unknown".to_string()));
        assert!(candidate.metrics.pool.is_none());
        assert!(candidate.migrated_at.is_none());
    }

    #[test]
    fn test_parse_venue_spellings() {
        for (raw, expected) in [
            ("pump_swap", Venue::PumpSwap),
            ("PumpSwap", Venue::PumpSwap),
            ("raydium", Venue::Raydium),
            ("meteora", Venue::Other("meteora".to_string())),
        ] {
            let payload = json!({
                "token_address": "abc",
                "destination": raw,
                "discovered_at": "2025-03-14T12:00:00Z"
            });
            let candidate = TokenCandidate::from_message(&payload).unwrap();
            assert_eq!(candidate.destination, expected, "venue {}", raw);
        }
    }

    #[test]
    fn test_missing_address_rejected() {
        let payload = json!({ "symbol": "WIF", "discovered_at": "2025-03-14T12:00:00Z" });
        assert_eq!(
            TokenCandidate::from_message(&payload),
            Err(ValidationError::MissingTokenAddress)
        );

        let blank = json!({ "token_address": "   ", "discovered_at": "2025-03-14T12:00:00Z" });
        assert_eq!(
            TokenCandidate::from_message(&blank),
            Err(ValidationError::MissingTokenAddress)
        );
    }

    #[test]
    fn test_malformed_message_rejected() {
        let payload = json!({ "token_address": "abc", "discovered_at": 42 });
        assert!(matches!(
            TokenCandidate::from_message(&payload),
            Err(ValidationError::Malformed(_))
        ));
    }

    #[test]
    fn test_non_chronological_series_rejected() {
        let mut metrics = MetricBundle::default();
        metrics.liquidity_series = vec![MetricPoint::new(ts(5), 100.0), MetricPoint::new(ts(4), 110.0)];
        let candidate = TokenCandidate::new("abc", Venue::PumpSwap, ts(6)).with_metrics(metrics);

        assert!(matches!(candidate.validate(), Err(ValidationError::InvalidMetric(_))));
    }

    #[test]
    fn test_active_platforms() {
        let social = SocialMetrics { twitter_mentions: 12, telegram_activity: 0, discord_activity: 3 };
        assert_eq!(social.active_platforms(), 2);
        assert_eq!(SocialMetrics::default().active_platforms(), 0);
    }

    #[test]
    fn test_label() {
        let candidate = TokenCandidate::new("9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin", Venue::Raydium, ts(1))
            .with_identity("BONK", "Bonk");
        assert_eq!(candidate.label(), "BONK (9xQeWvG8)");
    }
}
