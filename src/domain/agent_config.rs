//! Agent Configuration
//!
//! The tunable configuration document shared by the analyzer, trader and
//! optimizer. It is stored as JSON in the configuration store, re-read at the
//! start of every processing cycle, and rewritten only by the optimizer.
//!
//! The stored document is either a single configuration or an A/B test with
//! two arms; consumers resolve the arm per token with [`ConfigDocument::resolve`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use super::analysis::{Dimension, Recommendation, Confidence};

/// Tolerance for the weight-sum check
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

pub const DEFAULT_RISK_KEYWORDS: [&str; 7] =
    ["risk", "error", "low", "decline", "volatile", "insufficient", "generic"];

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AgentConfigError {
    #[error("Invalid weights: {0}")]
    InvalidWeights(String),
    #[error("Invalid tier configuration: {0}")]
    InvalidTiers(String),
    #[error("Invalid threshold: {0}")]
    InvalidThreshold(String),
}

/// Which arm of an A/B test produced a decision or trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ConfigArm {
    #[default]
    A,
    B,
}

impl std::fmt::Display for ConfigArm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigArm::A => write!(f, "A"),
            ConfigArm::B => write!(f, "B"),
        }
    }
}

/// Discovery feed settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscovererConfig {
    /// Seconds before an upstream webhook call is abandoned
    #[serde(default = "default_webhook_timeout")]
    pub webhook_timeout: u64,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
}

fn default_webhook_timeout() -> u64 {
    30
}

fn default_retry_attempts() -> u32 {
    3
}

impl Default for DiscovererConfig {
    fn default() -> Self {
        Self {
            webhook_timeout: default_webhook_timeout(),
            retry_attempts: default_retry_attempts(),
        }
    }
}

/// Factor set used by the analyzer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyzerProfile {
    /// Generic migration analysis (liquidity stability, smart money, timing...)
    Migration,
    /// PumpSwap early-adoption analysis
    #[default]
    #[serde(alias = "pump_swap")]
    Pumpswap,
}

impl AnalyzerProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalyzerProfile::Migration => "migration",
            AnalyzerProfile::Pumpswap => "pumpswap",
        }
    }

    pub fn dimensions(&self) -> [Dimension; 5] {
        match self {
            AnalyzerProfile::Migration => [
                Dimension::LiquidityStability,
                Dimension::PostMigrationVolume,
                Dimension::SmartMoneyFollowing,
                Dimension::MigrationTiming,
                Dimension::DestinationQuality,
            ],
            AnalyzerProfile::Pumpswap => [
                Dimension::EarlyAdoption,
                Dimension::LiquidityGrowth,
                Dimension::VolumeMomentum,
                Dimension::PriceStability,
                Dimension::CommunityInterest,
            ],
        }
    }

    pub fn default_weights(&self) -> BTreeMap<String, f64> {
        let values: [f64; 5] = match self {
            AnalyzerProfile::Migration => [0.25, 0.20, 0.20, 0.15, 0.20],
            AnalyzerProfile::Pumpswap => [0.25, 0.20, 0.20, 0.15, 0.20],
        };
        self.dimensions()
            .iter()
            .zip(values)
            .map(|(d, w)| (d.as_str().to_string(), w))
            .collect()
    }

    pub fn default_action_threshold(&self) -> f64 {
        match self {
            AnalyzerProfile::Migration => 0.6,
            AnalyzerProfile::Pumpswap => 0.5,
        }
    }
}

/// Score cut-offs for the recommendation bands
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecommendationThresholds {
    pub strong_buy: f64,
    pub buy: f64,
    pub consider: f64,
}

impl Default for RecommendationThresholds {
    fn default() -> Self {
        Self {
            strong_buy: 0.8,
            buy: 0.65,
            consider: 0.5,
        }
    }
}

impl RecommendationThresholds {
    /// Map an overall score to its band. Bands are ordered and exhaustive.
    pub fn classify(&self, overall_score: f64) -> (Recommendation, Confidence) {
        if overall_score >= self.strong_buy {
            (Recommendation::StrongBuy, Confidence::High)
        } else if overall_score >= self.buy {
            (Recommendation::Buy, Confidence::Medium)
        } else if overall_score >= self.consider {
            (Recommendation::Consider, Confidence::Low)
        } else {
            (Recommendation::Avoid, Confidence::High)
        }
    }

    pub fn validate(&self) -> Result<(), AgentConfigError> {
        let ordered = self.consider <= self.buy && self.buy <= self.strong_buy;
        let bounded = [self.consider, self.buy, self.strong_buy]
            .iter()
            .all(|t| (0.0..=1.0).contains(t));
        if !ordered || !bounded {
            return Err(AgentConfigError::InvalidThreshold(format!(
                "recommendation thresholds must satisfy 0 <= consider <= buy <= strong_buy <= 1, got {}/{}/{}",
                self.consider, self.buy, self.strong_buy
            )));
        }
        Ok(())
    }
}

/// Analyzer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    #[serde(default)]
    pub profile: AnalyzerProfile,
    /// Per-dimension weights; empty means the profile defaults
    #[serde(default)]
    pub weights: BTreeMap<String, f64>,
    /// Minimum overall score for a decision to be published
    #[serde(default)]
    pub action_threshold: Option<f64>,
    /// Minimum quality score (0-100) for the trader to buy
    #[serde(default = "default_quality_score_threshold")]
    pub quality_score_threshold: u32,
    #[serde(default)]
    pub recommendation: RecommendationThresholds,
    #[serde(default = "default_risk_keywords")]
    pub risk_keywords: Vec<String>,
}

fn default_quality_score_threshold() -> u32 {
    60
}

fn default_risk_keywords() -> Vec<String> {
    DEFAULT_RISK_KEYWORDS.iter().map(|k| k.to_string()).collect()
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            profile: AnalyzerProfile::default(),
            weights: BTreeMap::new(),
            action_threshold: None,
            quality_score_threshold: default_quality_score_threshold(),
            recommendation: RecommendationThresholds::default(),
            risk_keywords: default_risk_keywords(),
        }
    }
}

impl AnalyzerConfig {
    /// Weights resolved to dimensions, falling back to the profile defaults
    pub fn resolved_weights(&self) -> Result<Vec<(Dimension, f64)>, AgentConfigError> {
        let source = if self.weights.is_empty() {
            self.profile.default_weights()
        } else {
            self.weights.clone()
        };

        let mut resolved = Vec::with_capacity(source.len());
        for (key, weight) in &source {
            let dimension = key
                .parse::<Dimension>()
                .map_err(AgentConfigError::InvalidWeights)?;
            if !self.profile.dimensions().contains(&dimension) {
                return Err(AgentConfigError::InvalidWeights(format!(
                    "dimension '{}' is not part of the {} profile",
                    key,
                    self.profile.as_str()
                )));
            }
            if !weight.is_finite() || *weight < 0.0 {
                return Err(AgentConfigError::InvalidWeights(format!(
                    "weight for '{}' must be a non-negative number, got {}",
                    key, weight
                )));
            }
            resolved.push((dimension, *weight));
        }

        for dimension in self.profile.dimensions() {
            if !resolved.iter().any(|(d, _)| *d == dimension) {
                return Err(AgentConfigError::InvalidWeights(format!(
                    "missing weight for '{}'",
                    dimension
                )));
            }
        }

        let sum: f64 = resolved.iter().map(|(_, w)| w).sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(AgentConfigError::InvalidWeights(format!(
                "weights must sum to 1.0, got {:.6}",
                sum
            )));
        }

        resolved.sort_by_key(|(d, _)| self.profile.dimensions().iter().position(|p| p == d));
        Ok(resolved)
    }

    pub fn effective_action_threshold(&self) -> f64 {
        self.action_threshold
            .unwrap_or_else(|| self.profile.default_action_threshold())
    }
}

/// Score tiers and the risk parameters attached to each
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraderConfig {
    /// Quality score at or above which the high tier applies
    #[serde(default = "default_high_score_threshold")]
    pub high_score_threshold: u32,
    /// Quality score at or above which the medium tier applies
    #[serde(default = "default_medium_score_threshold")]
    pub medium_score_threshold: u32,
    #[serde(default = "default_high_score_sl")]
    pub high_score_sl: f64,
    #[serde(default = "default_high_score_tp")]
    pub high_score_tp: f64,
    #[serde(default = "default_high_score_position")]
    pub high_score_position: f64,
    #[serde(default = "default_medium_score_sl")]
    pub medium_score_sl: f64,
    #[serde(default = "default_medium_score_tp")]
    pub medium_score_tp: f64,
    #[serde(default = "default_medium_score_position")]
    pub medium_score_position: f64,
    #[serde(default = "default_low_score_sl")]
    pub low_score_sl: f64,
    #[serde(default = "default_low_score_tp")]
    pub low_score_tp: f64,
    #[serde(default = "default_low_score_position")]
    pub low_score_position: f64,
    /// Maximum execution slippage (fraction)
    #[serde(default = "default_max_slippage")]
    pub max_slippage: f64,
}

fn default_high_score_threshold() -> u32 {
    80
}
fn default_medium_score_threshold() -> u32 {
    60
}
fn default_high_score_sl() -> f64 {
    0.10
}
fn default_high_score_tp() -> f64 {
    0.30
}
fn default_high_score_position() -> f64 {
    0.15
}
fn default_medium_score_sl() -> f64 {
    0.15
}
fn default_medium_score_tp() -> f64 {
    0.25
}
fn default_medium_score_position() -> f64 {
    0.10
}
fn default_low_score_sl() -> f64 {
    0.20
}
fn default_low_score_tp() -> f64 {
    0.20
}
fn default_low_score_position() -> f64 {
    0.05
}
fn default_max_slippage() -> f64 {
    0.02
}

impl Default for TraderConfig {
    fn default() -> Self {
        Self {
            high_score_threshold: default_high_score_threshold(),
            medium_score_threshold: default_medium_score_threshold(),
            high_score_sl: default_high_score_sl(),
            high_score_tp: default_high_score_tp(),
            high_score_position: default_high_score_position(),
            medium_score_sl: default_medium_score_sl(),
            medium_score_tp: default_medium_score_tp(),
            medium_score_position: default_medium_score_position(),
            low_score_sl: default_low_score_sl(),
            low_score_tp: default_low_score_tp(),
            low_score_position: default_low_score_position(),
            max_slippage: default_max_slippage(),
        }
    }
}

impl TraderConfig {
    /// Tiers must be monotonic: a better tier never has a wider stop, a
    /// narrower target or a smaller size.
    pub fn validate(&self) -> Result<(), AgentConfigError> {
        if self.medium_score_threshold >= self.high_score_threshold || self.high_score_threshold > 100 {
            return Err(AgentConfigError::InvalidTiers(format!(
                "tier thresholds must satisfy medium < high <= 100, got {}/{}",
                self.medium_score_threshold, self.high_score_threshold
            )));
        }

        let fractions = [
            ("high_score_sl", self.high_score_sl),
            ("high_score_tp", self.high_score_tp),
            ("high_score_position", self.high_score_position),
            ("medium_score_sl", self.medium_score_sl),
            ("medium_score_tp", self.medium_score_tp),
            ("medium_score_position", self.medium_score_position),
            ("low_score_sl", self.low_score_sl),
            ("low_score_tp", self.low_score_tp),
            ("low_score_position", self.low_score_position),
        ];
        for (name, value) in fractions {
            if !value.is_finite() || value <= 0.0 || value > 1.0 {
                return Err(AgentConfigError::InvalidTiers(format!(
                    "{} must be in (0, 1], got {}",
                    name, value
                )));
            }
        }

        if !(self.high_score_sl <= self.medium_score_sl && self.medium_score_sl <= self.low_score_sl) {
            return Err(AgentConfigError::InvalidTiers(
                "stop-loss must not widen as the tier improves".to_string(),
            ));
        }
        if !(self.high_score_tp >= self.medium_score_tp && self.medium_score_tp >= self.low_score_tp) {
            return Err(AgentConfigError::InvalidTiers(
                "take-profit must not narrow as the tier improves".to_string(),
            ));
        }
        if !(self.high_score_position >= self.medium_score_position
            && self.medium_score_position >= self.low_score_position)
        {
            return Err(AgentConfigError::InvalidTiers(
                "position size must not shrink as the tier improves".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.max_slippage) {
            return Err(AgentConfigError::InvalidThreshold(format!(
                "max_slippage must be in [0, 1], got {}",
                self.max_slippage
            )));
        }
        Ok(())
    }
}

/// Optimizer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Schedule label ("daily", "weekly")
    #[serde(default = "default_optimization_frequency")]
    pub optimization_frequency: String,
    /// Share of tokens routed to arm B during a test
    #[serde(default = "default_ab_test_percentage")]
    pub ab_test_percentage: f64,
    #[serde(default = "default_min_trades")]
    pub min_trades_for_optimization: usize,
    #[serde(default = "default_lookback_days")]
    pub lookback_days: i64,
}

fn default_optimization_frequency() -> String {
    "weekly".to_string()
}
fn default_ab_test_percentage() -> f64 {
    0.15
}
fn default_min_trades() -> usize {
    10
}
fn default_lookback_days() -> i64 {
    30
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            optimization_frequency: default_optimization_frequency(),
            ab_test_percentage: default_ab_test_percentage(),
            min_trades_for_optimization: default_min_trades(),
            lookback_days: default_lookback_days(),
        }
    }
}

impl OptimizerConfig {
    /// Interval implied by the frequency label
    pub fn interval(&self) -> chrono::Duration {
        match self.optimization_frequency.as_str() {
            "hourly" => chrono::Duration::hours(1),
            "daily" => chrono::Duration::days(1),
            _ => chrono::Duration::weeks(1),
        }
    }
}

/// The complete tunable configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfiguration {
    #[serde(default)]
    pub discoverer: DiscovererConfig,
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
    #[serde(default)]
    pub trader: TraderConfig,
    #[serde(default)]
    pub optimizer: OptimizerConfig,
}

impl AgentConfiguration {
    pub fn validate(&self) -> Result<(), AgentConfigError> {
        self.analyzer.resolved_weights()?;
        self.analyzer.recommendation.validate()?;
        let action = self.analyzer.effective_action_threshold();
        if !(0.0..=1.0).contains(&action) {
            return Err(AgentConfigError::InvalidThreshold(format!(
                "action_threshold must be in [0, 1], got {}",
                action
            )));
        }
        if self.analyzer.quality_score_threshold > 100 {
            return Err(AgentConfigError::InvalidThreshold(format!(
                "quality_score_threshold must be 0-100, got {}",
                self.analyzer.quality_score_threshold
            )));
        }
        self.trader.validate()?;
        if !(0.0..=1.0).contains(&self.optimizer.ab_test_percentage) {
            return Err(AgentConfigError::InvalidThreshold(format!(
                "ab_test_percentage must be in [0, 1], got {}",
                self.optimizer.ab_test_percentage
            )));
        }
        Ok(())
    }

    /// Apply optimizer parameters on top of this configuration.
    ///
    /// Returns the new configuration and the keys that were not recognised.
    pub fn with_overlay(&self, params: &BTreeMap<String, f64>) -> (AgentConfiguration, Vec<String>) {
        let mut next = self.clone();
        let mut ignored = Vec::new();

        for (key, value) in params {
            let value = *value;
            if !value.is_finite() {
                ignored.push(key.clone());
                continue;
            }
            let trader = &mut next.trader;
            match key.as_str() {
                "quality_threshold" => {
                    next.analyzer.quality_score_threshold = value.round().clamp(0.0, 100.0) as u32;
                }
                "action_threshold" => next.analyzer.action_threshold = Some(value),
                "high_score_sl" => trader.high_score_sl = value,
                "high_score_tp" => trader.high_score_tp = value,
                "high_score_position" => trader.high_score_position = value,
                "medium_score_sl" => trader.medium_score_sl = value,
                "medium_score_tp" => trader.medium_score_tp = value,
                "medium_score_position" => trader.medium_score_position = value,
                "low_score_sl" => trader.low_score_sl = value,
                "low_score_tp" => trader.low_score_tp = value,
                "low_score_position" => trader.low_score_position = value,
                _ => ignored.push(key.clone()),
            }
        }

        (next, ignored)
    }
}

/// A/B test document: arm A is the configuration in force before the test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbTestConfig {
    pub ab_test_active: bool,
    pub ab_test_start_time: DateTime<Utc>,
    pub ab_test_percentage: f64,
    pub config_a: AgentConfiguration,
    pub config_b: AgentConfiguration,
}

/// What the configuration store holds under its "current" pointer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ConfigDocument {
    AbTest(AbTestConfig),
    Single(AgentConfiguration),
}

/// Keys that mark a document as an A/B test
const AB_TEST_KEYS: [&str; 3] = ["config_a", "config_b", "ab_test_active"];

impl<'de> Deserialize<'de> for ConfigDocument {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Error as _;

        let value = serde_json::Value::deserialize(deserializer)?;
        let is_ab_test = value
            .as_object()
            .map(|object| AB_TEST_KEYS.iter().any(|key| object.contains_key(*key)))
            .unwrap_or(false);

        if is_ab_test {
            AbTestConfig::deserialize(value)
                .map(ConfigDocument::AbTest)
                .map_err(|e| D::Error::custom(format!("invalid A/B test document: {}", e)))
        } else {
            AgentConfiguration::deserialize(value)
                .map(ConfigDocument::Single)
                .map_err(|e| D::Error::custom(format!("invalid configuration document: {}", e)))
        }
    }
}

impl Default for ConfigDocument {
    fn default() -> Self {
        ConfigDocument::Single(AgentConfiguration::default())
    }
}

impl ConfigDocument {
    /// The configuration in force outside any test (arm A)
    pub fn base(&self) -> &AgentConfiguration {
        match self {
            ConfigDocument::AbTest(test) => &test.config_a,
            ConfigDocument::Single(config) => config,
        }
    }

    pub fn is_ab_test(&self) -> bool {
        matches!(self, ConfigDocument::AbTest(test) if test.ab_test_active)
    }

    /// Configuration that applies to `token_address`.
    ///
    /// Arm assignment is a pure function of the address, so a redelivered
    /// message always lands in the same arm.
    pub fn resolve(&self, token_address: &str) -> (ConfigArm, &AgentConfiguration) {
        match self {
            ConfigDocument::AbTest(test) if test.ab_test_active => {
                if rollout_bucket(token_address) < test.ab_test_percentage {
                    (ConfigArm::B, &test.config_b)
                } else {
                    (ConfigArm::A, &test.config_a)
                }
            }
            _ => (ConfigArm::A, self.base()),
        }
    }

    /// Configuration a recorded arm ran under. Arm B falls back to the base
    /// once the test is no longer active.
    pub fn for_arm(&self, arm: ConfigArm) -> &AgentConfiguration {
        match (self, arm) {
            (ConfigDocument::AbTest(test), ConfigArm::B) if test.ab_test_active => &test.config_b,
            _ => self.base(),
        }
    }

    pub fn validate(&self) -> Result<(), AgentConfigError> {
        match self {
            ConfigDocument::AbTest(test) => {
                test.config_a.validate()?;
                test.config_b.validate()
            }
            ConfigDocument::Single(config) => config.validate(),
        }
    }
}

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Stable position of a token in [0, 1).
///
/// 64-bit FNV-1a over the address bytes, so a token keeps its arm across
/// processes and builds.
pub fn rollout_bucket(token_address: &str) -> f64 {
    let hash = token_address
        .bytes()
        .fold(FNV_OFFSET_BASIS, |hash, byte| (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME));
    (hash % 10_000) as f64 / 10_000.0
}
