//! Analysis Results
//!
//! Scored dimensions, composite analyses and the decisions handed to the
//! trader. Everything here is immutable once produced; re-analysing a token
//! creates a new `CompositeAnalysis`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

use super::agent_config::ConfigArm;
use super::trade::TradeParameters;

/// Tags with downstream meaning (mitigation keys off these)
pub mod tags {
    pub const LOW_LIQUIDITY: &str = "Low pool liquidity";
    pub const THIN_LIQUIDITY: &str = "Thin pool liquidity (risk)";
    pub const VERY_VOLATILE_PRICE: &str = "Very volatile price";
    pub const GENERIC_NAME: &str = "Generic name, originality risk";
    pub const LATE_DETECTION: &str = "Detected very late after migration (risk)";
    pub const TOTAL_FAILURE: &str = "Error in complete analysis";
}

/// A scored quality dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    LiquidityStability,
    PostMigrationVolume,
    SmartMoneyFollowing,
    MigrationTiming,
    DestinationQuality,
    EarlyAdoption,
    LiquidityGrowth,
    VolumeMomentum,
    PriceStability,
    CommunityInterest,
}

impl Dimension {
    pub const ALL: [Dimension; 10] = [
        Dimension::LiquidityStability,
        Dimension::PostMigrationVolume,
        Dimension::SmartMoneyFollowing,
        Dimension::MigrationTiming,
        Dimension::DestinationQuality,
        Dimension::EarlyAdoption,
        Dimension::LiquidityGrowth,
        Dimension::VolumeMomentum,
        Dimension::PriceStability,
        Dimension::CommunityInterest,
    ];

    /// Configuration key
    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::LiquidityStability => "liquidity_stability",
            Dimension::PostMigrationVolume => "post_migration_volume",
            Dimension::SmartMoneyFollowing => "smart_money_following",
            Dimension::MigrationTiming => "migration_timing",
            Dimension::DestinationQuality => "destination_quality",
            Dimension::EarlyAdoption => "early_adoption",
            Dimension::LiquidityGrowth => "liquidity_growth",
            Dimension::VolumeMomentum => "volume_momentum",
            Dimension::PriceStability => "price_stability",
            Dimension::CommunityInterest => "community_interest",
        }
    }

    /// Human label used in tags
    pub fn label(&self) -> &'static str {
        match self {
            Dimension::LiquidityStability => "liquidity stability",
            Dimension::PostMigrationVolume => "post-migration volume",
            Dimension::SmartMoneyFollowing => "smart money",
            Dimension::MigrationTiming => "migration timing",
            Dimension::DestinationQuality => "destination quality",
            Dimension::EarlyAdoption => "early adoption",
            Dimension::LiquidityGrowth => "liquidity growth",
            Dimension::VolumeMomentum => "volume momentum",
            Dimension::PriceStability => "price stability",
            Dimension::CommunityInterest => "community interest",
        }
    }
}

impl FromStr for Dimension {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = match s {
            "migration_destination_quality" => "destination_quality",
            other => other,
        };
        Dimension::ALL
            .iter()
            .copied()
            .find(|d| d.as_str() == key)
            .ok_or_else(|| format!("unknown dimension '{}'", s))
    }
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Bounded sub-score for one dimension plus the qualitative tags behind it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreFactor {
    pub dimension: Dimension,
    /// Always within [0, 1]
    pub value: f64,
    pub tags: Vec<String>,
}

impl ScoreFactor {
    pub fn new(dimension: Dimension, value: f64, tags: Vec<String>) -> Self {
        Self {
            dimension,
            value: clamp_unit(value),
            tags,
        }
    }
}

/// Clamp into [0, 1], mapping NaN to 0
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Recommended action band
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Recommendation {
    Avoid,
    Consider,
    Buy,
    StrongBuy,
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Recommendation::StrongBuy => "STRONG_BUY",
            Recommendation::Buy => "BUY",
            Recommendation::Consider => "CONSIDER",
            Recommendation::Avoid => "AVOID",
        };
        write!(f, "{}", s)
    }
}

/// Confidence attached to a recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Confidence::High => "HIGH",
            Confidence::Medium => "MEDIUM",
            Confidence::Low => "LOW",
        };
        write!(f, "{}", s)
    }
}

/// Full multi-factor analysis of one candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeAnalysis {
    pub token_address: String,
    #[serde(default)]
    pub symbol: Option<String>,
    /// Analyzer profile that produced this analysis
    pub profile: String,
    pub factors: Vec<ScoreFactor>,
    /// Weight per dimension key, summing to 1.0
    pub weights: BTreeMap<String, f64>,
    pub overall_score: f64,
    pub recommendation: Recommendation,
    pub confidence: Confidence,
    pub risk_factors: Vec<String>,
    pub opportunity_factors: Vec<String>,
    pub analyzed_at: DateTime<Utc>,
}

impl CompositeAnalysis {
    pub fn factor(&self, dimension: Dimension) -> Option<&ScoreFactor> {
        self.factors.iter().find(|f| f.dimension == dimension)
    }

    /// Quality score on the 0-100 scale used by tier thresholds
    pub fn quality_score(&self) -> u32 {
        quality_score(self.overall_score)
    }
}

/// Map a [0, 1] overall score onto the 0-100 quality scale
pub fn quality_score(overall_score: f64) -> u32 {
    (clamp_unit(overall_score) * 100.0).round() as u32
}

/// Decision published to the trader for candidates above the action threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeDecision {
    pub token_address: String,
    pub overall_score: f64,
    pub quality_score: u32,
    pub recommendation: Recommendation,
    pub confidence: Confidence,
    pub risk_factors: Vec<String>,
    pub opportunity_factors: Vec<String>,
    pub trade_parameters: TradeParameters,
    /// Configuration arm the decision was made under
    #[serde(default)]
    pub arm: ConfigArm,
    pub decided_at: DateTime<Utc>,
}
