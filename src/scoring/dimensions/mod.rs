//! Factor scorers, one per dimension
//!
//! | Dimension               | Inputs                                  |
//! |-------------------------|-----------------------------------------|
//! | liquidity stability     | liquidity series                        |
//! | post-migration volume   | volume series                           |
//! | smart money             | tracked wallet activity                 |
//! | migration timing        | market backdrop, migration hour         |
//! | destination quality     | destination venue and its stats         |
//! | early adoption          | detection delay, venue crowding         |
//! | liquidity growth        | pool snapshot, liquidity series         |
//! | volume momentum         | total volume, trade count, volume series|
//! | price stability         | pool snapshot, price series             |
//! | community interest      | social metrics, name and ticker         |

pub mod community_interest;
pub mod destination_quality;
pub mod early_adoption;
pub mod liquidity_growth;
pub mod liquidity_stability;
pub mod migration_timing;
pub mod post_migration_volume;
pub mod price_stability;
pub mod smart_money;
pub mod volume_momentum;

use std::sync::Arc;

use crate::domain::Dimension;
use crate::scoring::FactorScorer;

pub use community_interest::CommunityInterestScorer;
pub use destination_quality::DestinationQualityScorer;
pub use early_adoption::EarlyAdoptionScorer;
pub use liquidity_growth::LiquidityGrowthScorer;
pub use liquidity_stability::LiquidityStabilityScorer;
pub use migration_timing::MigrationTimingScorer;
pub use post_migration_volume::PostMigrationVolumeScorer;
pub use price_stability::PriceStabilityScorer;
pub use smart_money::SmartMoneyScorer;
pub use volume_momentum::VolumeMomentumScorer;

/// Default scorer for a dimension
pub fn scorer_for(dimension: Dimension) -> Arc<dyn FactorScorer> {
    match dimension {
        Dimension::LiquidityStability => Arc::new(LiquidityStabilityScorer),
        Dimension::PostMigrationVolume => Arc::new(PostMigrationVolumeScorer),
        Dimension::SmartMoneyFollowing => Arc::new(SmartMoneyScorer),
        Dimension::MigrationTiming => Arc::new(MigrationTimingScorer),
        Dimension::DestinationQuality => Arc::new(DestinationQualityScorer),
        Dimension::EarlyAdoption => Arc::new(EarlyAdoptionScorer),
        Dimension::LiquidityGrowth => Arc::new(LiquidityGrowthScorer),
        Dimension::VolumeMomentum => Arc::new(VolumeMomentumScorer),
        Dimension::PriceStability => Arc::new(PriceStabilityScorer),
        Dimension::CommunityInterest => Arc::new(CommunityInterestScorer::default()),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{DateTime, Duration, TimeZone, Utc};

    use crate::domain::{MetricBundle, MetricPoint, TokenCandidate, Venue};

    /// 2025-03-14 at the given UTC hour
    pub fn at_hour(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, hour, 0, 0)
            .single()
            .unwrap_or_else(|| panic!("invalid hour {}", hour))
    }

    /// Hourly points starting at midnight of the fixture day
    pub fn series(values: &[f64]) -> Vec<MetricPoint> {
        let start = at_hour(0);
        values
            .iter()
            .enumerate()
            .map(|(i, v)| MetricPoint::new(start + Duration::hours(i as i64), *v))
            .collect()
    }

    /// PumpSwap candidate with no timestamps beyond discovery and the
    /// metrics shaped by `shape`
    pub fn candidate_with(shape: impl FnOnce(&mut MetricBundle)) -> TokenCandidate {
        let mut metrics = MetricBundle::default();
        shape(&mut metrics);
        TokenCandidate::new("So1anaMintAddre55111111111111111111111111111", Venue::PumpSwap, at_hour(12))
            .with_metrics(metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::analysis::tags;
    use crate::domain::classifier::TagClassifier;
    use test_support::candidate_with;

    #[test]
    fn test_scorer_for_matches_dimension() {
        for dimension in Dimension::ALL {
            assert_eq!(scorer_for(dimension).dimension(), dimension);
        }
    }

    #[test]
    fn test_empty_candidate_degrades_everywhere() {
        let candidate = candidate_with(|_| {});
        for dimension in Dimension::ALL {
            let factor = scorer_for(dimension).score(&candidate, chrono::Utc::now());
            assert!((0.0..=1.0).contains(&factor.value), "{} out of range", dimension);
        }
    }

    #[test]
    fn test_tags_classify_as_intended() {
        let classifier = TagClassifier::default();

        let risks = [
            "Unsteady liquidity (risk)",
            "Highly volatile liquidity",
            "Liquidity decline since migration",
            "Thin post-migration volume (risk)",
            "Very low post-migration volume",
            "Volume decline after migration",
            "Erratic volume (risk)",
            "No smart wallet activity (risk)",
            "3 smart wallets selling (exit risk)",
            "Smart money interest is low",
            "SOL decline (risk)",
            "Memecoin volume decline",
            "Migrated off-peak, low attention",
            "Unknown migration destination (risk)",
            "Late detection (12-24h), low early edge",
            tags::LATE_DETECTION,
            tags::THIN_LIQUIDITY,
            tags::LOW_LIQUIDITY,
            "Low volume turnover",
            "Liquidity decline",
            "Low total volume",
            "Small trades only, low conviction",
            "Volume momentum in decline",
            "Low trading activity",
            "Moderately volatile price",
            tags::VERY_VOLATILE_PRICE,
            "Aggressive rally, possible pump risk",
            "Sharp price decline",
            "Historically volatile price",
            "Invalid pool price (risk)",
            "Low social interest",
            tags::GENERIC_NAME,
            tags::TOTAL_FAILURE,
            "Insufficient pool data",
        ];
        for tag in risks {
            assert!(classifier.is_risk(tag), "expected risk: {}", tag);
        }

        let opportunities = [
            "Very stable liquidity",
            "Stable liquidity",
            "Liquidity building since migration",
            "Very high post-migration volume",
            "High post-migration volume",
            "Rising volume trend",
            "4 smart wallets buying",
            "Strong smart money interest",
            "Strong SOL uptrend",
            "SOL trending up",
            "Memecoin volume rising",
            "Migrated during peak trading hours",
            "Migrated to PumpSwap",
            "Migrated to Raydium",
            "Uncrowded PumpSwap venue",
            "Deep Raydium TVL",
            "Detected within the first hour",
            "Detected early (1-3h)",
            "Detected in first 6 hours",
            "Young venue with few listed tokens",
            "Venue not yet crowded",
            "Few competing migrations today",
            "Moderate migration count today",
            "Deep pool liquidity",
            "Solid pool liquidity",
            "High volume turnover",
            "Healthy volume turnover",
            "Strong liquidity growth",
            "Liquidity growing",
            "Very high total volume",
            "Strong total volume",
            "Large average trade size",
            "Healthy average trade size",
            "Volume accelerating sharply",
            "Volume accelerating",
            "Very active trading",
            "Active trading",
            "Very stable price",
            "Stable price",
            "Controlled uptrend: +12.0%",
            "Calm historical price action",
            "Strong Twitter interest: 140 mentions",
            "Good Twitter interest: 60 mentions",
            "Active on all social platforms",
            "Active on two social platforms",
            "Clean, memorable ticker",
            "Professional name",
        ];
        for tag in opportunities {
            assert!(!classifier.is_risk(tag), "expected opportunity: {}", tag);
        }
    }
}
