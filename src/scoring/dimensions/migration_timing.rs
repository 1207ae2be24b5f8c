//! Migration timing: broad market backdrop when the token migrated.

use chrono::{DateTime, Timelike, Utc};

use crate::domain::{Dimension, TokenCandidate};
use crate::scoring::{Assessment, FactorScorer, ScoringError};

/// UTC hours with overlapping US/EU activity (inclusive)
const PEAK_HOURS: std::ops::RangeInclusive<u32> = 13..=21;
/// UTC hours with thin participation (inclusive)
const OFF_PEAK_HOURS: std::ops::RangeInclusive<u32> = 2..=6;

#[derive(Debug, Clone, Copy, Default)]
pub struct MigrationTimingScorer;

impl FactorScorer for MigrationTimingScorer {
    fn dimension(&self) -> Dimension {
        Dimension::MigrationTiming
    }

    fn evaluate(&self, candidate: &TokenCandidate, _as_of: DateTime<Utc>) -> Result<Assessment, ScoringError> {
        let migrated_at = candidate
            .migrated_at
            .ok_or_else(|| ScoringError::insufficient("migration timestamp", 0.3))?;
        let market = candidate
            .metrics
            .market
            .as_ref()
            .ok_or_else(|| ScoringError::insufficient("market conditions", 0.3))?;

        let sol = market.sol_price_trend;
        let mut assessment = if sol > 0.05 {
            Assessment::tagged(1.0, "Strong SOL uptrend")
        } else if sol > 0.0 {
            Assessment::tagged(0.8, "SOL trending up")
        } else if sol > -0.05 {
            Assessment::new(0.6)
        } else {
            Assessment::tagged(0.4, "SOL decline (risk)")
        };

        let meme_volume = market.memecoin_volume_trend;
        if meme_volume > 0.1 {
            assessment.adjust(1.2, "Memecoin volume rising");
        } else if meme_volume < -0.1 {
            assessment.adjust(0.8, "Memecoin volume decline");
        }

        let hour = migrated_at.hour();
        if PEAK_HOURS.contains(&hour) {
            assessment.adjust(1.1, "Migrated during peak trading hours");
        } else if OFF_PEAK_HOURS.contains(&hour) {
            assessment.adjust(0.9, "Migrated off-peak, low attention");
        }

        Ok(assessment)
    }
}
