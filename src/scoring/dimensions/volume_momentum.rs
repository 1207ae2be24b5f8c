//! Volume momentum: total volume since migration, trade sizes, acceleration
//! and trading activity.

use chrono::{DateTime, Utc};

use crate::domain::{Dimension, TokenCandidate};
use crate::scoring::stats;
use crate::scoring::{Assessment, FactorScorer, ScoringError};

#[derive(Debug, Clone, Copy, Default)]
pub struct VolumeMomentumScorer;

impl FactorScorer for VolumeMomentumScorer {
    fn dimension(&self) -> Dimension {
        Dimension::VolumeMomentum
    }

    fn evaluate(&self, candidate: &TokenCandidate, _as_of: DateTime<Utc>) -> Result<Assessment, ScoringError> {
        let metrics = &candidate.metrics;
        let volumes = metrics.volume_values();
        let total = match metrics.total_volume_usd {
            Some(total) => total,
            None if !volumes.is_empty() => volumes.iter().sum(),
            None => return Err(ScoringError::insufficient("volume data", 0.2)),
        };

        let mut assessment = if total >= 50_000.0 {
            Assessment::tagged(1.0, "Very high total volume")
        } else if total >= 20_000.0 {
            Assessment::tagged(0.8, "Strong total volume")
        } else if total >= 5_000.0 {
            Assessment::new(0.6)
        } else if total >= 1_000.0 {
            Assessment::new(0.4)
        } else {
            Assessment::tagged(0.2, "Low total volume")
        };

        let trade_count = metrics.trade_count.unwrap_or(0);
        if trade_count > 0 {
            let avg_trade = total / trade_count as f64;
            if avg_trade >= 1_000.0 {
                assessment.adjust(1.2, "Large average trade size");
            } else if avg_trade >= 500.0 {
                assessment.adjust(1.1, "Healthy average trade size");
            } else if avg_trade < 100.0 {
                assessment.adjust(0.8, "Small trades only, low conviction");
            }
        }

        if let Some(acceleration) = stats::half_over_half(&volumes) {
            if acceleration > 0.5 {
                assessment.adjust(1.3, "Volume accelerating sharply");
            } else if acceleration > 0.2 {
                assessment.adjust(1.1, "Volume accelerating");
            } else if acceleration < -0.2 {
                assessment.adjust(0.7, "Volume momentum in decline");
            }
        }

        if let Some(count) = metrics.trade_count {
            if count >= 20 {
                assessment.adjust(1.1, "Very active trading");
            } else if count >= 10 {
                assessment.tag("Active trading");
            } else if count < 5 {
                assessment.adjust(0.8, "Low trading activity");
            }
        }

        Ok(assessment)
    }
}
