//! Price stability: size and direction of the 24h move, plus historical
//! return volatility.

use chrono::{DateTime, Utc};

use crate::domain::analysis::tags;
use crate::domain::{Dimension, TokenCandidate};
use crate::scoring::stats;
use crate::scoring::{Assessment, FactorScorer, ScoringError};

#[derive(Debug, Clone, Copy, Default)]
pub struct PriceStabilityScorer;

impl FactorScorer for PriceStabilityScorer {
    fn dimension(&self) -> Dimension {
        Dimension::PriceStability
    }

    fn evaluate(&self, candidate: &TokenCandidate, _as_of: DateTime<Utc>) -> Result<Assessment, ScoringError> {
        let pool = candidate
            .metrics
            .pool
            .as_ref()
            .ok_or_else(|| ScoringError::insufficient("pool data", 0.3))?;

        if pool.price_usd <= 0.0 {
            return Ok(Assessment::tagged(0.1, "Invalid pool price (risk)"));
        }

        let change = pool.price_change_24h;
        let mut assessment = match change.abs() {
            c if c <= 0.1 => Assessment::tagged(1.0, "Very stable price"),
            c if c <= 0.2 => Assessment::tagged(0.8, "Stable price"),
            c if c <= 0.3 => Assessment::new(0.6),
            c if c <= 0.5 => Assessment::tagged(0.4, "Moderately volatile price"),
            _ => Assessment::tagged(0.2, tags::VERY_VOLATILE_PRICE),
        };

        if change > 0.0 && change <= 0.3 {
            assessment.adjust(1.2, format!("Controlled uptrend: +{:.1}%", change * 100.0));
        } else if change > 0.5 {
            assessment.adjust(0.8, "Aggressive rally, possible pump risk");
        } else if change < -0.3 {
            assessment.adjust(0.7, "Sharp price decline");
        }

        if let Some(volatility) = stats::return_volatility(&candidate.metrics.price_values()) {
            if volatility < 0.2 {
                assessment.adjust(1.1, "Calm historical price action");
            } else if volatility > 0.6 {
                assessment.adjust(0.8, "Historically volatile price");
            }
        }

        Ok(assessment)
    }
}
