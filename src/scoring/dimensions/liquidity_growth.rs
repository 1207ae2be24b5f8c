//! Liquidity growth: current pool depth, turnover, and how liquidity has
//! grown across the observed series.

use chrono::{DateTime, Utc};

use crate::domain::analysis::tags;
use crate::domain::{Dimension, TokenCandidate};
use crate::scoring::stats;
use crate::scoring::{Assessment, FactorScorer, ScoringError};

#[derive(Debug, Clone, Copy, Default)]
pub struct LiquidityGrowthScorer;

impl FactorScorer for LiquidityGrowthScorer {
    fn dimension(&self) -> Dimension {
        Dimension::LiquidityGrowth
    }

    fn evaluate(&self, candidate: &TokenCandidate, _as_of: DateTime<Utc>) -> Result<Assessment, ScoringError> {
        let pool = candidate
            .metrics
            .pool
            .as_ref()
            .ok_or_else(|| ScoringError::insufficient("pool data", 0.3))?;

        let liquidity = pool.liquidity_usd;
        let mut assessment = if liquidity >= 10_000.0 {
            Assessment::tagged(1.0, "Deep pool liquidity")
        } else if liquidity >= 5_000.0 {
            Assessment::tagged(0.8, "Solid pool liquidity")
        } else if liquidity >= 1_000.0 {
            Assessment::new(0.6)
        } else if liquidity >= 500.0 {
            Assessment::tagged(0.4, tags::THIN_LIQUIDITY)
        } else {
            Assessment::tagged(0.2, tags::LOW_LIQUIDITY)
        };

        if liquidity > 0.0 {
            let turnover = pool.volume_24h_usd / liquidity;
            if turnover > 2.0 {
                assessment.adjust(1.3, "High volume turnover");
            } else if turnover > 1.0 {
                assessment.adjust(1.1, "Healthy volume turnover");
            } else if turnover < 0.1 {
                assessment.adjust(0.7, "Low volume turnover");
            }
        }

        if let Some(growth) = stats::relative_change(&candidate.metrics.liquidity_values()) {
            if growth > 0.2 {
                assessment.adjust(1.2, "Strong liquidity growth");
            } else if growth > 0.1 {
                assessment.adjust(1.1, "Liquidity growing");
            } else if growth < -0.1 {
                assessment.adjust(0.8, "Liquidity decline");
            }
        }

        Ok(assessment)
    }
}
