//! Liquidity stability: how steady pool liquidity has been since migration,
//! measured by its coefficient of variation, with a bonus or penalty for the
//! direction liquidity has moved.

use chrono::{DateTime, Utc};
use statrs::statistics::Statistics;

use crate::domain::{Dimension, TokenCandidate};
use crate::scoring::stats;
use crate::scoring::{Assessment, FactorScorer, ScoringError};

/// Points needed before the trend adjustment applies
const TREND_MIN_POINTS: usize = 5;
/// Points compared at each end of the series for the trend
const TREND_WINDOW: usize = 3;

#[derive(Debug, Clone, Copy, Default)]
pub struct LiquidityStabilityScorer;

impl FactorScorer for LiquidityStabilityScorer {
    fn dimension(&self) -> Dimension {
        Dimension::LiquidityStability
    }

    fn evaluate(&self, candidate: &TokenCandidate, _as_of: DateTime<Utc>) -> Result<Assessment, ScoringError> {
        let values = candidate.metrics.liquidity_values();
        if values.is_empty() {
            return Err(ScoringError::insufficient("liquidity history", 0.0));
        }
        if values.len() < 2 {
            return Err(ScoringError::insufficient("liquidity history", 0.3));
        }

        let mean = stats::mean(&values).unwrap_or(0.0);
        if mean == 0.0 {
            return Err(ScoringError::Computation("mean liquidity is zero".to_string()));
        }
        let cv = stats::population_std(&values).unwrap_or(0.0) / mean;

        let mut assessment = if cv < 0.1 {
            Assessment::tagged(1.0, "Very stable liquidity")
        } else if cv < 0.2 {
            Assessment::tagged(0.8, "Stable liquidity")
        } else if cv < 0.4 {
            Assessment::new(0.6)
        } else if cv < 0.6 {
            Assessment::tagged(0.4, "Unsteady liquidity (risk)")
        } else {
            Assessment::tagged(0.2, "Highly volatile liquidity")
        };

        if values.len() >= TREND_MIN_POINTS {
            let early = values[..TREND_WINDOW].iter().mean();
            let recent = values[values.len() - TREND_WINDOW..].iter().mean();
            if recent > early * 1.1 {
                assessment.adjust(1.2, "Liquidity building since migration");
            } else if recent < early * 0.9 {
                assessment.adjust(0.8, "Liquidity decline since migration");
            }
        }

        Ok(assessment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::dimensions::test_support::{candidate_with, series};
    use approx::assert_relative_eq;

    fn score(values: &[f64]) -> crate::domain::ScoreFactor {
        let candidate = candidate_with(|m| m.liquidity_series = series(values));
        LiquidityStabilityScorer.score(&candidate, Utc::now())
    }

    #[test]
    fn test_degraded_inputs() {
        assert_eq!(score(&[]).value, 0.0);
        assert_eq!(score(&[5000.0]).value, 0.3);
        assert_eq!(score(&[5000.0]).tags, vec!["Insufficient liquidity history"]);
    }

    #[test]
    fn test_zero_mean_is_error() {
        let factor = score(&[0.0, 0.0, 0.0]);
        assert_eq!(factor.value, 0.0);
        assert!(factor.tags[0].starts_with("Error in liquidity stability analysis"));
    }

    #[test]
    fn test_cv_ladder() {
        assert_eq!(score(&[100.0, 100.0, 100.0]).value, 1.0);
        // mean 100, population std 15 -> cv 0.15
        assert_relative_eq!(score(&[85.0, 115.0]).value, 0.8);
        // cv 0.3
        assert_relative_eq!(score(&[70.0, 130.0]).value, 0.6);
        // cv 0.5
        assert_relative_eq!(score(&[50.0, 150.0]).value, 0.4);
        // cv 0.9
        assert_relative_eq!(score(&[10.0, 190.0]).value, 0.2);
    }

    #[test]
    fn test_rising_trend_bonus() {
        // cv ~0.14 with a clear rise: 0.8 * 1.2
        let factor = score(&[80.0, 85.0, 90.0, 100.0, 110.0, 115.0, 120.0]);
        assert!(factor.tags.contains(&"Liquidity building since migration".to_string()));
        assert_relative_eq!(factor.value, 0.96, epsilon = 1e-9);
    }

    #[test]
    fn test_falling_trend_penalty() {
        let factor = score(&[120.0, 115.0, 110.0, 100.0, 90.0, 85.0, 80.0]);
        assert!(factor.tags.contains(&"Liquidity decline since migration".to_string()));
        assert_relative_eq!(factor.value, 0.64, epsilon = 1e-9);
    }

    #[test]
    fn test_trend_ignored_below_five_points() {
        let factor = score(&[90.0, 100.0, 115.0, 120.0]);
        assert!(!factor.tags.iter().any(|t| t.contains("since migration")));
    }
}
