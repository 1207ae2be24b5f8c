//! Post-migration volume: average traded volume since migration, adjusted
//! for its trend and how consistent it has been.

use chrono::{DateTime, Utc};

use crate::domain::{Dimension, TokenCandidate};
use crate::scoring::stats;
use crate::scoring::{Assessment, FactorScorer, ScoringError};

#[derive(Debug, Clone, Copy, Default)]
pub struct PostMigrationVolumeScorer;

impl FactorScorer for PostMigrationVolumeScorer {
    fn dimension(&self) -> Dimension {
        Dimension::PostMigrationVolume
    }

    fn evaluate(&self, candidate: &TokenCandidate, _as_of: DateTime<Utc>) -> Result<Assessment, ScoringError> {
        let values = candidate.metrics.volume_values();
        if values.is_empty() {
            return Err(ScoringError::insufficient("volume history", 0.0));
        }
        if values.len() < 3 {
            return Err(ScoringError::insufficient("volume history", 0.3));
        }

        let average = stats::mean(&values).unwrap_or(0.0);
        let mut assessment = if average > 100_000.0 {
            Assessment::tagged(1.0, "Very high post-migration volume")
        } else if average > 50_000.0 {
            Assessment::tagged(0.8, "High post-migration volume")
        } else if average > 10_000.0 {
            Assessment::new(0.6)
        } else if average > 1_000.0 {
            Assessment::tagged(0.4, "Thin post-migration volume (risk)")
        } else {
            Assessment::tagged(0.2, "Very low post-migration volume")
        };

        let slope = stats::linear_slope(&values)
            .ok_or_else(|| ScoringError::Computation("volume trend undefined".to_string()))?;
        let trend = slope / (average + 1.0);
        if trend > 0.1 {
            assessment.adjust(1.3, "Rising volume trend");
        } else if trend < -0.1 {
            assessment.adjust(0.7, "Volume decline after migration");
        }

        let std = stats::population_std(&values).unwrap_or(0.0);
        let consistency = 1.0 - std / (average + 1.0);
        assessment.scale(consistency);
        if consistency < 0.5 {
            assessment.tag("Erratic volume (risk)");
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
        let candidate = candidate_with(|m| m.volume_series = series(values));
        PostMigrationVolumeScorer.score(&candidate, Utc::now())
    }

    #[test]
    fn test_degraded_inputs() {
        assert_eq!(score(&[]).value, 0.0);
        assert_eq!(score(&[50_000.0, 60_000.0]).value, 0.3);
    }

    #[test]
    fn test_flat_high_volume() {
        // flat series: no trend, consistency 1.0
        let factor = score(&[150_000.0, 150_000.0, 150_000.0]);
        assert_relative_eq!(factor.value, 1.0);
        assert_eq!(factor.tags, vec!["Very high post-migration volume"]);
    }

    #[test]
    fn test_flat_mid_volume() {
        let factor = score(&[20_000.0, 20_000.0, 20_000.0, 20_000.0]);
        assert_relative_eq!(factor.value, 0.6);
        assert!(factor.tags.is_empty());
    }

    #[test]
    fn test_trend_and_consistency() {
        // mean 2000, slope 1000, trend ~0.5 -> x1.3
        // population std ~816.5 -> consistency ~0.592
        let factor = score(&[1_000.0, 2_000.0, 3_000.0]);
        let std = (2.0f64 / 3.0).sqrt() * 1_000.0;
        let expected = 0.4 * 1.3 * (1.0 - std / 2_001.0);
        assert_relative_eq!(factor.value, expected, epsilon = 1e-9);
        assert!(factor.tags.contains(&"Rising volume trend".to_string()));
    }

    #[test]
    fn test_erratic_volume_can_floor_at_zero() {
        let factor = score(&[0.0, 0.0, 9_000.0]);
        assert!(factor.value >= 0.0 && factor.value <= 1.0);
        assert!(factor.tags.contains(&"Erratic volume (risk)".to_string()));
    }
}
