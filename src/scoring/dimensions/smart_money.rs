//! Smart money following: share of tracked wallets active on the token and
//! whether they are accumulating or exiting.

use chrono::{DateTime, Utc};

use crate::domain::{Dimension, TokenCandidate};
use crate::scoring::{Assessment, FactorScorer, ScoringError};

#[derive(Debug, Clone, Copy, Default)]
pub struct SmartMoneyScorer;

impl FactorScorer for SmartMoneyScorer {
    fn dimension(&self) -> Dimension {
        Dimension::SmartMoneyFollowing
    }

    fn evaluate(&self, candidate: &TokenCandidate, _as_of: DateTime<Utc>) -> Result<Assessment, ScoringError> {
        let activity = candidate
            .metrics
            .smart_money
            .as_ref()
            .ok_or_else(|| ScoringError::insufficient("smart money data", 0.2))?;

        let active = activity.active_wallets();
        if active == 0 {
            return Ok(Assessment::tagged(0.2, "No smart wallet activity (risk)"));
        }
        if activity.tracked_wallets == 0 {
            return Err(ScoringError::Computation(
                "wallet activity reported with no tracked wallets".to_string(),
            ));
        }

        let ratio = (active as f64 / activity.tracked_wallets as f64).min(1.0);
        let (direction, tag) = if activity.buying_wallets > activity.selling_wallets {
            (1.0, format!("{} smart wallets buying", activity.buying_wallets))
        } else if activity.buying_wallets == activity.selling_wallets {
            (0.6, "Smart wallets split between buying and selling".to_string())
        } else {
            (0.3, format!("{} smart wallets selling (exit risk)", activity.selling_wallets))
        };

        let value = ratio * direction;
        let mut assessment = Assessment::tagged(value, tag);
        if value > 0.7 {
            assessment.tag("Strong smart money interest");
        } else if value < 0.3 {
            assessment.tag("Smart money interest is low");
        }
        Ok(assessment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SmartMoneyActivity;
    use crate::scoring::dimensions::test_support::candidate_with;
    use approx::assert_relative_eq;

    fn score(activity: Option<SmartMoneyActivity>) -> crate::domain::ScoreFactor {
        let candidate = candidate_with(|m| m.smart_money = activity.clone());
        SmartMoneyScorer.score(&candidate, Utc::now())
    }

    fn activity(tracked: u32, buying: u32, selling: u32) -> Option<SmartMoneyActivity> {
        Some(SmartMoneyActivity { tracked_wallets: tracked, buying_wallets: buying, selling_wallets: selling })
    }

    #[test]
    fn test_missing_and_idle() {
        assert_eq!(score(None).value, 0.2);
        assert_eq!(score(None).tags, vec!["Insufficient smart money data"]);
        assert_eq!(score(activity(50, 0, 0)).value, 0.2);
    }

    #[test]
    fn test_accumulation() {
        let factor = score(activity(10, 8, 1));
        assert_relative_eq!(factor.value, 0.9);
        assert_eq!(factor.tags, vec!["8 smart wallets buying", "Strong smart money interest"]);
    }

    #[test]
    fn test_balanced() {
        let factor = score(activity(10, 3, 3));
        assert_relative_eq!(factor.value, 0.36, epsilon = 1e-12);
    }

    #[test]
    fn test_exiting() {
        let factor = score(activity(20, 1, 5));
        assert_relative_eq!(factor.value, 0.09, epsilon = 1e-12);
        assert!(factor.tags.contains(&"5 smart wallets selling (exit risk)".to_string()));
        assert!(factor.tags.contains(&"Smart money interest is low".to_string()));
    }

    #[test]
    fn test_no_tracked_wallets_is_error() {
        let factor = score(activity(0, 2, 0));
        assert_eq!(factor.value, 0.0);
        assert!(factor.tags[0].starts_with("Error in smart money analysis"));
    }
}
