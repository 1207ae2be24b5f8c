//! Early adoption: how soon after migration the token was picked up, and how
//! crowded the destination venue is.

use chrono::{DateTime, Utc};

use crate::domain::analysis::tags;
use crate::domain::{Dimension, TokenCandidate};
use crate::scoring::{Assessment, FactorScorer, ScoringError};

#[derive(Debug, Clone, Copy, Default)]
pub struct EarlyAdoptionScorer;

impl FactorScorer for EarlyAdoptionScorer {
    fn dimension(&self) -> Dimension {
        Dimension::EarlyAdoption
    }

    fn evaluate(&self, candidate: &TokenCandidate, as_of: DateTime<Utc>) -> Result<Assessment, ScoringError> {
        let migrated_at = candidate
            .migrated_at
            .ok_or_else(|| ScoringError::insufficient("migration timestamp", 0.3))?;
        let hours = ((as_of - migrated_at).num_seconds() as f64 / 3600.0).max(0.0);

        let mut assessment = if hours <= 1.0 {
            Assessment::tagged(1.0, "Detected within the first hour")
        } else if hours <= 3.0 {
            Assessment::tagged(0.9, "Detected early (1-3h)")
        } else if hours <= 6.0 {
            Assessment::tagged(0.7, "Detected in first 6 hours")
        } else if hours <= 12.0 {
            Assessment::new(0.5)
        } else if hours <= 24.0 {
            Assessment::tagged(0.3, "Late detection (12-24h), low early edge")
        } else {
            Assessment::tagged(0.1, tags::LATE_DETECTION)
        };

        if let Some(venue) = &candidate.metrics.venue {
            if let Some(token_count) = venue.token_count {
                if token_count < 100 {
                    assessment.adjust(1.3, "Young venue with few listed tokens");
                } else if token_count < 500 {
                    assessment.adjust(1.1, "Venue not yet crowded");
                }
            }
            if let Some(daily) = venue.daily_migrations {
                if daily <= 5 {
                    assessment.adjust(1.2, "Few competing migrations today");
                } else if daily <= 10 {
                    assessment.adjust(1.1, "Moderate migration count today");
                }
            }
        }

        Ok(assessment)
    }
}
