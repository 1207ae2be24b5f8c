//! Destination quality: the venue the token migrated to.

use chrono::{DateTime, Utc};

use crate::domain::{Dimension, TokenCandidate, Venue};
use crate::scoring::{Assessment, FactorScorer, ScoringError};

/// PumpSwap is considered uncrowded below this many listed tokens
const PUMPSWAP_CROWDING_LIMIT: u64 = 1_000;
/// Raydium TVL above which the venue counts as deep
const RAYDIUM_DEEP_TVL_USD: f64 = 1e9;

#[derive(Debug, Clone, Copy, Default)]
pub struct DestinationQualityScorer;

impl FactorScorer for DestinationQualityScorer {
    fn dimension(&self) -> Dimension {
        Dimension::DestinationQuality
    }

    fn evaluate(&self, candidate: &TokenCandidate, _as_of: DateTime<Utc>) -> Result<Assessment, ScoringError> {
        let venue = candidate.metrics.venue.as_ref();

        let assessment = match &candidate.destination {
            Venue::PumpSwap => {
                let mut a = Assessment::tagged(0.8, "Migrated to PumpSwap");
                if venue.and_then(|v| v.token_count).is_some_and(|n| n < PUMPSWAP_CROWDING_LIMIT) {
                    a.adjust(1.2, "Uncrowded PumpSwap venue");
                }
                a
            }
            Venue::Raydium => {
                let mut a = Assessment::tagged(0.9, "Migrated to Raydium");
                if venue.and_then(|v| v.tvl_usd).is_some_and(|tvl| tvl > RAYDIUM_DEEP_TVL_USD) {
                    a.adjust(1.1, "Deep Raydium TVL");
                }
                a
            }
            Venue::Other(_) => Assessment::tagged(0.5, "Unknown migration destination (risk)"),
        };

        Ok(assessment)
    }
}
