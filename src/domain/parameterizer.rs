//! Trade Parameterizer
//!
//! Maps a quality score onto position size, stop-loss and take-profit via
//! three score tiers. A pure step function: better scores get tighter stops,
//! wider targets and larger positions.

use super::agent_config::TraderConfig;
use super::trade::TradeParameters;

/// Score tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Tier {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone)]
pub struct TradeParameterizer {
    config: TraderConfig,
}

impl TradeParameterizer {
    pub fn new(config: TraderConfig) -> Self {
        Self { config }
    }

    pub fn tier(&self, quality_score: u32) -> Tier {
        if quality_score >= self.config.high_score_threshold {
            Tier::High
        } else if quality_score >= self.config.medium_score_threshold {
            Tier::Medium
        } else {
            Tier::Low
        }
    }

    pub fn parameters(&self, quality_score: u32) -> TradeParameters {
        let c = &self.config;
        match self.tier(quality_score) {
            Tier::High => TradeParameters {
                stop_loss_pct: c.high_score_sl,
                take_profit_pct: c.high_score_tp,
                position_size_pct: c.high_score_position,
            },
            Tier::Medium => TradeParameters {
                stop_loss_pct: c.medium_score_sl,
                take_profit_pct: c.medium_score_tp,
                position_size_pct: c.medium_score_position,
            },
            Tier::Low => TradeParameters {
                stop_loss_pct: c.low_score_sl,
                take_profit_pct: c.low_score_tp,
                position_size_pct: c.low_score_position,
            },
        }
    }
}

impl Default for TradeParameterizer {
    fn default() -> Self {
        Self::new(TraderConfig::default())
    }
}
