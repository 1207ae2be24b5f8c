//! Risk Mitigation
//!
//! Turns the risk factors of an analysis into at most one mitigation action,
//! applied by the trader before it commits capital. The first matching rule
//! wins.

use serde::{Deserialize, Serialize};

use super::analysis::{tags, Recommendation};
use super::trade::TradeParameters;

/// Slippage multiplier for volatile tokens
pub const SLIPPAGE_WIDENING: f64 = 1.5;
/// Hard cap on widened slippage
pub const MAX_WIDENED_SLIPPAGE: f64 = 0.10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MitigationAction {
    ReducePositionSize,
    IncreaseSlippageTolerance,
    ReassessCommunityInterest,
    ReassessGrowthPotential,
    NoChange,
}

impl MitigationAction {
    /// Select the action for a set of risk factors
    pub fn select(risk_factors: &[String]) -> Self {
        let has = |tag: &str| risk_factors.iter().any(|r| r == tag);

        if has(tags::LOW_LIQUIDITY) || has(tags::THIN_LIQUIDITY) {
            MitigationAction::ReducePositionSize
        } else if has(tags::VERY_VOLATILE_PRICE) {
            MitigationAction::IncreaseSlippageTolerance
        } else if has(tags::GENERIC_NAME) {
            MitigationAction::ReassessCommunityInterest
        } else if has(tags::LATE_DETECTION) {
            MitigationAction::ReassessGrowthPotential
        } else {
            MitigationAction::NoChange
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MitigationAction::ReducePositionSize => "reduce_position_size",
            MitigationAction::IncreaseSlippageTolerance => "increase_slippage_tolerance",
            MitigationAction::ReassessCommunityInterest => "reassess_community_interest",
            MitigationAction::ReassessGrowthPotential => "reassess_growth_potential",
            MitigationAction::NoChange => "no_change",
        }
    }

    /// Apply to the planned execution. Returns `None` when the trade should
    /// be skipped.
    pub fn apply(&self, plan: ExecutionPlan, recommendation: Recommendation) -> Option<ExecutionPlan> {
        match self {
            MitigationAction::ReducePositionSize => Some(ExecutionPlan {
                parameters: TradeParameters {
                    position_size_pct: plan.parameters.position_size_pct / 2.0,
                    ..plan.parameters
                },
                ..plan
            }),
            MitigationAction::IncreaseSlippageTolerance => Some(ExecutionPlan {
                max_slippage: (plan.max_slippage * SLIPPAGE_WIDENING).min(MAX_WIDENED_SLIPPAGE),
                ..plan
            }),
            MitigationAction::ReassessCommunityInterest | MitigationAction::ReassessGrowthPotential => {
                if recommendation >= Recommendation::Buy {
                    Some(plan)
                } else {
                    None
                }
            }
            MitigationAction::NoChange => Some(plan),
        }
    }
}

impl std::fmt::Display for MitigationAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Sizing and execution limits for one buy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExecutionPlan {
    pub parameters: TradeParameters,
    pub max_slippage: f64,
}
