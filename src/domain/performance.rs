//! Performance Aggregation
//!
//! Realized metrics over closed trades. Open trades count toward
//! `total_trades` but contribute nothing else.
//!
//! Drawdown is measured on the cumulative P&L curve relative to its running
//! maximum. The denominator is `|running_max|`, and points where the running
//! maximum is exactly zero contribute no drawdown.

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::BTreeMap;

use super::agent_config::ConfigArm;
use super::trade::{Trade, TradeStatus};

/// Aggregate metrics over a set of trades
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// Trades in the input set, open or closed
    pub total_trades: usize,
    pub closed_trades: usize,
    /// Fraction of closed trades with pnl > 0
    pub win_rate: f64,
    pub avg_pnl: f64,
    pub total_pnl: f64,
    /// Worst relative drop from the running peak, as a non-positive fraction
    pub max_drawdown: f64,
    /// Mean pnl over its sample standard deviation
    pub sharpe_ratio: f64,
    pub avg_trade_duration_hours: f64,
}

/// Compute metrics over `trades`
pub fn aggregate(trades: &[Trade]) -> PerformanceMetrics {
    let mut closed: Vec<&Trade> = trades
        .iter()
        .filter(|t| t.status == TradeStatus::Closed && t.pnl.is_some())
        .collect();

    let mut metrics = PerformanceMetrics {
        total_trades: trades.len(),
        ..PerformanceMetrics::default()
    };
    if closed.is_empty() {
        return metrics;
    }

    closed.sort_by(|a, b| {
        a.exit_time
            .cmp(&b.exit_time)
            .then_with(|| a.entry_time.cmp(&b.entry_time))
    });

    let pnls: Vec<f64> = closed.iter().filter_map(|t| t.pnl).collect();
    let wins = pnls.iter().filter(|p| **p > 0.0).count();

    metrics.closed_trades = pnls.len();
    metrics.win_rate = wins as f64 / pnls.len() as f64;
    metrics.total_pnl = pnls.iter().sum();
    metrics.avg_pnl = metrics.total_pnl / pnls.len() as f64;
    metrics.max_drawdown = max_drawdown(&pnls);
    metrics.sharpe_ratio = sharpe_ratio(&pnls);

    let durations: Vec<f64> = closed.iter().filter_map(|t| t.duration_hours()).collect();
    if !durations.is_empty() {
        metrics.avg_trade_duration_hours = durations.iter().sum::<f64>() / durations.len() as f64;
    }

    metrics
}

/// Metrics per A/B arm
pub fn aggregate_by_arm(trades: &[Trade]) -> BTreeMap<String, PerformanceMetrics> {
    let mut by_arm: BTreeMap<String, Vec<Trade>> = BTreeMap::new();
    for trade in trades {
        by_arm.entry(trade.arm.to_string()).or_default().push(trade.clone());
    }
    for arm in [ConfigArm::A, ConfigArm::B] {
        by_arm.entry(arm.to_string()).or_default();
    }
    by_arm
        .into_iter()
        .map(|(arm, trades)| (arm, aggregate(&trades)))
        .collect()
}

fn max_drawdown(pnls: &[f64]) -> f64 {
    let mut cumulative = 0.0;
    let mut running_max = f64::NEG_INFINITY;
    let mut worst: f64 = 0.0;

    for pnl in pnls {
        cumulative += pnl;
        running_max = running_max.max(cumulative);
        if running_max != 0.0 {
            let drawdown = (cumulative - running_max) / running_max.abs();
            worst = worst.min(drawdown);
        }
    }
    worst
}

fn sharpe_ratio(pnls: &[f64]) -> f64 {
    if pnls.len() < 2 {
        return 0.0;
    }
    let mean = pnls.iter().mean();
    let std = pnls.iter().std_dev();
    if std.is_finite() && std > 0.0 {
        mean / std
    } else {
        0.0
    }
}
