//! Trader Stage
//!
//! Turns trade decisions into open trades. A decision is skipped when its
//! quality score is below the buy gate, when the token already has an open
//! trade, or when the risk mitigation for its tags says so. Otherwise the
//! position is sized from trading capital, bought through the execution port
//! and recorded.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::Rng;
use thiserror::Error;
use tracing::{error, info, warn};

use super::context::{bounded, PipelineContext};
use crate::domain::{ConfigDocument, ExecutionPlan, MitigationAction, Trade, TradeDecision};
use crate::ports::{topics, Delivery, OrderRequest, PortError};

#[derive(Debug, Error)]
pub enum TraderError {
    #[error("Port error: {0}")]
    Port(#[from] PortError),
    #[error("Malformed decision: {0}")]
    Malformed(String),
    #[error("Bought {token_address} ({signature}) but failed to record the trade: {source}")]
    Unrecorded {
        token_address: String,
        signature: String,
        source: PortError,
    },
}

impl TraderError {
    /// Worth another delivery attempt. Nothing was bought for these.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TraderError::Port(e) if e.is_transient())
    }
}

/// Why a decision did not open a trade
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    BelowQualityThreshold { quality_score: u32, threshold: u32 },
    AlreadyOpen,
    Mitigation(MitigationAction),
    PositionTooSmall(f64),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::BelowQualityThreshold { quality_score, threshold } => {
                write!(f, "quality {} below buy threshold {}", quality_score, threshold)
            }
            SkipReason::AlreadyOpen => write!(f, "token already has an open trade"),
            SkipReason::Mitigation(action) => write!(f, "mitigation {} vetoed the buy", action),
            SkipReason::PositionTooSmall(amount) => write!(f, "position size ${:.2} too small", amount),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TradeOutcome {
    Opened(Trade),
    Skipped(SkipReason),
}

/// Counts for one trader batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TradeSummary {
    pub opened: usize,
    pub skipped: usize,
    pub failed: usize,
    pub retried: usize,
}

pub struct Trader {
    ctx: Arc<PipelineContext>,
}

impl Trader {
    pub fn new(ctx: Arc<PipelineContext>) -> Self {
        Self { ctx }
    }

    /// Act on one decision under the configuration of its arm
    pub async fn execute(
        &self,
        decision: &TradeDecision,
        document: &ConfigDocument,
        now: DateTime<Utc>,
    ) -> Result<TradeOutcome, TraderError> {
        let config = document.for_arm(decision.arm);
        let settings = &self.ctx.settings;
        let token = decision.token_address.as_str();

        let threshold = config.analyzer.quality_score_threshold;
        if decision.quality_score < threshold {
            info!(
                "Considered {} (quality {}, {}), not buying below {}",
                token, decision.quality_score, decision.recommendation, threshold
            );
            return Ok(TradeOutcome::Skipped(SkipReason::BelowQualityThreshold {
                quality_score: decision.quality_score,
                threshold,
            }));
        }

        if bounded(settings.store_timeout, "open trade lookup", self.ctx.trades.has_open_trade(token)).await? {
            info!("Skipping {}: already holding an open trade", token);
            return Ok(TradeOutcome::Skipped(SkipReason::AlreadyOpen));
        }

        let action = MitigationAction::select(&decision.risk_factors);
        let plan = ExecutionPlan {
            parameters: decision.trade_parameters,
            max_slippage: config.trader.max_slippage,
        };
        let Some(plan) = action.apply(plan, decision.recommendation) else {
            info!("Skipping {}: {} requires a BUY recommendation, got {}", token, action, decision.recommendation);
            return Ok(TradeOutcome::Skipped(SkipReason::Mitigation(action)));
        };
        if action != MitigationAction::NoChange {
            info!("Applying {} to {}", action, token);
        }

        let amount_usd = settings.capital_usd * plan.parameters.position_size_pct;
        if !(amount_usd > 0.0) {
            return Ok(TradeOutcome::Skipped(SkipReason::PositionTooSmall(amount_usd)));
        }

        let price = bounded(settings.price_timeout, "price lookup", self.ctx.prices.price_usd(token)).await?;
        let order = OrderRequest::new(token, amount_usd, price, plan.max_slippage);
        let fill = bounded(settings.execution_timeout, "buy", self.ctx.execution.buy(&order)).await?;

        let trade = Trade::open(new_trade_id(now), token, fill.price, fill.amount_usd, plan.parameters, now)
            .with_quality_score(decision.quality_score)
            .with_arm(decision.arm)
            .with_signature(fill.signature.clone());

        let inserted = bounded(settings.store_timeout, "trade insert", self.ctx.trades.insert_open(trade.clone()))
            .await
            .map_err(|source| TraderError::Unrecorded {
                token_address: token.to_string(),
                signature: fill.signature.clone(),
                source,
            })?;
        if !inserted {
            // Another writer opened this token between the check and the buy
            error!("Bought {} ({}) but an open trade already exists", token, fill.signature);
            return Ok(TradeOutcome::Skipped(SkipReason::AlreadyOpen));
        }

        info!(
            "Opened {} on {}: ${:.2} @ {:.8}, SL {:.8} TP {:.8} [arm {}]",
            trade.trade_id,
            token,
            trade.amount_usd,
            trade.entry_price,
            trade.parameters.stop_loss_price(trade.entry_price),
            trade.parameters.take_profit_price(trade.entry_price),
            trade.arm
        );
        Ok(TradeOutcome::Opened(trade))
    }

    /// Drain up to `batch_size` decisions from the queue
    pub async fn process_batch(&self, now: DateTime<Utc>) -> Result<TradeSummary, TraderError> {
        let document = self.ctx.load_document().await?;

        let mut summary = TradeSummary::default();
        for _ in 0..self.ctx.settings.batch_size {
            let Some(delivery) = self.ctx.queue.receive(topics::DECISIONS).await? else {
                break;
            };
            self.handle(delivery, &document, now, &mut summary).await?;
        }

        if summary != TradeSummary::default() {
            info!(
                "Trader batch: {} opened, {} skipped, {} failed, {} retried",
                summary.opened, summary.skipped, summary.failed, summary.retried
            );
        }
        Ok(summary)
    }

    async fn handle(
        &self,
        delivery: Delivery,
        document: &ConfigDocument,
        now: DateTime<Utc>,
        summary: &mut TradeSummary,
    ) -> Result<(), TraderError> {
        let queue = &self.ctx.queue;

        let decision: TradeDecision = match serde_json::from_value(delivery.payload.clone()) {
            Ok(decision) => decision,
            Err(e) => {
                warn!("Dropping decision message {}: {}", delivery.id, TraderError::Malformed(e.to_string()));
                summary.failed += 1;
                queue.ack(delivery.id).await?;
                return Ok(());
            }
        };

        match self.execute(&decision, document, now).await {
            Ok(TradeOutcome::Opened(_)) => summary.opened += 1,
            Ok(TradeOutcome::Skipped(_)) => summary.skipped += 1,
            Err(e) if e.is_retryable() && delivery.attempts < self.ctx.settings.max_delivery_attempts => {
                warn!("Buy of {} failed, will retry: {}", decision.token_address, e);
                summary.retried += 1;
                queue.nack(delivery.id).await?;
                return Ok(());
            }
            Err(e) => {
                error!("Buy of {} failed: {}", decision.token_address, e);
                summary.failed += 1;
            }
        }

        queue.ack(delivery.id).await?;
        Ok(())
    }
}

fn new_trade_id(now: DateTime<Utc>) -> String {
    let suffix: u32 = rand::thread_rng().gen();
    format!("trade_{}_{:08x}", now.format("%Y%m%d%H%M%S"), suffix)
}
