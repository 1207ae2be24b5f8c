//! Analyzer Stage
//!
//! Consumes candidates from the discovery topic, scores each one with the
//! composite model of the configuration arm it resolves to, records the
//! analysis and publishes a trade decision when the overall score clears the
//! action threshold.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::context::{bounded, PipelineContext};
use crate::domain::{
    AgentConfigError, CompositeAnalysis, ConfigDocument, TokenCandidate, TradeDecision, TradeParameterizer,
    ValidationError, Venue,
};
use crate::ports::{topics, Delivery, PortError};
use crate::scoring::{CompositeError, CompositeScorer};

#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("Invalid candidate: {0}")]
    Validation(#[from] ValidationError),
    #[error("Invalid analyzer configuration: {0}")]
    Config(#[from] CompositeError),
    #[error("Port error: {0}")]
    Port(#[from] PortError),
}

impl From<AgentConfigError> for AnalyzerError {
    fn from(err: AgentConfigError) -> Self {
        AnalyzerError::Config(CompositeError::Config(err))
    }
}

/// Counts for one analyzer batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnalyzeSummary {
    pub analyzed: usize,
    pub decisions: usize,
    /// Messages without a token address and messages out of delivery attempts
    pub dropped: usize,
    /// Returned to the queue for another attempt
    pub retried: usize,
}

pub struct Analyzer {
    ctx: Arc<PipelineContext>,
}

impl Analyzer {
    pub fn new(ctx: Arc<PipelineContext>) -> Self {
        Self { ctx }
    }

    /// Score one candidate under `document`.
    ///
    /// Returns the analysis and, when the score clears the action threshold
    /// of the candidate's arm, the decision to hand to the trader. The
    /// analysis is recorded on a best-effort basis.
    pub async fn analyze(
        &self,
        candidate: TokenCandidate,
        document: &ConfigDocument,
        now: DateTime<Utc>,
    ) -> Result<(CompositeAnalysis, Option<TradeDecision>), AnalyzerError> {
        candidate.validate()?;

        let (arm, config) = document.resolve(&candidate.token_address);
        let scorer = CompositeScorer::from_config(&config.analyzer)?
            .with_scorer_timeout(self.ctx.settings.scorer_timeout);

        let label = candidate.label();
        let analysis = scorer.analyze(Arc::new(candidate), now).await;
        debug!(
            "{} factors: {}",
            label,
            analysis
                .factors
                .iter()
                .map(|f| format!("{}={:.2}", f.dimension, f.value))
                .collect::<Vec<_>>()
                .join(" ")
        );

        if let Err(e) = bounded(
            self.ctx.settings.store_timeout,
            "analysis record",
            self.ctx.analyses.record(&analysis),
        )
        .await
        {
            error!("Failed to record analysis for {}: {}", label, e);
        }

        let threshold = config.analyzer.effective_action_threshold();
        if analysis.factors.is_empty() || analysis.overall_score < threshold {
            info!(
                "{} scored {:.3} ({}), below action threshold {:.2} [arm {}]",
                label, analysis.overall_score, analysis.recommendation, threshold, arm
            );
            return Ok((analysis, None));
        }

        let quality_score = analysis.quality_score();
        let decision = TradeDecision {
            token_address: analysis.token_address.clone(),
            overall_score: analysis.overall_score,
            quality_score,
            recommendation: analysis.recommendation,
            confidence: analysis.confidence,
            risk_factors: analysis.risk_factors.clone(),
            opportunity_factors: analysis.opportunity_factors.clone(),
            trade_parameters: TradeParameterizer::new(config.trader.clone()).parameters(quality_score),
            arm,
            decided_at: now,
        };
        info!(
            "{} scored {:.3} ({}, {} confidence, quality {}) [arm {}]",
            label, analysis.overall_score, analysis.recommendation, analysis.confidence, quality_score, arm
        );
        Ok((analysis, Some(decision)))
    }

    /// Record a total-failure analysis for an addressed candidate whose
    /// message could not be read. Never produces a decision.
    pub async fn analyze_unreadable(
        &self,
        token_address: &str,
        reason: &ValidationError,
        document: &ConfigDocument,
        now: DateTime<Utc>,
    ) -> Result<CompositeAnalysis, AnalyzerError> {
        let (arm, config) = document.resolve(token_address);
        let scorer = CompositeScorer::from_config(&config.analyzer)?;
        let placeholder = TokenCandidate::new(token_address, Venue::default(), now);
        let analysis = scorer.total_failure(&placeholder, now);
        warn!("{} could not be scored ({}), recorded as {} [arm {}]", token_address, reason, analysis.recommendation, arm);

        if let Err(e) = bounded(
            self.ctx.settings.store_timeout,
            "analysis record",
            self.ctx.analyses.record(&analysis),
        )
        .await
        {
            error!("Failed to record analysis for {}: {}", token_address, e);
        }
        Ok(analysis)
    }

    /// Drain up to `batch_size` candidates from the queue.
    ///
    /// The configuration document is read once for the whole batch. An
    /// invalid document fails the batch before any message is taken.
    pub async fn process_batch(&self, now: DateTime<Utc>) -> Result<AnalyzeSummary, AnalyzerError> {
        let document = self.ctx.load_document().await?;
        document.validate()?;

        let mut summary = AnalyzeSummary::default();
        for _ in 0..self.ctx.settings.batch_size {
            let Some(delivery) = self.ctx.queue.receive(topics::CANDIDATES).await? else {
                break;
            };
            self.handle(delivery, &document, now, &mut summary).await?;
        }

        if summary != AnalyzeSummary::default() {
            info!(
                "Analyzer batch: {} analyzed, {} decisions, {} dropped, {} retried",
                summary.analyzed, summary.decisions, summary.dropped, summary.retried
            );
        }
        Ok(summary)
    }

    async fn handle(
        &self,
        delivery: Delivery,
        document: &ConfigDocument,
        now: DateTime<Utc>,
        summary: &mut AnalyzeSummary,
    ) -> Result<(), AnalyzerError> {
        let queue = &self.ctx.queue;

        let unreadable = match TokenCandidate::from_message(&delivery.payload) {
            Ok(candidate) => match self.analyze(candidate, document, now).await {
                Ok((_, decision)) => Ok(decision),
                Err(AnalyzerError::Validation(e)) => Err(e),
                Err(e) => return Err(e),
            },
            Err(e) => Err(e),
        };

        let decision = match unreadable {
            Ok(decision) => decision,
            Err(e) => match TokenCandidate::address_of(&delivery.payload) {
                Some(address) => {
                    self.analyze_unreadable(address, &e, document, now).await?;
                    None
                }
                None => {
                    warn!("Dropping candidate message {}: {}", delivery.id, e);
                    summary.dropped += 1;
                    queue.ack(delivery.id).await?;
                    return Ok(());
                }
            },
        };
        summary.analyzed += 1;

        if let Some(decision) = decision {
            let payload = serde_json::to_value(&decision).map_err(PortError::from)?;
            if let Err(e) = queue.publish(topics::DECISIONS, payload).await {
                if delivery.attempts >= self.ctx.settings.max_delivery_attempts {
                    error!(
                        "Giving up on decision for {} after {} attempts: {}",
                        decision.token_address, delivery.attempts, e
                    );
                    summary.dropped += 1;
                    queue.ack(delivery.id).await?;
                } else {
                    warn!("Failed to publish decision for {}, will retry: {}", decision.token_address, e);
                    summary.retried += 1;
                    queue.nack(delivery.id).await?;
                }
                return Ok(());
            }
            summary.decisions += 1;
        }

        queue.ack(delivery.id).await?;
        Ok(())
    }
}
