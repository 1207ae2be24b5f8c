//! Composite Scorer
//!
//! Runs every weighted dimension of an analyzer profile concurrently, joins
//! the results and derives the overall score, recommendation band and the
//! risk / opportunity split of the collected tags.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::time::Instant;

use crate::domain::agent_config::{AgentConfigError, AnalyzerConfig, AnalyzerProfile, RecommendationThresholds};
use crate::domain::analysis::{clamp_unit, tags};
use crate::domain::{CompositeAnalysis, Confidence, Dimension, Recommendation, ScoreFactor, TagClassifier, TokenCandidate};
use crate::scoring::{failed_factor, scorer_for, FactorScorer};

/// Default time a single scorer may take before it is replaced by a failed factor
pub const DEFAULT_SCORER_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CompositeError {
    #[error("Invalid analyzer configuration: {0}")]
    Config(#[from] AgentConfigError),
    #[error("Scorer for {0} does not belong to the configured profile")]
    ForeignScorer(Dimension),
}

/// Weighted multi-factor scorer for one analyzer profile
#[derive(Clone)]
pub struct CompositeScorer {
    profile: AnalyzerProfile,
    /// Scorers with their weights, in profile order
    scorers: Vec<(Arc<dyn FactorScorer>, f64)>,
    classifier: TagClassifier,
    thresholds: RecommendationThresholds,
    scorer_timeout: Duration,
}

impl std::fmt::Debug for CompositeScorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeScorer")
            .field("profile", &self.profile)
            .field("weights", &self.weights())
            .field("scorer_timeout", &self.scorer_timeout)
            .finish()
    }
}

impl CompositeScorer {
    /// Build from analyzer settings. Weights are validated here so a bad
    /// configuration never reaches a scoring pass.
    pub fn from_config(config: &AnalyzerConfig) -> Result<Self, CompositeError> {
        config.recommendation.validate()?;
        let scorers = config
            .resolved_weights()?
            .into_iter()
            .map(|(dimension, weight)| (scorer_for(dimension), weight))
            .collect();

        Ok(Self {
            profile: config.profile,
            scorers,
            classifier: TagClassifier::new(&config.risk_keywords),
            thresholds: config.recommendation.clone(),
            scorer_timeout: DEFAULT_SCORER_TIMEOUT,
        })
    }

    pub fn with_scorer_timeout(mut self, timeout: Duration) -> Self {
        self.scorer_timeout = timeout;
        self
    }

    /// Replace the scorer used for its dimension
    pub fn with_scorer(mut self, scorer: Arc<dyn FactorScorer>) -> Result<Self, CompositeError> {
        let dimension = scorer.dimension();
        let slot = self
            .scorers
            .iter_mut()
            .find(|(existing, _)| existing.dimension() == dimension)
            .ok_or(CompositeError::ForeignScorer(dimension))?;
        slot.0 = scorer;
        Ok(self)
    }

    pub fn profile(&self) -> AnalyzerProfile {
        self.profile
    }

    pub fn weights(&self) -> Vec<(Dimension, f64)> {
        self.scorers.iter().map(|(s, w)| (s.dimension(), *w)).collect()
    }

    pub fn classifier(&self) -> &TagClassifier {
        &self.classifier
    }

    /// Score a candidate across every dimension of the profile.
    ///
    /// Each scorer runs on the blocking pool. A scorer that panics or misses
    /// the shared deadline is replaced by a zero factor; the pass itself
    /// always produces an analysis.
    pub async fn analyze(&self, candidate: Arc<TokenCandidate>, as_of: DateTime<Utc>) -> CompositeAnalysis {
        let deadline = Instant::now() + self.scorer_timeout;

        let handles: Vec<_> = self
            .scorers
            .iter()
            .map(|(scorer, _)| {
                let scorer = Arc::clone(scorer);
                let candidate = Arc::clone(&candidate);
                let dimension = scorer.dimension();
                let handle = tokio::task::spawn_blocking(move || scorer.score(&candidate, as_of));
                (dimension, handle)
            })
            .collect();

        let mut factors = Vec::with_capacity(handles.len());
        let mut failures = 0usize;
        for (dimension, handle) in handles {
            let factor = match tokio::time::timeout_at(deadline, handle).await {
                Ok(Ok(factor)) => factor,
                Ok(Err(join_error)) => {
                    failures += 1;
                    tracing::warn!("{} scorer crashed for {}: {}", dimension, candidate.label(), join_error);
                    failed_factor(dimension, "scorer crashed")
                }
                Err(_) => {
                    failures += 1;
                    tracing::warn!(
                        "{} scorer timed out for {} after {:?}",
                        dimension,
                        candidate.label(),
                        self.scorer_timeout
                    );
                    failed_factor(dimension, "scorer timed out")
                }
            };
            factors.push(factor);
        }

        if failures == factors.len() {
            tracing::error!("Every scorer failed for {}", candidate.label());
            return self.total_failure(&candidate, as_of);
        }

        self.assemble(&candidate, factors, as_of)
    }

    /// Build the analysis from already computed factors
    pub fn assemble(&self, candidate: &TokenCandidate, factors: Vec<ScoreFactor>, as_of: DateTime<Utc>) -> CompositeAnalysis {
        let weights = self.weights();
        let overall_score = combine(&factors, &weights);
        let (recommendation, confidence) = self.thresholds.classify(overall_score);
        let (risk_factors, opportunity_factors) = self
            .classifier
            .partition(factors.iter().flat_map(|f| f.tags.iter()));

        tracing::debug!(
            "{} scored {:.3} ({}) with {} risk / {} opportunity tags",
            candidate.label(),
            overall_score,
            recommendation,
            risk_factors.len(),
            opportunity_factors.len()
        );

        CompositeAnalysis {
            token_address: candidate.token_address.clone(),
            symbol: candidate.symbol.clone(),
            profile: self.profile.as_str().to_string(),
            factors,
            weights: weight_map(&weights),
            overall_score,
            recommendation,
            confidence,
            risk_factors,
            opportunity_factors,
            analyzed_at: as_of,
        }
    }

    /// Analysis for a candidate that could not be scored at all
    pub fn total_failure(&self, candidate: &TokenCandidate, as_of: DateTime<Utc>) -> CompositeAnalysis {
        CompositeAnalysis {
            token_address: candidate.token_address.clone(),
            symbol: candidate.symbol.clone(),
            profile: self.profile.as_str().to_string(),
            factors: Vec::new(),
            weights: weight_map(&self.weights()),
            overall_score: 0.0,
            recommendation: Recommendation::Avoid,
            confidence: Confidence::High,
            risk_factors: vec![tags::TOTAL_FAILURE.to_string()],
            opportunity_factors: Vec::new(),
            analyzed_at: as_of,
        }
    }
}

/// Weighted sum of factor values. A weighted dimension with no factor
/// contributes zero.
pub fn combine(factors: &[ScoreFactor], weights: &[(Dimension, f64)]) -> f64 {
    let total: f64 = weights
        .iter()
        .map(|(dimension, weight)| {
            let value = factors
                .iter()
                .find(|f| f.dimension == *dimension)
                .map(|f| f.value)
                .unwrap_or(0.0);
            weight * value
        })
        .sum();
    clamp_unit(total)
}

fn weight_map(weights: &[(Dimension, f64)]) -> BTreeMap<String, f64> {
    weights.iter().map(|(d, w)| (d.as_str().to_string(), *w)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::{Assessment, ScoringError};
    use crate::domain::Venue;
    use approx::assert_relative_eq;

    struct Fixed {
        dimension: Dimension,
        value: f64,
        tags: Vec<&'static str>,
    }

    impl FactorScorer for Fixed {
        fn dimension(&self) -> Dimension {
            self.dimension
        }

        fn evaluate(&self, _: &TokenCandidate, _: DateTime<Utc>) -> Result<Assessment, ScoringError> {
            let mut assessment = Assessment::new(self.value);
            for tag in &self.tags {
                assessment.tag(*tag);
            }
            Ok(assessment)
        }
    }

    struct Panicking(Dimension);

    impl FactorScorer for Panicking {
        fn dimension(&self) -> Dimension {
            self.0
        }

        fn evaluate(&self, _: &TokenCandidate, _: DateTime<Utc>) -> Result<Assessment, ScoringError> {
            panic!("boom")
        }
    }

    struct Sleepy(Dimension);

    impl FactorScorer for Sleepy {
        fn dimension(&self) -> Dimension {
            self.0
        }

        fn evaluate(&self, _: &TokenCandidate, _: DateTime<Utc>) -> Result<Assessment, ScoringError> {
            std::thread::sleep(Duration::from_millis(300));
            Ok(Assessment::new(1.0))
        }
    }

    fn scorer_with(values: [f64; 5]) -> CompositeScorer {
        let mut scorer = CompositeScorer::from_config(&AnalyzerConfig::default()).unwrap();
        for (dimension, value) in AnalyzerProfile::Pumpswap.dimensions().into_iter().zip(values) {
            scorer = scorer
                .with_scorer(Arc::new(Fixed { dimension, value, tags: vec![] }))
                .unwrap();
        }
        scorer
    }

    fn candidate() -> Arc<TokenCandidate> {
        Arc::new(TokenCandidate::new("mint", Venue::PumpSwap, Utc::now()))
    }

    #[tokio::test]
    async fn test_all_max_is_strong_buy() {
        let analysis = scorer_with([1.0; 5]).analyze(candidate(), Utc::now()).await;
        assert_relative_eq!(analysis.overall_score, 1.0, epsilon = 1e-9);
        assert_eq!(analysis.recommendation, Recommendation::StrongBuy);
        assert_eq!(analysis.confidence, Confidence::High);
        assert_eq!(analysis.factors.len(), 5);
        assert_eq!(analysis.profile, "pumpswap");
    }

    #[tokio::test]
    async fn test_weighted_sum_and_bands() {
        // 0.25*0.8 + 0.20*0.6 + 0.20*0.7 + 0.15*0.5 + 0.20*0.9 = 0.715
        let analysis = scorer_with([0.8, 0.6, 0.7, 0.5, 0.9]).analyze(candidate(), Utc::now()).await;
        assert_relative_eq!(analysis.overall_score, 0.715, epsilon = 1e-12);
        assert_eq!(analysis.recommendation, Recommendation::Buy);
        assert_eq!(analysis.confidence, Confidence::Medium);

        let analysis = scorer_with([0.55; 5]).analyze(candidate(), Utc::now()).await;
        assert_eq!(analysis.recommendation, Recommendation::Consider);
        assert_eq!(analysis.confidence, Confidence::Low);

        let analysis = scorer_with([0.2; 5]).analyze(candidate(), Utc::now()).await;
        assert_eq!(analysis.recommendation, Recommendation::Avoid);
        assert_eq!(analysis.confidence, Confidence::High);
    }

    #[tokio::test]
    async fn test_tags_partitioned_in_encounter_order() {
        let scorer = scorer_with([0.5; 5])
            .with_scorer(Arc::new(Fixed {
                dimension: Dimension::EarlyAdoption,
                value: 0.5,
                tags: vec!["Detected early (1-3h)", "Low trading activity"],
            }))
            .unwrap()
            .with_scorer(Arc::new(Fixed {
                dimension: Dimension::PriceStability,
                value: 0.5,
                tags: vec!["Sharp price decline", "Stable price"],
            }))
            .unwrap();

        let analysis = scorer.analyze(candidate(), Utc::now()).await;
        assert_eq!(analysis.risk_factors, vec!["Low trading activity", "Sharp price decline"]);
        assert_eq!(analysis.opportunity_factors, vec!["Detected early (1-3h)", "Stable price"]);
    }

    #[tokio::test]
    async fn test_panicking_scorer_becomes_failed_factor() {
        let scorer = scorer_with([1.0; 5])
            .with_scorer(Arc::new(Panicking(Dimension::VolumeMomentum)))
            .unwrap();

        let analysis = scorer.analyze(candidate(), Utc::now()).await;
        assert_relative_eq!(analysis.overall_score, 0.8, epsilon = 1e-12);
        let failed = analysis.factor(Dimension::VolumeMomentum).unwrap();
        assert_eq!(failed.value, 0.0);
        assert_eq!(failed.tags, vec!["Error in volume momentum analysis: scorer crashed"]);
        assert!(analysis.risk_factors.contains(&failed.tags[0]));
    }

    #[tokio::test]
    async fn test_slow_scorer_times_out() {
        let scorer = scorer_with([1.0; 5])
            .with_scorer(Arc::new(Sleepy(Dimension::CommunityInterest)))
            .unwrap()
            .with_scorer_timeout(Duration::from_millis(50));

        let analysis = scorer.analyze(candidate(), Utc::now()).await;
        assert_relative_eq!(analysis.overall_score, 0.8, epsilon = 1e-12);
        assert_eq!(analysis.factor(Dimension::CommunityInterest).unwrap().value, 0.0);
    }

    #[tokio::test]
    async fn test_total_failure() {
        let mut scorer = scorer_with([1.0; 5]);
        for dimension in AnalyzerProfile::Pumpswap.dimensions() {
            scorer = scorer.with_scorer(Arc::new(Panicking(dimension))).unwrap();
        }

        let analysis = scorer.analyze(candidate(), Utc::now()).await;
        assert_eq!(analysis.overall_score, 0.0);
        assert_eq!(analysis.recommendation, Recommendation::Avoid);
        assert_eq!(analysis.confidence, Confidence::High);
        assert_eq!(analysis.risk_factors, vec![tags::TOTAL_FAILURE]);
        assert!(analysis.opportunity_factors.is_empty());
    }

    #[test]
    fn test_invalid_weights_rejected() {
        let mut config = AnalyzerConfig::default();
        config.weights.insert("early_adoption".into(), 0.9);
        assert!(matches!(
            CompositeScorer::from_config(&config),
            Err(CompositeError::Config(AgentConfigError::InvalidWeights(_)))
        ));
    }

    #[test]
    fn test_foreign_scorer_rejected() {
        let scorer = CompositeScorer::from_config(&AnalyzerConfig::default()).unwrap();
        let result = scorer.with_scorer(Arc::new(Panicking(Dimension::SmartMoneyFollowing)));
        assert_eq!(result.err(), Some(CompositeError::ForeignScorer(Dimension::SmartMoneyFollowing)));
    }

    #[test]
    fn test_combine_bounds() {
        let weights = AnalyzerProfile::Migration
            .dimensions()
            .into_iter()
            .map(|d| (d, 0.2))
            .collect::<Vec<_>>();
        let factors: Vec<_> = weights.iter().map(|(d, _)| ScoreFactor::new(*d, 1.0, vec![])).collect();
        assert_relative_eq!(combine(&factors, &weights), 1.0, epsilon = 1e-12);
        assert_eq!(combine(&[], &weights), 0.0);
    }
}
