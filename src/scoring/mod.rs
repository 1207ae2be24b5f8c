//! Scoring - Multi-factor token quality model
//!
//! Each [`FactorScorer`] turns one aspect of a candidate into a bounded
//! sub-score with qualitative tags. The [`CompositeScorer`] runs a weighted
//! set of them and derives the overall score and recommendation.
//!
//! Scorers are pure and never fail outward: missing inputs produce a fixed
//! degraded score with an "Insufficient ..." tag, internal failures produce
//! 0.0 with an "Error in ..." tag.

pub mod composite;
pub mod dimensions;
pub mod stats;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::{Dimension, ScoreFactor, TokenCandidate};

pub use composite::{CompositeError, CompositeScorer};
pub use dimensions::scorer_for;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScoringError {
    /// Inputs are missing; the scorer reports `degraded_score` instead
    #[error("Insufficient {detail}")]
    InsufficientData { detail: String, degraded_score: f64 },
    /// The computation itself failed
    #[error("{0}")]
    Computation(String),
}

impl ScoringError {
    pub fn insufficient(detail: &str, degraded_score: f64) -> Self {
        ScoringError::InsufficientData {
            detail: detail.to_string(),
            degraded_score,
        }
    }
}

/// Intermediate result of a scorer: a base value, multiplicative
/// adjustments, and tags in encounter order. Clamped only at the end.
#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    value: f64,
    tags: Vec<String>,
}

impl Assessment {
    pub fn new(base: f64) -> Self {
        Self { value: base, tags: Vec::new() }
    }

    pub fn tagged(base: f64, tag: impl Into<String>) -> Self {
        Self { value: base, tags: vec![tag.into()] }
    }

    pub fn tag(&mut self, tag: impl Into<String>) {
        self.tags.push(tag.into());
    }

    pub fn scale(&mut self, factor: f64) {
        self.value *= factor;
    }

    /// Multiply and tag in one step
    pub fn adjust(&mut self, factor: f64, tag: impl Into<String>) {
        self.scale(factor);
        self.tag(tag);
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }
}

/// A single scoring dimension
pub trait FactorScorer: Send + Sync {
    fn dimension(&self) -> Dimension;

    /// Raw evaluation; may report missing data or a failed computation
    fn evaluate(&self, candidate: &TokenCandidate, as_of: DateTime<Utc>) -> Result<Assessment, ScoringError>;

    /// Bounded score in [0, 1]; never fails
    fn score(&self, candidate: &TokenCandidate, as_of: DateTime<Utc>) -> ScoreFactor {
        let dimension = self.dimension();
        match self.evaluate(candidate, as_of) {
            Ok(assessment) => ScoreFactor::new(dimension, assessment.value, assessment.tags),
            Err(ScoringError::InsufficientData { detail, degraded_score }) => {
                tracing::debug!("{} degraded for {}: insufficient {}", dimension, candidate.label(), detail);
                ScoreFactor::new(dimension, degraded_score, vec![format!("Insufficient {}", detail)])
            }
            Err(ScoringError::Computation(message)) => {
                tracing::warn!("{} failed for {}: {}", dimension, candidate.label(), message);
                failed_factor(dimension, &message)
            }
        }
    }
}

/// Substitute factor for a dimension that could not be computed
pub fn failed_factor(dimension: Dimension, message: &str) -> ScoreFactor {
    ScoreFactor::new(
        dimension,
        0.0,
        vec![format!("Error in {} analysis: {}", dimension.label(), message)],
    )
}
