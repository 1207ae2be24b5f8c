//! Community interest: social reach across platforms and the quality of the
//! token's name and ticker.

use chrono::{DateTime, Utc};

use crate::domain::analysis::tags;
use crate::domain::{Dimension, TokenCandidate};
use crate::scoring::{Assessment, FactorScorer, ScoringError};

/// Name fragments that suggest a low-effort copycat
pub const DEFAULT_GENERIC_TERMS: [&str; 6] = ["coin", "token", "meme", "doge", "shib", "pepe"];

#[derive(Debug, Clone)]
pub struct CommunityInterestScorer {
    generic_terms: Vec<String>,
}

impl CommunityInterestScorer {
    pub fn new() -> Self {
        Self {
            generic_terms: DEFAULT_GENERIC_TERMS.iter().map(|t| t.to_string()).collect(),
        }
    }

    pub fn with_generic_terms(mut self, terms: Vec<String>) -> Self {
        self.generic_terms = terms.into_iter().map(|t| t.to_lowercase()).collect();
        self
    }

    fn is_generic(&self, name: &str) -> bool {
        let lowered = name.to_lowercase();
        self.generic_terms.iter().any(|term| lowered.contains(term.as_str()))
    }
}

impl Default for CommunityInterestScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl FactorScorer for CommunityInterestScorer {
    fn dimension(&self) -> Dimension {
        Dimension::CommunityInterest
    }

    fn evaluate(&self, candidate: &TokenCandidate, _as_of: DateTime<Utc>) -> Result<Assessment, ScoringError> {
        let social = candidate
            .metrics
            .social
            .as_ref()
            .ok_or_else(|| ScoringError::insufficient("social data", 0.2))?;

        let mentions = social.twitter_mentions;
        let mut assessment = if mentions >= 100 {
            Assessment::tagged(1.0, format!("Strong Twitter interest: {} mentions", mentions))
        } else if mentions >= 50 {
            Assessment::tagged(0.8, format!("Good Twitter interest: {} mentions", mentions))
        } else if mentions >= 10 {
            Assessment::new(0.6)
        } else if mentions >= 5 {
            Assessment::new(0.4)
        } else {
            Assessment::tagged(0.2, "Low social interest")
        };

        match social.active_platforms() {
            3 => assessment.adjust(1.3, "Active on all social platforms"),
            2 => assessment.adjust(1.1, "Active on two social platforms"),
            _ => {}
        }

        let symbol = candidate.symbol.as_deref().unwrap_or_default();
        if !symbol.is_empty() && symbol.chars().count() <= 6 && symbol.chars().all(char::is_alphabetic) {
            assessment.adjust(1.1, "Clean, memorable ticker");
        }

        // A missing name still counts as short and digit-free
        let name = candidate.name.as_deref().unwrap_or_default();
        if name.chars().count() <= 20 && !name.chars().any(|c| c.is_ascii_digit()) {
            assessment.adjust(1.05, "Professional name");
        }
        if self.is_generic(name) {
            assessment.adjust(0.9, tags::GENERIC_NAME);
        }

        Ok(assessment)
    }
}
