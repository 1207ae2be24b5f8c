//! Tag Classifier
//!
//! Splits qualitative tags into risk and opportunity factors with a
//! case-insensitive keyword match. A tag containing any keyword is a risk;
//! everything else is an opportunity. Encounter order is preserved.

use super::agent_config::DEFAULT_RISK_KEYWORDS;

#[derive(Debug, Clone, PartialEq)]
pub struct TagClassifier {
    keywords: Vec<String>,
}

impl TagClassifier {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    pub fn is_risk(&self, tag: &str) -> bool {
        let lowered = tag.to_lowercase();
        self.keywords.iter().any(|k| lowered.contains(k.as_str()))
    }

    /// Returns `(risk_factors, opportunity_factors)`
    pub fn partition<'a, I>(&self, tags: I) -> (Vec<String>, Vec<String>)
    where
        I: IntoIterator<Item = &'a String>,
    {
        let mut risks = Vec::new();
        let mut opportunities = Vec::new();
        for tag in tags {
            if self.is_risk(tag) {
                risks.push(tag.clone());
            } else {
                opportunities.push(tag.clone());
            }
        }
        (risks, opportunities)
    }
}

impl Default for TagClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_RISK_KEYWORDS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive_match() {
        let classifier = TagClassifier::default();
        assert!(classifier.is_risk("LOW liquidity"));
        assert!(classifier.is_risk("Sharp price Decline"));
        assert!(classifier.is_risk("Insufficient pool data"));
        assert!(!classifier.is_risk("Deep liquidity"));
    }

    #[test]
    fn test_partition_preserves_order() {
        let classifier = TagClassifier::default();
        let tags: Vec<String> = ["Deep liquidity", "Volatile price", "Clean ticker symbol", "Generic name, originality risk"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let (risks, opportunities) = classifier.partition(&tags);
        assert_eq!(risks, vec!["Volatile price", "Generic name, originality risk"]);
        assert_eq!(opportunities, vec!["Deep liquidity", "Clean ticker symbol"]);
    }

    #[test]
    fn test_custom_keywords() {
        let classifier = TagClassifier::new(["rug", " "]);
        assert!(classifier.is_risk("possible RUG"));
        assert!(!classifier.is_risk("low volume"));
    }
}
