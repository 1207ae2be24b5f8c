//! Candidate Feed
//!
//! Reads migration events from a JSON-lines file (one TokenCandidate-shaped
//! object per line) and publishes them on the candidates topic. Lines that
//! are not JSON objects are skipped; field validation is left to the
//! analyzer so every published message reaches a terminal status there.

use std::path::Path;

use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::ports::{topics, MessageQueue, PortError};

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Failed to read candidate file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to publish candidate: {0}")]
    Publish(#[from] PortError),
}

/// Outcome of loading one feed file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedSummary {
    pub published: usize,
    pub skipped: usize,
}

/// Parse feed content into message payloads, with the count of skipped lines
pub fn parse_feed(content: &str) -> (Vec<Value>, usize) {
    let mut payloads = Vec::new();
    let mut skipped = 0;

    for (line_no, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match serde_json::from_str::<Value>(line) {
            Ok(value) if value.is_object() => payloads.push(value),
            Ok(_) => {
                warn!("Line {}: expected a JSON object, skipping", line_no + 1);
                skipped += 1;
            }
            Err(e) => {
                warn!("Line {}: invalid JSON ({}), skipping", line_no + 1, e);
                skipped += 1;
            }
        }
    }

    (payloads, skipped)
}

/// Publish every candidate in `path` to the candidates topic
pub async fn publish_file(path: &Path, queue: &dyn MessageQueue) -> Result<FeedSummary, FeedError> {
    let content = tokio::fs::read_to_string(path).await?;
    let (payloads, skipped) = parse_feed(&content);

    let mut summary = FeedSummary { published: 0, skipped };
    for payload in payloads {
        queue.publish(topics::CANDIDATES, payload).await?;
        summary.published += 1;
    }

    info!(
        "Loaded {} candidates from {} ({} skipped)",
        summary.published,
        path.display(),
        summary.skipped
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::queue::InProcessQueue;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_feed_skips_bad_lines() {
        let content = r#"
# comment
{"token_address": "mint_a", "discovered_at": "2025-03-14T12:00:00Z"}
not json
[1, 2, 3]
{"symbol": "NOADDR"}
"#;
        let (payloads, skipped) = parse_feed(content);
        assert_eq!(payloads.len(), 2);
        assert_eq!(skipped, 2);
    }

    #[tokio::test]
    async fn test_publish_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"token_address": "mint_a", "discovered_at": "2025-03-14T12:00:00Z"}}"#).unwrap();
        writeln!(file, r#"{{"token_address": "mint_b", "discovered_at": "2025-03-14T12:05:00Z"}}"#).unwrap();
        writeln!(file, "oops").unwrap();

        let queue = InProcessQueue::new();
        let summary = publish_file(file.path(), &queue).await.unwrap();
        assert_eq!(summary, FeedSummary { published: 2, skipped: 1 });
        assert_eq!(queue.pending(topics::CANDIDATES).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_missing_file() {
        let queue = InProcessQueue::new();
        let result = publish_file(Path::new("/nonexistent/candidates.jsonl"), &queue).await;
        assert!(matches!(result, Err(FeedError::Io(_))));
    }
}
