//! Optimization Records
//!
//! The oracle request/response shapes and the append-only log entry written
//! for every optimizer run, whatever its outcome.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::performance::PerformanceMetrics;
use super::trade::Trade;

/// Payload sent to the scoring oracle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleRequest {
    pub historical_data: Vec<Trade>,
    pub current_metrics: PerformanceMetrics,
}

/// Candidate parameters returned by the scoring oracle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OracleResponse {
    #[serde(default)]
    pub best_params: BTreeMap<String, f64>,
    #[serde(default)]
    pub best_value: Option<f64>,
}

/// Terminal state of an optimizer run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// New A/B configuration persisted
    Promoted,
    /// Too few trades in the lookback window
    InsufficientData,
    /// Oracle returned no candidate parameters
    NoCandidate,
    /// Oracle call failed or timed out
    OracleFailed,
    /// Candidate configuration failed validation
    Rejected,
    /// Trade history or configuration could not be read or written
    StoreFailed,
}

impl RunStatus {
    pub fn changed_config(&self) -> bool {
        matches!(self, RunStatus::Promoted)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunStatus::Promoted => "promoted",
            RunStatus::InsufficientData => "insufficient_data",
            RunStatus::NoCandidate => "no_candidate",
            RunStatus::OracleFailed => "oracle_failed",
            RunStatus::Rejected => "rejected",
            RunStatus::StoreFailed => "store_failed",
        };
        write!(f, "{}", s)
    }
}

/// Log entry for one optimizer run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationRun {
    pub optimization_id: String,
    pub timestamp: DateTime<Utc>,
    pub status: RunStatus,
    pub trades_considered: usize,
    #[serde(default)]
    pub historical_metrics: Option<PerformanceMetrics>,
    #[serde(default)]
    pub best_params: BTreeMap<String, f64>,
    #[serde(default)]
    pub best_value: Option<f64>,
    /// Backup key of the configuration written by this run
    #[serde(default)]
    pub backup_key: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl OptimizationRun {
    pub fn new(timestamp: DateTime<Utc>, status: RunStatus, trades_considered: usize) -> Self {
        Self {
            optimization_id: format!("opt_{}", timestamp.timestamp()),
            timestamp,
            status,
            trades_considered,
            historical_metrics: None,
            best_params: BTreeMap::new(),
            best_value: None,
            backup_key: None,
            message: None,
        }
    }

    pub fn with_metrics(mut self, metrics: PerformanceMetrics) -> Self {
        self.historical_metrics = Some(metrics);
        self
    }

    pub fn with_oracle_result(mut self, response: &OracleResponse) -> Self {
        self.best_params = response.best_params.clone();
        self.best_value = response.best_value;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_backup_key(mut self, key: impl Into<String>) -> Self {
        self.backup_key = Some(key.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_run_id_from_timestamp() {
        let ts = Utc.with_ymd_and_hms(2025, 3, 14, 12, 0, 0).unwrap();
        let run = OptimizationRun::new(ts, RunStatus::InsufficientData, 9);
        assert_eq!(run.optimization_id, format!("opt_{}", ts.timestamp()));
        assert!(!run.status.changed_config());
    }

    #[test]
    fn test_oracle_response_tolerates_missing_fields() {
        let response: OracleResponse = serde_json::from_str("{}").unwrap();
        assert!(response.best_params.is_empty());
        assert!(response.best_value.is_none());
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(serde_json::to_string(&RunStatus::InsufficientData).unwrap(), "\"insufficient_data\"");
        assert_eq!(RunStatus::OracleFailed.to_string(), "oracle_failed");
    }
}
