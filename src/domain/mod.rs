//! Domain Layer - Core types and rules for the migration sniper
//!
//! Pure data and decision logic with no I/O. All external interactions go
//! through the ports layer.
//!
//! - `candidate`: migration events and their raw metric bundles
//! - `analysis`: scored dimensions, composite analyses, trade decisions
//! - `classifier`: risk / opportunity tag partitioning
//! - `agent_config`: tunable configuration and A/B documents
//! - `parameterizer`: quality score -> trade risk parameters
//! - `mitigation`: risk factors -> mitigation action
//! - `trade`: open/closed trade records
//! - `performance`: realized metrics over closed trades
//! - `optimization`: oracle payloads and optimizer run log entries

pub mod agent_config;
pub mod analysis;
pub mod candidate;
pub mod classifier;
pub mod mitigation;
pub mod optimization;
pub mod parameterizer;
pub mod performance;
pub mod trade;

pub use agent_config::{
    AbTestConfig, AgentConfigError, AgentConfiguration, AnalyzerConfig, AnalyzerProfile, ConfigArm,
    ConfigDocument, OptimizerConfig, RecommendationThresholds, TraderConfig,
};
pub use analysis::{
    quality_score, CompositeAnalysis, Confidence, Dimension, Recommendation, ScoreFactor, TradeDecision,
};
pub use candidate::{
    MarketConditions, MetricBundle, MetricPoint, PoolSnapshot, SmartMoneyActivity, SocialMetrics,
    TokenCandidate, ValidationError, Venue, VenueStats,
};
pub use classifier::TagClassifier;
pub use mitigation::{ExecutionPlan, MitigationAction};
pub use optimization::{OptimizationRun, OracleRequest, OracleResponse, RunStatus};
pub use parameterizer::{Tier, TradeParameterizer};
pub use performance::{aggregate, aggregate_by_arm, PerformanceMetrics};
pub use trade::{CloseReason, Trade, TradeError, TradeExit, TradeParameters, TradeStatus};
