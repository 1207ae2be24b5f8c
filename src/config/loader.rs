//! Configuration Loader
//!
//! Loads and validates the runtime configuration from a TOML file matching
//! `config/sniper.toml`. Tunable agent parameters (weights, tiers, optimizer
//! cadence) are not here; they live in the configuration store and are
//! rewritten by the optimizer.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "config/sniper.toml";
pub const DEFAULT_PRICE_API: &str = "https://price.jup.ag/v6/price";

/// Main configuration structure matching sniper.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsSection,
    #[serde(default)]
    pub pipeline: PipelineSection,
    #[serde(default)]
    pub timeouts: TimeoutsSection,
    #[serde(default)]
    pub trading: TradingSection,
    #[serde(default)]
    pub price_api: PriceApiSection,
    #[serde(default)]
    pub oracle: OracleSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

/// Where persistent state lives
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsSection {
    /// Root of all stores; `~` is expanded
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

fn default_data_dir() -> String {
    "~/.migration-sniper".to_string()
}

impl Default for PathsSection {
    fn default() -> Self {
        Self { data_dir: default_data_dir() }
    }
}

impl PathsSection {
    /// Data directory with environment override and tilde expansion.
    /// Checks SNIPER_DATA_DIR env var first, falls back to config value
    pub fn data_dir(&self) -> PathBuf {
        let raw = std::env::var("SNIPER_DATA_DIR").unwrap_or_else(|_| self.data_dir.clone());
        PathBuf::from(shellexpand::tilde(&raw).to_string())
    }
}

/// Loop cadence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSection {
    /// Seconds between analyzer / trader passes
    #[serde(default = "default_analyze_interval")]
    pub analyze_interval_secs: u64,
    /// Seconds between position monitor passes
    #[serde(default = "default_monitor_interval")]
    pub monitor_interval_secs: u64,
    /// Seconds between checks whether an optimizer run is due
    #[serde(default = "default_optimizer_check_interval")]
    pub optimizer_check_interval_secs: u64,
    /// Upper bound on messages drained per stage per pass
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Deliveries beyond this many attempts are dropped
    #[serde(default = "default_max_delivery_attempts")]
    pub max_delivery_attempts: u32,
}

fn default_analyze_interval() -> u64 {
    5
}

fn default_monitor_interval() -> u64 {
    30
}

fn default_optimizer_check_interval() -> u64 {
    3600
}

fn default_batch_size() -> usize {
    50
}

fn default_max_delivery_attempts() -> u32 {
    3
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            analyze_interval_secs: default_analyze_interval(),
            monitor_interval_secs: default_monitor_interval(),
            optimizer_check_interval_secs: default_optimizer_check_interval(),
            batch_size: default_batch_size(),
            max_delivery_attempts: default_max_delivery_attempts(),
        }
    }
}

/// Bounds on every external call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutsSection {
    #[serde(default = "default_scorer_ms")]
    pub scorer_ms: u64,
    #[serde(default = "default_price_secs")]
    pub price_secs: u64,
    #[serde(default = "default_execution_secs")]
    pub execution_secs: u64,
    #[serde(default = "default_oracle_secs")]
    pub oracle_secs: u64,
    #[serde(default = "default_store_secs")]
    pub store_secs: u64,
}

fn default_scorer_ms() -> u64 {
    5_000
}

fn default_price_secs() -> u64 {
    10
}

fn default_execution_secs() -> u64 {
    30
}

fn default_oracle_secs() -> u64 {
    120
}

fn default_store_secs() -> u64 {
    10
}

impl Default for TimeoutsSection {
    fn default() -> Self {
        Self {
            scorer_ms: default_scorer_ms(),
            price_secs: default_price_secs(),
            execution_secs: default_execution_secs(),
            oracle_secs: default_oracle_secs(),
            store_secs: default_store_secs(),
        }
    }
}

impl TimeoutsSection {
    pub fn scorer(&self) -> Duration {
        Duration::from_millis(self.scorer_ms)
    }

    pub fn price(&self) -> Duration {
        Duration::from_secs(self.price_secs)
    }

    pub fn execution(&self) -> Duration {
        Duration::from_secs(self.execution_secs)
    }

    pub fn oracle(&self) -> Duration {
        Duration::from_secs(self.oracle_secs)
    }

    pub fn store(&self) -> Duration {
        Duration::from_secs(self.store_secs)
    }
}

/// Capital and paper execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingSection {
    /// Capital that position sizes are fractions of
    #[serde(default = "default_capital_usd")]
    pub capital_usd: f64,
    /// Simulated adverse slippage applied to paper fills
    #[serde(default = "default_paper_slippage")]
    pub paper_slippage: f64,
}

fn default_capital_usd() -> f64 {
    1_000.0
}

fn default_paper_slippage() -> f64 {
    0.005
}

impl Default for TradingSection {
    fn default() -> Self {
        Self {
            capital_usd: default_capital_usd(),
            paper_slippage: default_paper_slippage(),
        }
    }
}

/// Pool price source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceApiSection {
    #[serde(default = "default_price_api")]
    pub url: String,
}

fn default_price_api() -> String {
    DEFAULT_PRICE_API.to_string()
}

impl Default for PriceApiSection {
    fn default() -> Self {
        Self { url: default_price_api() }
    }
}

impl PriceApiSection {
    /// Get price API URL with environment variable override
    /// Checks PRICE_API_URL env var first, falls back to config value
    pub fn get_url(&self) -> String {
        std::env::var("PRICE_API_URL").unwrap_or_else(|_| self.url.clone())
    }
}

/// Parameter-search oracle
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OracleSection {
    /// HTTP endpoint; empty disables optimization
    #[serde(default)]
    pub endpoint: String,
    /// Name of the secret holding the oracle API key
    #[serde(default = "default_api_key_secret")]
    pub api_key_secret: String,
}

fn default_api_key_secret() -> String {
    "ORACLE_API_KEY".to_string()
}

impl OracleSection {
    /// Get oracle endpoint with environment variable override
    /// Checks ORACLE_ENDPOINT env var first, falls back to config value
    pub fn get_endpoint(&self) -> Option<String> {
        let endpoint = std::env::var("ORACLE_ENDPOINT").unwrap_or_else(|_| self.endpoint.clone());
        if endpoint.trim().is_empty() {
            None
        } else {
            Some(endpoint)
        }
    }
}

/// Logging configuration section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSection {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log to file instead of stdout
    #[serde(default)]
    pub log_to_file: bool,
    /// Log file path, relative to the data directory unless absolute
    #[serde(default = "default_log_file")]
    pub log_file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/sniper.log".to_string()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_to_file: false,
            log_file: default_log_file(),
        }
    }
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

/// Load configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

/// Load the file if it exists, otherwise fall back to defaults
pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    if path.as_ref().exists() {
        load_config(path)
    } else {
        tracing::warn!("Config file {} not found, using defaults", path.as_ref().display());
        let config = Config::default();
        config.validate()?;
        Ok(config)
    }
}

impl Config {
    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.paths.data_dir.trim().is_empty() {
            return Err(ConfigError::ValidationError("data_dir cannot be empty".to_string()));
        }

        let intervals = [
            ("analyze_interval_secs", self.pipeline.analyze_interval_secs),
            ("monitor_interval_secs", self.pipeline.monitor_interval_secs),
            ("optimizer_check_interval_secs", self.pipeline.optimizer_check_interval_secs),
        ];
        for (name, value) in intervals {
            if value == 0 {
                return Err(ConfigError::ValidationError(format!("{} must be > 0", name)));
            }
        }

        if self.pipeline.batch_size == 0 {
            return Err(ConfigError::ValidationError("batch_size must be > 0".to_string()));
        }

        if self.pipeline.max_delivery_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "max_delivery_attempts must be > 0".to_string(),
            ));
        }

        let timeouts = [
            ("scorer_ms", self.timeouts.scorer_ms),
            ("price_secs", self.timeouts.price_secs),
            ("execution_secs", self.timeouts.execution_secs),
            ("oracle_secs", self.timeouts.oracle_secs),
            ("store_secs", self.timeouts.store_secs),
        ];
        for (name, value) in timeouts {
            if value == 0 {
                return Err(ConfigError::ValidationError(format!("timeout {} must be > 0", name)));
            }
        }

        if !self.trading.capital_usd.is_finite() || self.trading.capital_usd <= 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "capital_usd must be > 0, got {}",
                self.trading.capital_usd
            )));
        }

        if !(0.0..0.5).contains(&self.trading.paper_slippage) {
            return Err(ConfigError::ValidationError(format!(
                "paper_slippage must be in [0, 0.5), got {}",
                self.trading.paper_slippage
            )));
        }

        if self.price_api.url.is_empty() {
            return Err(ConfigError::ValidationError("price_api.url cannot be empty".to_string()));
        }

        if !LOG_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "logging.level must be one of {:?}, got '{}'",
                LOG_LEVELS, self.logging.level
            )));
        }

        Ok(())
    }

    /// Resolved log file path
    pub fn log_file_path(&self) -> PathBuf {
        let path = PathBuf::from(shellexpand::tilde(&self.logging.log_file).to_string());
        if path.is_absolute() {
            path
        } else {
            self.paths.data_dir().join(path)
        }
    }

    /// TOML rendering written by `config init`
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}
