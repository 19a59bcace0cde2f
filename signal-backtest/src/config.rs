//! Research configuration.
//!
//! Loaded from TOML:
//!
//! ```toml
//! [data]
//! symbol = "SPY"
//! start = "2015-01-01"
//! end = "2023-01-01"
//! cache_dir = "data"
//!
//! [strategy]
//! kind = "momentum"
//! grid = [10, 20, 40]
//!
//! [backtest]
//! param = 20
//! fee_bps = 1.0
//!
//! [walkforward]
//! train_years = 5
//! test_years = 1
//! fee_bps = 1.0
//! ```

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::features::Strategy;
use crate::regime::VolRegimeConfig;
use crate::walkforward::WalkForwardConfig;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Price data source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_symbol")]
    pub symbol: String,
    #[serde(default = "default_start")]
    pub start: NaiveDate,
    #[serde(default = "default_end")]
    pub end: NaiveDate,
    /// Directory holding cached parquet files.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    /// Use split/dividend-adjusted prices when downloading.
    #[serde(default = "default_true")]
    pub auto_adjust: bool,
}

fn default_symbol() -> String {
    "SPY".to_string()
}

fn default_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2015, 1, 1).unwrap_or_default()
}

fn default_end() -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 1, 1).unwrap_or_default()
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_true() -> bool {
    true
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            symbol: default_symbol(),
            start: default_start(),
            end: default_end(),
            cache_dir: default_cache_dir(),
            auto_adjust: true,
        }
    }
}

/// Signal family and the hyperparameter values to search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    #[serde(default = "default_strategy")]
    pub kind: Strategy,
    /// Lookback (momentum) or z-score window (mean reversion) candidates.
    #[serde(default = "default_grid")]
    pub grid: Vec<usize>,
    /// Volatility regime settings used for per-regime breakdowns.
    #[serde(default)]
    pub regime: VolRegimeConfig,
}

fn default_strategy() -> Strategy {
    Strategy::Momentum
}

fn default_grid() -> Vec<usize> {
    vec![10, 20, 40]
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            kind: default_strategy(),
            grid: default_grid(),
            regime: VolRegimeConfig::default(),
        }
    }
}

/// Single full-history backtest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestSection {
    #[serde(default = "default_param")]
    pub param: usize,
    #[serde(default = "default_fee_bps")]
    pub fee_bps: f64,
}

fn default_param() -> usize {
    20
}

fn default_fee_bps() -> f64 {
    1.0
}

impl Default for BacktestSection {
    fn default() -> Self {
        Self {
            param: default_param(),
            fee_bps: default_fee_bps(),
        }
    }
}

/// Top-level research configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResearchConfig {
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub backtest: BacktestSection,
    /// Required for walk-forward runs; its year counts and fee have no
    /// defaults.
    #[serde(default)]
    pub walkforward: Option<WalkForwardConfig>,
}

impl ResearchConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.data.end <= self.data.start {
            return Err(ConfigError::Validation(format!(
                "data.end ({}) must be after data.start ({})",
                self.data.end, self.data.start
            )));
        }
        if self.strategy.grid.is_empty() {
            return Err(ConfigError::Validation(
                "strategy.grid must contain at least one value".to_string(),
            ));
        }
        if let Some(wf) = &self.walkforward {
            wf.validate()
                .map_err(|e| ConfigError::Validation(e.to_string()))?;
        }
        Ok(())
    }
}
