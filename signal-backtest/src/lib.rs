pub mod backtest;
pub mod config;
pub mod data;
pub mod features;
pub mod metrics;
pub mod regime;
pub mod report;
pub mod validation;
pub mod walkforward;

// Re-export commonly used types
pub use backtest::{backtest_from_signal, BacktestConfig, BacktestResult, FeeModel};
pub use config::{ConfigError, ResearchConfig};
pub use data::{DataLoader, Frame, FrameError, LoaderError, PriceBar, YahooClient, YahooConfig, YahooError};
pub use features::{FeatureBuilder, Strategy};
pub use metrics::{max_drawdown, regime_summary, sharpe, summary, PerformanceSummary, RegimeSummary};
pub use regime::{add_vol_regime, VolRegimeConfig};
pub use validation::{DataIntegrityReport, DataIntegrityValidator};
pub use walkforward::{
    walkforward_select_param, OutOfSampleTrack, WalkForwardConfig, WalkForwardError,
    WalkForwardResult, WindowResult,
};
