//! Performance metrics module.
//!
//! - Sharpe ratio (population std, annualized)
//! - Maximum drawdown and drawdown episodes
//! - Approximate annualized return, average turnover
//! - Per-regime breakdowns and monthly returns

pub mod calculator;

pub use calculator::{
    max_drawdown, monthly_returns, regime_summary, sharpe, summary, total_return,
    DrawdownAnalysis, MonthlyReturn, PerformanceSummary, RegimeSummary, TRADING_DAYS_PER_YEAR,
};
