//! Backtesting for single-asset signal strategies.
//!
//! - Position lagging (today's position comes from yesterday's signal)
//! - Turnover-linear fee model
//! - Compounded equity curve

pub mod commission;
pub mod engine;

pub use commission::FeeModel;
pub use engine::{
    backtest_from_signal, BacktestConfig, BacktestResult, EQUITY, FEE, POS, STRAT_RET, TURNOVER,
};
