//! Vectorized single-asset backtest.
//!
//! Turns a signal column into the position actually held, the trading it
//! implies, the fees it costs and the compounded equity curve:
//!
//! 1. `pos[t] = signal[t-1]` (undefined or missing prior signal is flat)
//! 2. `turnover[t] = |pos[t] - pos[t-1]|`, 0 on the first row
//! 3. `fee[t] = fee_bps / 10_000 * turnover[t]`
//! 4. `strat_ret[t] = pos[t] * ret[t] - fee[t]`
//! 5. `equity[t] = prod(1 + strat_ret)` with undefined returns counted as 0

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::data::{Column, Frame, FrameError};
use crate::features::{RET_1D, SIGNAL_MOM};

use super::commission::FeeModel;

pub const POS: &str = "pos";
pub const TURNOVER: &str = "turnover";
pub const FEE: &str = "fee";
pub const STRAT_RET: &str = "strat_ret";
pub const EQUITY: &str = "equity";

/// Configuration for a single backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestConfig {
    /// Column holding the desired position.
    #[serde(default = "default_signal_column")]
    pub signal_column: String,

    /// Column holding the realized per-period asset return.
    #[serde(default = "default_return_column")]
    pub return_column: String,

    /// Fee per unit of turnover, in basis points.
    #[serde(default = "default_fee_bps")]
    pub fee_bps: f64,
}

fn default_signal_column() -> String {
    SIGNAL_MOM.to_string()
}

fn default_return_column() -> String {
    RET_1D.to_string()
}

fn default_fee_bps() -> f64 {
    1.0
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            signal_column: default_signal_column(),
            return_column: default_return_column(),
            fee_bps: default_fee_bps(),
        }
    }
}

impl BacktestConfig {
    pub fn new(signal_column: &str) -> Self {
        Self {
            signal_column: signal_column.to_string(),
            ..Default::default()
        }
    }

    pub fn with_return_column(mut self, return_column: &str) -> Self {
        self.return_column = return_column.to_string();
        self
    }

    pub fn with_fee_bps(mut self, fee_bps: f64) -> Self {
        self.fee_bps = fee_bps;
        self
    }

    pub fn run(&self, frame: &Frame) -> Result<BacktestResult, FrameError> {
        backtest_from_signal(frame, &self.signal_column, &self.return_column, self.fee_bps)
    }
}

/// Result of a backtest: the input frame plus the five simulation columns.
#[derive(Debug, Clone)]
pub struct BacktestResult {
    frame: Frame,
    pos: Column,
    turnover: Column,
    fee: Column,
    strat_ret: Column,
    equity: Column,
}

impl BacktestResult {
    /// Full result table (input columns followed by the simulation columns).
    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn index(&self) -> &[NaiveDate] {
        self.frame.index()
    }

    pub fn len(&self) -> usize {
        self.frame.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.is_empty()
    }

    pub fn pos(&self) -> &[f64] {
        &self.pos
    }

    pub fn turnover(&self) -> &[f64] {
        &self.turnover
    }

    pub fn fee(&self) -> &[f64] {
        &self.fee
    }

    pub fn strat_ret(&self) -> &[f64] {
        &self.strat_ret
    }

    pub fn equity(&self) -> &[f64] {
        &self.equity
    }

    /// Final equity, 1.0 for an empty result.
    pub fn final_equity(&self) -> f64 {
        self.equity.last().copied().unwrap_or(1.0)
    }

    /// Dates and strategy returns with undefined returns removed.
    pub fn defined_returns(&self) -> (Vec<NaiveDate>, Vec<f64>) {
        self.index()
            .iter()
            .zip(self.strat_ret.iter())
            .filter(|(_, r)| !r.is_nan())
            .map(|(d, r)| (*d, *r))
            .unzip()
    }

    /// Rows dated within `[start, end]`. Equity keeps its full-history values.
    pub fn slice_dates(&self, start: NaiveDate, end: NaiveDate) -> BacktestResult {
        let index = self.index();
        let lo = index.partition_point(|d| *d < start);
        let hi = index.partition_point(|d| *d <= end).max(lo);
        let slice = |c: &Column| Column::from(&c[lo..hi]);

        BacktestResult {
            frame: self.frame.slice_dates(start, end),
            pos: slice(&self.pos),
            turnover: slice(&self.turnover),
            fee: slice(&self.fee),
            strat_ret: slice(&self.strat_ret),
            equity: slice(&self.equity),
        }
    }

    /// Keep rows where `mask` is true.
    pub fn filter_rows(&self, mask: &[bool]) -> Result<BacktestResult, FrameError> {
        Self::from_frame(self.frame.filter_rows(mask)?)
    }

    fn from_frame(frame: Frame) -> Result<Self, FrameError> {
        Ok(Self {
            pos: frame.column_shared(POS)?,
            turnover: frame.column_shared(TURNOVER)?,
            fee: frame.column_shared(FEE)?,
            strat_ret: frame.column_shared(STRAT_RET)?,
            equity: frame.column_shared(EQUITY)?,
            frame,
        })
    }
}

/// Simulate trading `signal_column` against `return_column`.
///
/// Row count and order are preserved. Fails with `FrameError::MissingColumn`
/// when either column is absent.
pub fn backtest_from_signal(
    frame: &Frame,
    signal_column: &str,
    return_column: &str,
    fee_bps: f64,
) -> Result<BacktestResult, FrameError> {
    let signal = frame.column(signal_column)?;
    let ret = frame.column(return_column)?;
    let fees = FeeModel::new(fee_bps);
    let n = frame.len();

    let mut pos = Vec::with_capacity(n);
    let mut turnover = Vec::with_capacity(n);
    let mut fee = Vec::with_capacity(n);
    let mut strat_ret = Vec::with_capacity(n);
    let mut equity = Vec::with_capacity(n);

    let mut prev_pos = 0.0;
    let mut growth = 1.0;

    for t in 0..n {
        let p = match t.checked_sub(1).map(|i| signal[i]) {
            Some(s) if !s.is_nan() => s,
            _ => 0.0,
        };
        let traded = if t == 0 { 0.0 } else { (p - prev_pos).abs() };
        let cost = fees.charge(traded);
        let r = p * ret[t] - cost;

        if !r.is_nan() {
            growth *= 1.0 + r;
        }

        pos.push(p);
        turnover.push(traded);
        fee.push(cost);
        strat_ret.push(r);
        equity.push(growth);
        prev_pos = p;
    }

    debug!(
        "Backtest on {} ({} rows, {} bps): final equity {:.4}",
        signal_column, n, fee_bps, growth
    );

    let frame = frame
        .with_column(POS, pos)?
        .with_column(TURNOVER, turnover)?
        .with_column(FEE, fee)?
        .with_column(STRAT_RET, strat_ret)?
        .with_column(EQUITY, equity)?;

    BacktestResult::from_frame(frame)
}
