//! Walk-forward hyperparameter selection.
//!
//! For every year window the single hyperparameter with the best in-sample
//! Sharpe is chosen and then scored on the following test years. Test
//! segments are stitched into one out-of-sample track record.
//!
//! Each candidate's features are built once over the full price history and
//! sliced per window. Builders only look backwards, so slicing a full-history
//! frame is equivalent to rebuilding it and leaks nothing from the future.

use std::fmt;

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::backtest::{backtest_from_signal, BacktestResult, EQUITY, STRAT_RET};
use crate::data::{Frame, FrameError};
use crate::features::{FeatureBuilder, RET_1D};
use crate::metrics::{max_drawdown, sharpe, total_return, TRADING_DAYS_PER_YEAR};

use super::periods::{year_windows, WalkForwardWindow};

#[derive(Error, Debug)]
pub enum WalkForwardError {
    #[error("Invalid walk-forward config: {0}")]
    InvalidConfig(String),

    #[error("Hyperparameter grid is empty")]
    EmptyGrid,

    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),
}

/// Walk-forward configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkForwardConfig {
    /// Calendar years in each training span.
    pub train_years: usize,
    /// Calendar years in each test span; also the step between windows.
    pub test_years: usize,
    /// Fee per unit of turnover, in basis points.
    pub fee_bps: f64,
    /// Sharpe annualization factor.
    #[serde(default = "default_periods_per_year")]
    pub periods_per_year: u32,
    /// Windows with fewer training rows are skipped.
    #[serde(default = "default_min_train_rows")]
    pub min_train_rows: usize,
    /// Windows with fewer test rows are skipped.
    #[serde(default = "default_min_test_rows")]
    pub min_test_rows: usize,
    /// Realized return column produced by the feature builder.
    #[serde(default = "default_return_column")]
    pub return_column: String,
}

fn default_periods_per_year() -> u32 {
    TRADING_DAYS_PER_YEAR
}

fn default_min_train_rows() -> usize {
    252
}

fn default_min_test_rows() -> usize {
    100
}

fn default_return_column() -> String {
    RET_1D.to_string()
}

impl WalkForwardConfig {
    pub fn new(train_years: usize, test_years: usize, fee_bps: f64) -> Self {
        Self {
            train_years,
            test_years,
            fee_bps,
            periods_per_year: default_periods_per_year(),
            min_train_rows: default_min_train_rows(),
            min_test_rows: default_min_test_rows(),
            return_column: default_return_column(),
        }
    }

    pub fn with_periods_per_year(mut self, periods_per_year: u32) -> Self {
        self.periods_per_year = periods_per_year;
        self
    }

    pub fn with_min_rows(mut self, min_train_rows: usize, min_test_rows: usize) -> Self {
        self.min_train_rows = min_train_rows;
        self.min_test_rows = min_test_rows;
        self
    }

    pub fn with_return_column(mut self, return_column: &str) -> Self {
        self.return_column = return_column.to_string();
        self
    }

    pub fn validate(&self) -> Result<(), WalkForwardError> {
        if self.train_years == 0 || self.test_years == 0 {
            return Err(WalkForwardError::InvalidConfig(format!(
                "train_years ({}) and test_years ({}) must both be at least 1",
                self.train_years, self.test_years
            )));
        }
        if self.periods_per_year == 0 {
            return Err(WalkForwardError::InvalidConfig(
                "periods_per_year must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Outcome of one walk-forward window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowResult<P> {
    pub train_start: NaiveDate,
    pub train_end: NaiveDate,
    pub test_start: NaiveDate,
    pub test_end: NaiveDate,
    /// Hyperparameter selected on the training span.
    pub best_para: P,
    pub train_sharpe: f64,
    pub test_sharpe: f64,
    /// Compounded test-span return, `prod(1 + r) - 1`.
    pub test_total_return: f64,
    /// Price rows in the training span. The row thresholds apply to these.
    pub train_rows: usize,
    /// Price rows in the test span. Rows whose strategy return is undefined
    /// still count here but are left out of the out-of-sample track.
    pub test_rows: usize,
}

/// Concatenated test-span returns with their compounded equity curve.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutOfSampleTrack {
    pub dates: Vec<NaiveDate>,
    pub strat_ret: Vec<f64>,
    pub equity: Vec<f64>,
}

impl OutOfSampleTrack {
    /// Build the track from (date, return) segments in any order.
    fn from_segments(mut rows: Vec<(NaiveDate, f64)>) -> Self {
        rows.sort_by_key(|(date, _)| *date);

        let mut growth = 1.0;
        let equity = rows
            .iter()
            .map(|(_, r)| {
                growth *= 1.0 + r;
                growth
            })
            .collect();
        let (dates, strat_ret) = rows.into_iter().unzip();

        Self {
            dates,
            strat_ret,
            equity,
        }
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn total_return(&self) -> f64 {
        total_return(&self.strat_ret)
    }

    pub fn sharpe(&self, periods_per_year: u32) -> f64 {
        sharpe(&self.strat_ret, periods_per_year)
    }

    pub fn max_drawdown(&self) -> f64 {
        max_drawdown(&self.equity)
    }

    /// Track as a frame with `strat_ret` and `equity` columns.
    pub fn to_frame(&self) -> Result<Frame, FrameError> {
        Frame::new(self.dates.clone())?
            .with_column(STRAT_RET, self.strat_ret.clone())?
            .with_column(EQUITY, self.equity.clone())
    }
}

/// Complete walk-forward result.
#[derive(Debug, Clone, PartialEq)]
pub struct WalkForwardResult<P> {
    /// One row per qualifying window, in chronological order.
    pub windows: Vec<WindowResult<P>>,
    pub oos: OutOfSampleTrack,
    /// Annualization factor used for every Sharpe in this result.
    pub periods_per_year: u32,
}

impl<P: Copy + PartialEq> WalkForwardResult<P> {
    /// Calculate average in-sample Sharpe ratio.
    pub fn avg_train_sharpe(&self) -> f64 {
        mean_of(self.windows.iter().map(|w| w.train_sharpe))
    }

    /// Calculate average out-of-sample Sharpe ratio.
    pub fn avg_test_sharpe(&self) -> f64 {
        mean_of(self.windows.iter().map(|w| w.test_sharpe))
    }

    /// Most frequently selected hyperparameter and the share of windows that
    /// selected it. Ties go to the value selected first.
    pub fn parameter_stability(&self) -> Option<(P, f64)> {
        let mut counts: Vec<(P, usize)> = Vec::new();
        for w in &self.windows {
            match counts.iter_mut().find(|(p, _)| *p == w.best_para) {
                Some(entry) => entry.1 += 1,
                None => counts.push((w.best_para, 1)),
            }
        }

        let mut best: Option<(P, usize)> = None;
        for (p, n) in counts {
            if best.map_or(true, |(_, m)| n > m) {
                best = Some((p, n));
            }
        }
        best.map(|(p, n)| (p, n as f64 / self.windows.len() as f64))
    }
}

impl<P: Copy + PartialEq + fmt::Display> WalkForwardResult<P> {
    /// Get summary string.
    pub fn summary(&self) -> String {
        let stability = self
            .parameter_stability()
            .map(|(p, share)| format!("{} ({:.0}% of windows)", p, share * 100.0))
            .unwrap_or_else(|| "n/a".to_string());

        format!(
            "Walk-Forward Results: {} windows\n\
             Avg Train Sharpe: {:.2}\n\
             Avg Test Sharpe: {:.2}\n\
             Most Selected: {}\n\
             \n\
             Out-of-Sample Days: {}\n\
             Out-of-Sample Sharpe: {:.2}\n\
             Out-of-Sample Return: {:.2}%\n\
             Out-of-Sample Max Drawdown: {:.2}%",
            self.windows.len(),
            self.avg_train_sharpe(),
            self.avg_test_sharpe(),
            stability,
            self.oos.len(),
            self.oos.sharpe(self.periods_per_year),
            self.oos.total_return() * 100.0,
            self.oos.max_drawdown() * 100.0,
        )
    }
}

fn mean_of(values: impl ExactSizeIterator<Item = f64>) -> f64 {
    let n = values.len();
    if n == 0 {
        return 0.0;
    }
    values.sum::<f64>() / n as f64
}

/// Sharpe of a backtest restricted to `[start, end]`.
fn span_sharpe(result: &BacktestResult, start: NaiveDate, end: NaiveDate, periods_per_year: u32) -> f64 {
    sharpe(result.slice_dates(start, end).strat_ret(), periods_per_year)
}

/// Select a hyperparameter per walk-forward window by training Sharpe and
/// evaluate it on the test span.
///
/// `builder` turns the full price history and one grid value into a frame
/// holding `signal_column` and the configured return column. Windows whose
/// spans hold too few price rows are skipped; if none qualify the result is
/// empty rather than an error. Output is deterministic: candidates may be
/// built in parallel but are always scored in grid order, and ties keep the
/// earliest grid value.
pub fn walkforward_select_param<P, B>(
    prices: &Frame,
    builder: &B,
    signal_column: &str,
    grid: &[P],
    config: &WalkForwardConfig,
) -> Result<WalkForwardResult<P>, WalkForwardError>
where
    P: Copy + fmt::Debug + Send + Sync,
    B: FeatureBuilder<P>,
{
    config.validate()?;
    if grid.is_empty() {
        return Err(WalkForwardError::EmptyGrid);
    }

    let all_windows = year_windows(&prices.years(), config.train_years, config.test_years);
    info!("Generated {} walk-forward windows", all_windows.len());

    let windows: Vec<(WalkForwardWindow, usize, usize)> = all_windows
        .into_iter()
        .filter_map(|w| {
            let train_rows = prices.rows_between(w.train_start, w.train_end);
            let test_rows = prices.rows_between(w.test_start, w.test_end);
            if train_rows < config.min_train_rows || test_rows < config.min_test_rows {
                info!(
                    "Skipping window {} (test {} to {}): {} train rows, {} test rows",
                    w.window_num, w.test_start, w.test_end, train_rows, test_rows
                );
                return None;
            }
            Some((w, train_rows, test_rows))
        })
        .collect();

    if windows.is_empty() {
        info!("No window has enough data; returning empty result");
        return Ok(WalkForwardResult {
            windows: Vec::new(),
            oos: OutOfSampleTrack::default(),
            periods_per_year: config.periods_per_year,
        });
    }

    info!("Building {} candidate backtests over full history", grid.len());
    let candidates: Vec<BacktestResult> = grid
        .par_iter()
        .map(|&param| -> Result<BacktestResult, WalkForwardError> {
            let features = builder.build(prices, param)?;
            let result = backtest_from_signal(
                &features,
                signal_column,
                &config.return_column,
                config.fee_bps,
            )?;
            debug!("Candidate {:?}: {} rows", param, result.len());
            Ok(result)
        })
        .collect::<Result<Vec<_>, WalkForwardError>>()?;

    let mut results = Vec::with_capacity(windows.len());
    let mut oos_rows: Vec<(NaiveDate, f64)> = Vec::new();

    for (window, train_rows, test_rows) in windows {
        let ppy = config.periods_per_year;

        let mut best_idx = 0;
        let mut best_sharpe = span_sharpe(&candidates[0], window.train_start, window.train_end, ppy);
        for (idx, candidate) in candidates.iter().enumerate().skip(1) {
            let s = span_sharpe(candidate, window.train_start, window.train_end, ppy);
            if s > best_sharpe {
                best_idx = idx;
                best_sharpe = s;
            }
        }

        let test = candidates[best_idx].slice_dates(window.test_start, window.test_end);
        let (dates, returns) = test.defined_returns();
        let test_sharpe = sharpe(&returns, ppy);
        let test_total_return = total_return(&returns);

        info!(
            "Window {}: train {} to {}, best param = {:?} (Sharpe {:.2}), test {} to {} Sharpe = {:.2}",
            window.window_num,
            window.train_start,
            window.train_end,
            grid[best_idx],
            best_sharpe,
            window.test_start,
            window.test_end,
            test_sharpe
        );

        oos_rows.extend(dates.into_iter().zip(returns));
        results.push(WindowResult {
            train_start: window.train_start,
            train_end: window.train_end,
            test_start: window.test_start,
            test_end: window.test_end,
            best_para: grid[best_idx],
            train_sharpe: best_sharpe,
            test_sharpe,
            test_total_return,
            train_rows,
            test_rows,
        });
    }

    Ok(WalkForwardResult {
        windows: results,
        oos: OutOfSampleTrack::from_segments(oos_rows),
        periods_per_year: config.periods_per_year,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::CLOSE;
    use crate::features::{momentum_features, SIGNAL_MOM};
    use approx::assert_relative_eq;
    use chrono::{Datelike, Duration, Weekday};

    fn weekday_prices(first_year: i32, last_year: i32) -> Frame {
        let mut day = NaiveDate::from_ymd_opt(first_year, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(last_year, 12, 31).unwrap();
        let mut index = Vec::new();
        let mut closes = Vec::new();
        let mut t = 0.0_f64;
        while day <= end {
            if !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
                index.push(day);
                closes.push(100.0 * (0.0003 * t + 0.02 * (t / 15.0).sin()).exp());
                t += 1.0;
            }
            day += Duration::days(1);
        }
        Frame::new(index).unwrap().with_column(CLOSE, closes).unwrap()
    }

    #[test]
    fn test_config_defaults() {
        let config: WalkForwardConfig =
            toml::from_str("train_years = 5\ntest_years = 1\nfee_bps = 1.0").unwrap();
        assert_eq!(config.periods_per_year, 252);
        assert_eq!(config.min_train_rows, 252);
        assert_eq!(config.min_test_rows, 100);
        assert_eq!(config.return_column, "ret_1d");
    }

    #[test]
    fn test_invalid_config_and_grid() {
        let prices = weekday_prices(2020, 2021);
        let config = WalkForwardConfig::new(0, 1, 1.0);
        assert!(matches!(
            walkforward_select_param(&prices, &momentum_features, SIGNAL_MOM, &[5_usize], &config),
            Err(WalkForwardError::InvalidConfig(_))
        ));

        let config = WalkForwardConfig::new(1, 1, 1.0);
        let grid: [usize; 0] = [];
        assert!(matches!(
            walkforward_select_param(&prices, &momentum_features, SIGNAL_MOM, &grid, &config),
            Err(WalkForwardError::EmptyGrid)
        ));
    }

    #[test]
    fn test_insufficient_data_is_empty() {
        // Two years cannot fill a 2 + 1 window.
        let prices = weekday_prices(2020, 2021);
        let config = WalkForwardConfig::new(2, 1, 1.0);
        let result =
            walkforward_select_param(&prices, &momentum_features, SIGNAL_MOM, &[5_usize, 10], &config)
                .unwrap();
        assert!(result.windows.is_empty());
        assert!(result.oos.is_empty());
        assert_eq!(result.parameter_stability(), None);
    }

    #[test]
    fn test_short_test_span_skipped() {
        // Final year holds only January.
        let full = weekday_prices(2018, 2021);
        let cutoff = NaiveDate::from_ymd_opt(2021, 1, 31).unwrap();
        let prices = full.slice_dates(full.first_date().unwrap(), cutoff);

        let config = WalkForwardConfig::new(1, 1, 1.0);
        let result =
            walkforward_select_param(&prices, &momentum_features, SIGNAL_MOM, &[5_usize, 10], &config)
                .unwrap();

        // Windows testing 2019 and 2020 qualify, 2021 does not.
        assert_eq!(result.windows.len(), 2);
        assert_eq!(result.windows[1].test_start.year(), 2020);
        assert!(result.oos.dates.iter().all(|d| d.year() < 2021));
    }

    #[test]
    fn test_tie_keeps_first_candidate() {
        // Every candidate yields the same signal, so every Sharpe ties.
        let prices = weekday_prices(2018, 2020);
        let flat = |p: &Frame, _: usize| -> Result<Frame, FrameError> {
            let features = crate::features::add_returns(p)?;
            let signal = vec![1.0; features.len()];
            features.with_column("always_long", signal)
        };
        let config = WalkForwardConfig::new(1, 1, 0.0);
        let result = walkforward_select_param(&prices, &flat, "always_long", &[30_usize, 10, 20], &config)
            .unwrap();

        assert!(result.windows.iter().all(|w| w.best_para == 30));
        assert_eq!(result.parameter_stability(), Some((30, 1.0)));
    }

    #[test]
    fn test_oos_track_matches_windows() {
        let prices = weekday_prices(2016, 2020);
        let config = WalkForwardConfig::new(2, 1, 1.0);
        let result =
            walkforward_select_param(&prices, &momentum_features, SIGNAL_MOM, &[5_usize, 20], &config)
                .unwrap();

        assert_eq!(result.windows.len(), 3);
        let expected_rows: usize = result.windows.iter().map(|w| w.test_rows).sum();
        assert_eq!(result.oos.len(), expected_rows);

        let compounded: f64 = result
            .windows
            .iter()
            .map(|w| 1.0 + w.test_total_return)
            .product();
        assert_relative_eq!(
            *result.oos.equity.last().unwrap(),
            compounded,
            epsilon = 1e-9
        );

        let frame = result.oos.to_frame().unwrap();
        assert_eq!(frame.column_names(), vec![STRAT_RET, EQUITY]);
        assert!(result.summary().contains("3 windows"));
    }

    #[test]
    fn test_row_counts_include_undefined_returns() {
        let prices = weekday_prices(2018, 2020);
        let gappy = |p: &Frame, _: usize| -> Result<Frame, FrameError> {
            let features = crate::features::add_returns(p)?;
            let ret: Vec<f64> = features
                .index()
                .iter()
                .zip(features.column(RET_1D)?)
                .map(|(d, &r)| if d.day() == 15 { f64::NAN } else { r })
                .collect();
            features
                .with_column(RET_1D, ret)?
                .with_column("always_long", vec![1.0; p.len()])
        };
        let config = WalkForwardConfig::new(1, 1, 1.0);
        let result =
            walkforward_select_param(&prices, &gappy, "always_long", &[1_usize], &config).unwrap();

        assert_eq!(result.windows.len(), 2);
        for w in &result.windows {
            let in_test = |d: &&NaiveDate| **d >= w.test_start && **d <= w.test_end;
            let gaps = prices.index().iter().filter(in_test).filter(|d| d.day() == 15).count();
            let defined = result.oos.dates.iter().filter(in_test).count();

            assert_eq!(w.test_rows, prices.rows_between(w.test_start, w.test_end));
            assert!(gaps > 0);
            assert_eq!(defined, w.test_rows - gaps);
        }
    }

    #[test]
    fn test_missing_signal_column() {
        let prices = weekday_prices(2018, 2020);
        let config = WalkForwardConfig::new(1, 1, 1.0);
        assert!(matches!(
            walkforward_select_param(&prices, &momentum_features, "nope", &[5_usize], &config),
            Err(WalkForwardError::Frame(FrameError::MissingColumn(_)))
        ));
    }

    #[test]
    fn test_parameter_stability_share() {
        let window = |p: usize| WindowResult {
            train_start: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            train_end: NaiveDate::from_ymd_opt(2020, 12, 31).unwrap(),
            test_start: NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
            test_end: NaiveDate::from_ymd_opt(2021, 12, 31).unwrap(),
            best_para: p,
            train_sharpe: 1.0,
            test_sharpe: 0.5,
            test_total_return: 0.1,
            train_rows: 252,
            test_rows: 252,
        };
        let result = WalkForwardResult {
            windows: vec![window(10), window(20), window(20), window(40)],
            oos: OutOfSampleTrack::default(),
            periods_per_year: 252,
        };
        assert_eq!(result.parameter_stability(), Some((20, 0.5)));
        assert_relative_eq!(result.avg_test_sharpe(), 0.5);
    }
}
