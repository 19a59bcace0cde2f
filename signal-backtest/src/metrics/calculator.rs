//! Performance metrics calculator.
//!
//! All statistics skip undefined (`NaN`) entries. Degenerate inputs (empty or
//! zero-variance series) produce 0 rather than an error.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::backtest::BacktestResult;
use crate::data::FrameError;

/// Annualization factor for daily bars.
pub const TRADING_DAYS_PER_YEAR: u32 = 252;

/// Annualized Sharpe ratio with a zero risk-free rate.
///
/// Uses the population standard deviation (divisor N). Returns 0 when the
/// defined sample is empty or has zero spread.
pub fn sharpe(returns: &[f64], periods_per_year: u32) -> f64 {
    let defined: Vec<f64> = returns.iter().copied().filter(|r| !r.is_nan()).collect();
    if defined.is_empty() {
        return 0.0;
    }

    let std = defined.iter().population_std_dev();
    if std == 0.0 || std.is_nan() {
        return 0.0;
    }

    defined.iter().mean() / std * f64::from(periods_per_year).sqrt()
}

/// Most negative `equity / running_peak - 1`, or 0 for an empty curve.
pub fn max_drawdown(equity: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0_f64;

    for &value in equity.iter().filter(|v| !v.is_nan()) {
        peak = peak.max(value);
        worst = worst.min(value / peak - 1.0);
    }

    worst
}

/// Compounded return `prod(1 + r) - 1` over defined entries.
pub fn total_return(returns: &[f64]) -> f64 {
    returns
        .iter()
        .filter(|r| !r.is_nan())
        .fold(1.0, |acc, r| acc * (1.0 + r))
        - 1.0
}

/// Headline statistics of a backtest.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub sharpe: f64,
    pub max_drawdown: f64,
    /// `equity.last ^ (252 / rows) - 1`: annualized by observation count,
    /// not elapsed calendar time.
    pub ann_return: f64,
    pub avg_turnover: f64,
}

impl PerformanceSummary {
    /// Metric name to value.
    pub fn as_map(&self) -> BTreeMap<&'static str, f64> {
        BTreeMap::from([
            ("sharpe", self.sharpe),
            ("max_drawdown", self.max_drawdown),
            ("ann_return_approx", self.ann_return),
            ("avg_turnover", self.avg_turnover),
        ])
    }
}

impl fmt::Display for PerformanceSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Sharpe Ratio: {:.2}\n\
             Max Drawdown: {:.2}%\n\
             Ann. Return (approx): {:.2}%\n\
             Avg Turnover: {:.4}",
            self.sharpe,
            self.max_drawdown * 100.0,
            self.ann_return * 100.0,
            self.avg_turnover,
        )
    }
}

/// Summary statistics of a backtest result.
pub fn summary(result: &BacktestResult) -> PerformanceSummary {
    if result.is_empty() {
        return PerformanceSummary::default();
    }

    let rows = result.len() as f64;
    let ann_return =
        result.final_equity().powf(f64::from(TRADING_DAYS_PER_YEAR) / rows) - 1.0;

    let turnover: Vec<f64> = result
        .turnover()
        .iter()
        .copied()
        .filter(|t| !t.is_nan())
        .collect();
    let avg_turnover = if turnover.is_empty() {
        0.0
    } else {
        turnover.iter().mean()
    };

    PerformanceSummary {
        sharpe: sharpe(result.strat_ret(), TRADING_DAYS_PER_YEAR),
        max_drawdown: max_drawdown(result.equity()),
        ann_return,
        avg_turnover,
    }
}

/// Statistics for the rows sharing one regime label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeSummary {
    pub label: f64,
    pub rows: usize,
    pub summary: PerformanceSummary,
}

impl RegimeSummary {
    /// Output key, e.g. `regime=1`.
    pub fn key(&self) -> String {
        format!("regime={}", self.label)
    }
}

/// `summary` computed separately for each distinct value of `regime_column`.
///
/// Rows with undefined `strat_ret` or an undefined label are dropped first.
/// Groups come back in ascending label order.
pub fn regime_summary(
    result: &BacktestResult,
    regime_column: &str,
) -> Result<Vec<RegimeSummary>, FrameError> {
    let labels = result.frame().column(regime_column)?;
    let strat_ret = result.strat_ret();

    let mut distinct: Vec<f64> = labels
        .iter()
        .zip(strat_ret)
        .filter(|(l, r)| !l.is_nan() && !r.is_nan())
        .map(|(l, _)| *l)
        .collect();
    distinct.sort_by(|a, b| a.total_cmp(b));
    distinct.dedup();

    distinct
        .into_iter()
        .map(|label| {
            let mask: Vec<bool> = labels
                .iter()
                .zip(strat_ret)
                .map(|(l, r)| *l == label && !r.is_nan())
                .collect();
            let group = result.filter_rows(&mask)?;
            Ok(RegimeSummary {
                label,
                rows: group.len(),
                summary: summary(&group),
            })
        })
        .collect()
}

/// Deepest drawdown episode of an equity curve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrawdownAnalysis {
    pub max_drawdown: f64,
    pub peak_date: Option<NaiveDate>,
    pub trough_date: Option<NaiveDate>,
    /// First date the curve regained the prior peak, if it did.
    pub recovery_date: Option<NaiveDate>,
    pub duration_days: i64,
}

impl DrawdownAnalysis {
    /// Locate the deepest drawdown in `equity` indexed by `dates`.
    pub fn from_curve(dates: &[NaiveDate], equity: &[f64]) -> Self {
        let mut analysis = DrawdownAnalysis {
            max_drawdown: 0.0,
            peak_date: None,
            trough_date: None,
            recovery_date: None,
            duration_days: 0,
        };

        let mut peak = f64::NEG_INFINITY;
        let mut peak_date = None;
        let mut worst_peak = f64::NAN;

        for (&date, &value) in dates.iter().zip(equity).filter(|(_, v)| !v.is_nan()) {
            if value > peak {
                peak = value;
                peak_date = Some(date);
            }

            let drawdown = value / peak - 1.0;
            if drawdown < analysis.max_drawdown {
                analysis.max_drawdown = drawdown;
                analysis.peak_date = peak_date;
                analysis.trough_date = Some(date);
                analysis.recovery_date = None;
                worst_peak = peak;
            } else if analysis.recovery_date.is_none()
                && analysis.trough_date.is_some()
                && value >= worst_peak
            {
                analysis.recovery_date = Some(date);
            }
        }

        let end = analysis
            .recovery_date
            .or_else(|| dates.last().copied());
        if let (Some(start), Some(end)) = (analysis.peak_date, end) {
            analysis.duration_days = (end - start).num_days();
        }

        analysis
    }
}

/// Compounded strategy return for one calendar month.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlyReturn {
    pub year: i32,
    pub month: u32,
    pub return_pct: f64,
    pub days: usize,
}

/// Strategy returns grouped by calendar month, in date order.
pub fn monthly_returns(result: &BacktestResult) -> Vec<MonthlyReturn> {
    let mut months: Vec<MonthlyReturn> = Vec::new();

    let (dates, returns) = result.defined_returns();
    for (date, r) in dates.into_iter().zip(returns) {
        match months.last_mut() {
            Some(m) if m.year == date.year() && m.month == date.month() => {
                m.return_pct = ((1.0 + m.return_pct / 100.0) * (1.0 + r) - 1.0) * 100.0;
                m.days += 1;
            }
            _ => months.push(MonthlyReturn {
                year: date.year(),
                month: date.month(),
                return_pct: r * 100.0,
                days: 1,
            }),
        }
    }

    months
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtest::backtest_from_signal;
    use crate::data::Frame;
    use approx::assert_relative_eq;
    use chrono::Duration;

    fn dates(n: usize) -> Vec<NaiveDate> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 30).unwrap();
        (0..n).map(|i| start + Duration::days(i as i64)).collect()
    }

    fn backtest(signal: Vec<f64>, ret: Vec<f64>, regime: Vec<f64>) -> BacktestResult {
        let frame = Frame::new(dates(signal.len()))
            .unwrap()
            .with_column("signal", signal)
            .unwrap()
            .with_column("ret", ret)
            .unwrap()
            .with_column("regime", regime)
            .unwrap();
        backtest_from_signal(&frame, "signal", "ret", 0.0).unwrap()
    }

    #[test]
    fn test_sharpe_constant_and_empty() {
        assert_eq!(sharpe(&[0.01, 0.01, 0.01], 252), 0.0);
        assert_eq!(sharpe(&[], 252), 0.0);
        assert_eq!(sharpe(&[f64::NAN, f64::NAN], 252), 0.0);
    }

    #[test]
    fn test_sharpe_population_std() {
        // mean 0.01, population std 0.01
        let s = sharpe(&[0.0, 0.02, f64::NAN], 252);
        assert_relative_eq!(s, 252_f64.sqrt(), epsilon = 1e-9);
    }

    #[test]
    fn test_max_drawdown() {
        assert_eq!(max_drawdown(&[1.0, 1.1, 1.1, 1.3]), 0.0);
        assert_eq!(max_drawdown(&[]), 0.0);
        assert_relative_eq!(max_drawdown(&[1.0, 2.0, 1.5, f64::NAN, 1.0, 3.0]), -0.5);
    }

    #[test]
    fn test_total_return() {
        assert_relative_eq!(total_return(&[0.1, f64::NAN, -0.1]), 1.1 * 0.9 - 1.0);
        assert_eq!(total_return(&[]), 0.0);
    }

    #[test]
    fn test_summary() {
        let result = backtest(vec![1.0; 4], vec![0.0, 0.01, -0.02, 0.03], vec![0.0; 4]);
        let stats = summary(&result);

        let equity: f64 = 1.01 * 0.98 * 1.03;
        assert_relative_eq!(stats.ann_return, equity.powf(252.0 / 4.0) - 1.0, epsilon = 1e-9);
        assert_relative_eq!(stats.avg_turnover, 0.25);
        assert_relative_eq!(stats.max_drawdown, -0.02, epsilon = 1e-12);

        let map = stats.as_map();
        assert_eq!(map.len(), 4);
        assert!(map.contains_key("ann_return_approx"));
    }

    #[test]
    fn test_summary_empty() {
        let result = backtest(vec![], vec![], vec![]);
        assert_eq!(summary(&result), PerformanceSummary::default());
    }

    #[test]
    fn test_regime_summary_ordering() {
        let result = backtest(
            vec![1.0; 6],
            vec![f64::NAN, 0.01, 0.02, -0.01, 0.03, 0.0],
            vec![1.0, 1.0, 0.0, 1.0, f64::NAN, 0.0],
        );
        let groups = regime_summary(&result, "regime").unwrap();

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].key(), "regime=0");
        assert_eq!(groups[0].rows, 2);
        // Row 0 has undefined strat_ret and is dropped.
        assert_eq!(groups[1].key(), "regime=1");
        assert_eq!(groups[1].rows, 2);
    }

    #[test]
    fn test_regime_summary_missing_column() {
        let result = backtest(vec![1.0], vec![0.0], vec![0.0]);
        assert!(regime_summary(&result, "absent").is_err());
    }

    #[test]
    fn test_drawdown_analysis() {
        let d = dates(5);
        let analysis = DrawdownAnalysis::from_curve(&d, &[1.0, 1.2, 0.9, 1.1, 1.3]);
        assert_relative_eq!(analysis.max_drawdown, 0.9 / 1.2 - 1.0);
        assert_eq!(analysis.peak_date, Some(d[1]));
        assert_eq!(analysis.trough_date, Some(d[2]));
        assert_eq!(analysis.recovery_date, Some(d[4]));
        assert_eq!(analysis.duration_days, 3);
    }

    #[test]
    fn test_monthly_returns() {
        // Jan 30 .. Feb 2
        let result = backtest(vec![1.0; 4], vec![0.0, 0.1, 0.1, 0.1], vec![0.0; 4]);
        let months = monthly_returns(&result);
        assert_eq!(months.len(), 2);
        assert_eq!((months[0].month, months[0].days), (1, 2));
        assert_relative_eq!(months[1].return_pct, 21.0, epsilon = 1e-9);
    }
}
