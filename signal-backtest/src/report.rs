//! Result tables.
//!
//! Converts walk-forward and metric results into polars `DataFrame`s for
//! display and CSV export. Dates are written as `%Y-%m-%d` strings.

use std::fmt;
use std::fs;
use std::path::Path;

use polars::prelude::*;
use thiserror::Error;
use tracing::info;

use crate::metrics::{MonthlyReturn, PerformanceSummary};
use crate::walkforward::{OutOfSampleTrack, WindowResult};

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One row per walk-forward window. Empty input gives a zero-row table with
/// the same columns.
pub fn window_table<P: fmt::Display>(windows: &[WindowResult<P>]) -> PolarsResult<DataFrame> {
    let dates = |f: fn(&WindowResult<P>) -> chrono::NaiveDate| -> Vec<String> {
        windows.iter().map(|w| f(w).to_string()).collect()
    };

    DataFrame::new(vec![
        Column::new("train_start".into(), dates(|w| w.train_start)),
        Column::new("train_end".into(), dates(|w| w.train_end)),
        Column::new("test_start".into(), dates(|w| w.test_start)),
        Column::new("test_end".into(), dates(|w| w.test_end)),
        Column::new(
            "best_para".into(),
            windows.iter().map(|w| w.best_para.to_string()).collect::<Vec<_>>(),
        ),
        Column::new(
            "train_sharpe".into(),
            windows.iter().map(|w| w.train_sharpe).collect::<Vec<_>>(),
        ),
        Column::new(
            "test_sharpe".into(),
            windows.iter().map(|w| w.test_sharpe).collect::<Vec<_>>(),
        ),
        Column::new(
            "test_total_return".into(),
            windows.iter().map(|w| w.test_total_return).collect::<Vec<_>>(),
        ),
        Column::new(
            "train_rows".into(),
            windows.iter().map(|w| w.train_rows as u64).collect::<Vec<_>>(),
        ),
        Column::new(
            "test_rows".into(),
            windows.iter().map(|w| w.test_rows as u64).collect::<Vec<_>>(),
        ),
    ])
}

/// Out-of-sample track as `date`, `strat_ret`, `equity`.
pub fn oos_table(track: &OutOfSampleTrack) -> PolarsResult<DataFrame> {
    DataFrame::new(vec![
        Column::new(
            "date".into(),
            track.dates.iter().map(|d| d.to_string()).collect::<Vec<_>>(),
        ),
        Column::new("strat_ret".into(), track.strat_ret.clone()),
        Column::new("equity".into(), track.equity.clone()),
    ])
}

/// One row per labelled summary (a full-period run, or one row per regime).
pub fn summary_table(rows: &[(String, PerformanceSummary)]) -> PolarsResult<DataFrame> {
    let field = |f: fn(&PerformanceSummary) -> f64| -> Vec<f64> {
        rows.iter().map(|(_, s)| f(s)).collect()
    };

    DataFrame::new(vec![
        Column::new(
            "label".into(),
            rows.iter().map(|(l, _)| l.as_str()).collect::<Vec<_>>(),
        ),
        Column::new("sharpe".into(), field(|s| s.sharpe)),
        Column::new("max_drawdown".into(), field(|s| s.max_drawdown)),
        Column::new("ann_return_approx".into(), field(|s| s.ann_return)),
        Column::new("avg_turnover".into(), field(|s| s.avg_turnover)),
    ])
}

/// Calendar-month strategy returns, in percent.
pub fn monthly_table(months: &[MonthlyReturn]) -> PolarsResult<DataFrame> {
    DataFrame::new(vec![
        Column::new("year".into(), months.iter().map(|m| m.year).collect::<Vec<_>>()),
        Column::new("month".into(), months.iter().map(|m| m.month).collect::<Vec<_>>()),
        Column::new(
            "return_pct".into(),
            months.iter().map(|m| m.return_pct).collect::<Vec<_>>(),
        ),
        Column::new("days".into(), months.iter().map(|m| m.days as u64).collect::<Vec<_>>()),
    ])
}

/// Write a table as CSV with a header row, creating parent directories.
pub fn write_csv(df: &mut DataFrame, path: &Path) -> Result<(), ReportError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = fs::File::create(path)?;
    CsvWriter::new(&mut file).include_header(true).finish(df)?;
    info!("Wrote {} rows to {}", df.height(), path.display());
    Ok(())
}
