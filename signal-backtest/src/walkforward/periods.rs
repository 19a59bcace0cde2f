//! Walk-forward window generation.
//!
//! Windows are built from whole calendar years: `train_years` consecutive
//! years followed by `test_years` consecutive years, advancing by
//! `test_years`. Boundaries are always Jan 1 and Dec 31, whatever the actual
//! first and last trading days of those years are.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A single train/test window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalkForwardWindow {
    /// Window number (1-indexed).
    pub window_num: usize,
    pub train_start: NaiveDate,
    pub train_end: NaiveDate,
    pub test_start: NaiveDate,
    pub test_end: NaiveDate,
}

impl WalkForwardWindow {
    /// Get training span length in calendar days.
    pub fn train_days(&self) -> i64 {
        (self.train_end - self.train_start).num_days() + 1
    }

    /// Get test span length in calendar days.
    pub fn test_days(&self) -> i64 {
        (self.test_end - self.test_start).num_days() + 1
    }
}

/// Windows over the sorted distinct `years` of a series.
///
/// Window `i` trains on `years[k..k + train_years]` and tests on
/// `years[k + train_years..k + train_years + test_years]` with
/// `k = i * test_years`. Years are taken by position, so a year missing from
/// the data is skipped over rather than producing an empty window.
pub fn year_windows(years: &[i32], train_years: usize, test_years: usize) -> Vec<WalkForwardWindow> {
    if train_years == 0 || test_years == 0 || years.len() < train_years + test_years {
        return Vec::new();
    }

    let last_start = years.len() - train_years - test_years;

    (0..=last_start)
        .step_by(test_years)
        .enumerate()
        .filter_map(|(i, k)| {
            let first_test = k + train_years;
            Some(WalkForwardWindow {
                window_num: i + 1,
                train_start: year_start(years[k])?,
                train_end: year_end(years[first_test - 1])?,
                test_start: year_start(years[first_test])?,
                test_end: year_end(years[first_test + test_years - 1])?,
            })
        })
        .collect()
}

fn year_start(year: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, 1, 1)
}

fn year_end(year: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, 12, 31)
}
