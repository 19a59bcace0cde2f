//! Date-indexed column table.
//!
//! Every pipeline stage (price series, feature/signal frame, backtest result)
//! is a `Frame`. Frames are never mutated: adding a column returns a new frame
//! that shares its untouched columns with the source. Undefined cells are
//! `f64::NAN`.

use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FrameError {
    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Column {column} has {actual} rows, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("Index is not strictly increasing at {date}")]
    UnsortedIndex { date: NaiveDate },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Shared, read-only column storage.
pub type Column = Arc<[f64]>;

/// An ascending, duplicate-free date index with named numeric columns.
#[derive(Debug, Clone)]
pub struct Frame {
    index: Arc<[NaiveDate]>,
    columns: Vec<(String, Column)>,
}

impl Frame {
    /// Create a frame with no columns. The index must be strictly increasing.
    pub fn new(index: Vec<NaiveDate>) -> Result<Self, FrameError> {
        if let Some(pair) = index.windows(2).find(|w| w[1] <= w[0]) {
            return Err(FrameError::UnsortedIndex { date: pair[1] });
        }
        Ok(Self {
            index: index.into(),
            columns: Vec::new(),
        })
    }

    /// A frame with no rows and no columns.
    pub fn empty() -> Self {
        Self {
            index: Arc::from(Vec::new()),
            columns: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn index(&self) -> &[NaiveDate] {
        &self.index
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.index.first().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.index.last().copied()
    }

    /// Column names in insertion order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|(n, _)| n == name)
    }

    /// Borrow a column by name.
    pub fn column(&self, name: &str) -> Result<&[f64], FrameError> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, values)| &values[..])
            .ok_or_else(|| FrameError::MissingColumn(name.to_string()))
    }

    /// Clone the shared handle of a column.
    pub fn column_shared(&self, name: &str) -> Result<Column, FrameError> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, values)| Arc::clone(values))
            .ok_or_else(|| FrameError::MissingColumn(name.to_string()))
    }

    /// Return a new frame with `name` set to `values`.
    ///
    /// An existing column of the same name is replaced in place (same
    /// position); otherwise the column is appended.
    pub fn with_column(&self, name: &str, values: Vec<f64>) -> Result<Frame, FrameError> {
        self.with_shared_column(name, values.into())
    }

    pub fn with_shared_column(&self, name: &str, values: Column) -> Result<Frame, FrameError> {
        if values.len() != self.len() {
            return Err(FrameError::LengthMismatch {
                column: name.to_string(),
                expected: self.len(),
                actual: values.len(),
            });
        }

        let mut columns = self.columns.clone();
        match columns.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = values,
            None => columns.push((name.to_string(), values)),
        }

        Ok(Frame {
            index: Arc::clone(&self.index),
            columns,
        })
    }

    /// Rows whose date lies in `[start, end]` (both inclusive).
    pub fn slice_dates(&self, start: NaiveDate, end: NaiveDate) -> Frame {
        let (lo, hi) = self.date_bounds(start, end);
        Frame {
            index: self.index[lo..hi].into(),
            columns: self
                .columns
                .iter()
                .map(|(name, values)| (name.clone(), Column::from(&values[lo..hi])))
                .collect(),
        }
    }

    /// Number of rows whose date lies in `[start, end]`.
    pub fn rows_between(&self, start: NaiveDate, end: NaiveDate) -> usize {
        let (lo, hi) = self.date_bounds(start, end);
        hi - lo
    }

    /// Keep rows where `mask` is true.
    pub fn filter_rows(&self, mask: &[bool]) -> Result<Frame, FrameError> {
        if mask.len() != self.len() {
            return Err(FrameError::LengthMismatch {
                column: "<mask>".to_string(),
                expected: self.len(),
                actual: mask.len(),
            });
        }

        let keep: Vec<usize> = mask
            .iter()
            .enumerate()
            .filter_map(|(i, &k)| k.then_some(i))
            .collect();

        let index: Vec<NaiveDate> = keep.iter().map(|&i| self.index[i]).collect();
        let columns = self
            .columns
            .iter()
            .map(|(name, values)| {
                let taken: Vec<f64> = keep.iter().map(|&i| values[i]).collect();
                (name.clone(), Column::from(taken))
            })
            .collect();

        Ok(Frame {
            index: index.into(),
            columns,
        })
    }

    /// Sorted distinct calendar years present in the index.
    pub fn years(&self) -> Vec<i32> {
        let mut years: Vec<i32> = self.index.iter().map(|d| d.year()).collect();
        years.dedup();
        years
    }

    fn date_bounds(&self, start: NaiveDate, end: NaiveDate) -> (usize, usize) {
        let lo = self.index.partition_point(|d| *d < start);
        let hi = self.index.partition_point(|d| *d <= end);
        (lo, hi.max(lo))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample() -> Frame {
        Frame::new(vec![day(2020, 12, 30), day(2020, 12, 31), day(2021, 1, 4), day(2021, 1, 5)])
            .unwrap()
            .with_column("x", vec![1.0, 2.0, 3.0, 4.0])
            .unwrap()
    }

    #[test]
    fn test_rejects_unsorted_index() {
        let err = Frame::new(vec![day(2021, 1, 2), day(2021, 1, 1)]).unwrap_err();
        assert_eq!(err, FrameError::UnsortedIndex { date: day(2021, 1, 1) });
    }

    #[test]
    fn test_rejects_duplicate_dates() {
        assert!(Frame::new(vec![day(2021, 1, 1), day(2021, 1, 1)]).is_err());
    }

    #[test]
    fn test_missing_column() {
        let frame = sample();
        assert_eq!(
            frame.column("y").unwrap_err(),
            FrameError::MissingColumn("y".to_string())
        );
    }

    #[test]
    fn test_with_column_leaves_source_untouched() {
        let frame = sample();
        let derived = frame.with_column("x", vec![0.0; 4]).unwrap();
        assert_eq!(frame.column("x").unwrap(), &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(derived.column("x").unwrap(), &[0.0; 4]);
        assert_eq!(derived.column_names(), vec!["x"]);
    }

    #[test]
    fn test_with_column_length_mismatch() {
        let frame = sample();
        assert!(matches!(
            frame.with_column("y", vec![1.0]),
            Err(FrameError::LengthMismatch { expected: 4, actual: 1, .. })
        ));
    }

    #[test]
    fn test_slice_dates_inclusive() {
        let frame = sample();
        let sliced = frame.slice_dates(day(2021, 1, 1), day(2021, 12, 31));
        assert_eq!(sliced.index(), &[day(2021, 1, 4), day(2021, 1, 5)]);
        assert_eq!(sliced.column("x").unwrap(), &[3.0, 4.0]);
        assert_eq!(frame.rows_between(day(2020, 1, 1), day(2020, 12, 31)), 2);
    }

    #[test]
    fn test_slice_outside_range_is_empty() {
        let frame = sample();
        let sliced = frame.slice_dates(day(2022, 1, 1), day(2022, 12, 31));
        assert!(sliced.is_empty());
        assert!(sliced.has_column("x"));
    }

    #[test]
    fn test_filter_rows_and_years() {
        let frame = sample();
        let filtered = frame.filter_rows(&[true, false, false, true]).unwrap();
        assert_eq!(filtered.column("x").unwrap(), &[1.0, 4.0]);
        assert_eq!(frame.years(), vec![2020, 2021]);
    }
}
