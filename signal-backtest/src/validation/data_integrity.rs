//! Data integrity validation for daily price series.
//!
//! Validates:
//! - Schema (all OHLCV columns present)
//! - Finite values in every price column
//! - Bar consistency (High >= max(Open, Close), Low <= min(Open, Close))
//! - Positive prices and non-negative volume
//! - Date continuity (no calendar gap longer than a week)
//!
//! Checks only read the frame; nothing is repaired. Date ordering is not
//! checked here because `Frame` rejects unsorted or duplicate dates.

use std::path::Path;

use chrono::NaiveDate;
use thiserror::Error;

use crate::data::{DataLoader, Frame, FrameError, LoaderError, CLOSE, HIGH, LOW, OPEN, PRICE_COLUMNS, VOLUME};

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Loader error: {0}")]
    Loader(#[from] LoaderError),

    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),
}

pub type ValidationResult<T> = Result<T, ValidationError>;

/// Examples listed in a failing check's details.
const MAX_EXAMPLES: usize = 5;

/// Result of a single validation check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    pub message: String,
    pub details: Option<String>,
}

impl CheckResult {
    pub fn pass(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            passed: true,
            message: message.to_string(),
            details: None,
        }
    }

    pub fn fail(name: &str, message: &str, details: Option<String>) -> Self {
        Self {
            name: name.to_string(),
            passed: false,
            message: message.to_string(),
            details,
        }
    }
}

/// Complete data integrity report for one price series.
#[derive(Debug)]
pub struct DataIntegrityReport {
    pub symbol: String,
    pub row_count: usize,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub checks: Vec<CheckResult>,
}

impl DataIntegrityReport {
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn failed_checks(&self) -> Vec<&CheckResult> {
        self.checks.iter().filter(|c| !c.passed).collect()
    }

    pub fn summary(&self) -> String {
        let passed = self.checks.iter().filter(|c| c.passed).count();
        let range = match (self.start, self.end) {
            (Some(s), Some(e)) => format!("{} to {}", s, e),
            _ => "no data".to_string(),
        };
        format!(
            "{} ({} rows, {}): {}/{} checks passed",
            self.symbol,
            self.row_count,
            range,
            passed,
            self.checks.len()
        )
    }
}

/// Validator for price series integrity.
#[derive(Debug, Clone)]
pub struct DataIntegrityValidator {
    max_gap_days: i64,
}

impl Default for DataIntegrityValidator {
    fn default() -> Self {
        Self { max_gap_days: 7 }
    }
}

impl DataIntegrityValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Longest calendar gap between consecutive rows that still passes.
    pub fn with_max_gap_days(mut self, days: i64) -> Self {
        self.max_gap_days = days;
        self
    }

    /// Run all validation checks on a price series.
    pub fn validate(&self, symbol: &str, frame: &Frame) -> DataIntegrityReport {
        let mut checks = vec![self.check_schema(frame)];

        // Row-level checks need every column.
        if checks[0].passed {
            checks.push(self.check_finite(frame));
            checks.push(self.check_bar_consistency(frame));
            checks.push(self.check_price_validity(frame));
        }

        checks.push(self.check_date_continuity(frame));

        DataIntegrityReport {
            symbol: symbol.to_string(),
            row_count: frame.len(),
            start: frame.first_date(),
            end: frame.last_date(),
            checks,
        }
    }

    /// Load a parquet/CSV price file and validate it.
    pub fn validate_file(&self, symbol: &str, path: &Path) -> ValidationResult<DataIntegrityReport> {
        let loader = DataLoader::new(path.parent().unwrap_or(Path::new(".")));
        let frame = loader.load_file(path)?;
        Ok(self.validate(symbol, &frame))
    }

    /// Check that all OHLCV columns are present.
    fn check_schema(&self, frame: &Frame) -> CheckResult {
        let missing: Vec<&str> = PRICE_COLUMNS
            .iter()
            .copied()
            .filter(|c| !frame.has_column(c))
            .collect();

        if missing.is_empty() {
            CheckResult::pass(
                "schema",
                &format!("All {} price columns present", PRICE_COLUMNS.len()),
            )
        } else {
            CheckResult::fail(
                "schema",
                "Missing price columns",
                Some(format!("Missing: {:?}", missing)),
            )
        }
    }

    /// Check every price column for NaN or infinite values.
    fn check_finite(&self, frame: &Frame) -> CheckResult {
        let mut bad = Vec::new();
        for name in PRICE_COLUMNS {
            if let Ok(values) = frame.column(name) {
                let count = values.iter().filter(|v| !v.is_finite()).count();
                if count > 0 {
                    bad.push(format!("{}: {}", name, count));
                }
            }
        }

        if bad.is_empty() {
            CheckResult::pass("finite_values", "No missing or infinite values")
        } else {
            CheckResult::fail(
                "finite_values",
                "Non-finite values found",
                Some(bad.join(", ")),
            )
        }
    }

    /// Check High >= max(Open, Close) and Low <= min(Open, Close).
    fn check_bar_consistency(&self, frame: &Frame) -> CheckResult {
        let (Ok(open), Ok(high), Ok(low), Ok(close)) = (
            frame.column(OPEN),
            frame.column(HIGH),
            frame.column(LOW),
            frame.column(CLOSE),
        ) else {
            return CheckResult::fail("bar_consistency", "Price columns missing", None);
        };

        let bad: Vec<String> = frame
            .index()
            .iter()
            .enumerate()
            .filter(|&(i, _)| {
                high[i] < open[i].max(close[i]) || low[i] > open[i].min(close[i]) || low[i] > high[i]
            })
            .map(|(_, d)| d.to_string())
            .collect();

        if bad.is_empty() {
            CheckResult::pass("bar_consistency", "All bars have Low <= Open/Close <= High")
        } else {
            CheckResult::fail(
                "bar_consistency",
                &format!("{} inconsistent bars", bad.len()),
                Some(examples(&bad)),
            )
        }
    }

    /// Check prices > 0 and volume >= 0.
    fn check_price_validity(&self, frame: &Frame) -> CheckResult {
        let mut issues = Vec::new();

        for name in [OPEN, HIGH, LOW, CLOSE] {
            if let Ok(values) = frame.column(name) {
                let count = values.iter().filter(|&&v| v <= 0.0).count();
                if count > 0 {
                    issues.push(format!("{} non-positive {}", count, name));
                }
            }
        }

        if let Ok(volume) = frame.column(VOLUME) {
            let count = volume.iter().filter(|&&v| v < 0.0).count();
            if count > 0 {
                issues.push(format!("{} negative {}", count, VOLUME));
            }
        }

        if issues.is_empty() {
            CheckResult::pass("price_validity", "Prices positive, volume non-negative")
        } else {
            CheckResult::fail(
                "price_validity",
                &format!("{} price issues", issues.len()),
                Some(issues.join(", ")),
            )
        }
    }

    /// Check that no two consecutive rows are more than `max_gap_days` apart.
    fn check_date_continuity(&self, frame: &Frame) -> CheckResult {
        if frame.is_empty() {
            return CheckResult::fail("date_continuity", "No trading dates found", None);
        }

        let gaps: Vec<String> = frame
            .index()
            .windows(2)
            .filter_map(|w| {
                let gap_days = (w[1] - w[0]).num_days();
                (gap_days > self.max_gap_days)
                    .then(|| format!("{} to {} ({} days)", w[0], w[1], gap_days))
            })
            .collect();

        if gaps.is_empty() {
            CheckResult::pass(
                "date_continuity",
                &format!("{} trading days, no major gaps", frame.len()),
            )
        } else {
            CheckResult::fail(
                "date_continuity",
                &format!("{} major gaps found", gaps.len()),
                Some(examples(&gaps)),
            )
        }
    }
}

fn examples(items: &[String]) -> String {
    let shown = items.iter().take(MAX_EXAMPLES).cloned().collect::<Vec<_>>().join(", ");
    if items.len() > MAX_EXAMPLES {
        format!("{} (+{} more)", shown, items.len() - MAX_EXAMPLES)
    } else {
        shown
    }
}
