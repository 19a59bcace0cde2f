//! Price series storage.
//!
//! Caches downloaded price history as parquet files named
//! `{symbol}_{start}_{end}.parquet` and loads price files supplied by the
//! user (parquet or CSV). Files hold a `date` column (`%Y-%m-%d` strings or a
//! polars `Date`) plus the OHLCV columns; column names are matched without
//! regard to case.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use polars::prelude::*;
use thiserror::Error;
use tracing::{debug, info};

use super::frame::{Frame, FrameError};
use super::types::{bars_to_frame, clean_bars, PriceBar, CLOSE, HIGH, LOW, OPEN, VOLUME};
use super::yahoo::{YahooClient, YahooError};

/// Name of the date column in stored files.
pub const DATE_COLUMN: &str = "date";

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("Price provider error: {0}")]
    Provider(#[from] YahooError),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Parquet cache and file loader for daily price series.
pub struct DataLoader {
    cache_dir: PathBuf,
}

impl DataLoader {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Path of the cache file for a symbol and requested range.
    pub fn cache_path(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> PathBuf {
        self.cache_dir
            .join(format!("{}_{}_{}.parquet", symbol, start, end))
    }

    /// Load a cached series, or `None` when nothing is cached for the range.
    pub fn load_cached(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Option<Frame>, LoaderError> {
        let path = self.cache_path(symbol, start, end);
        if !path.exists() {
            return Ok(None);
        }
        debug!("Cache hit: {}", path.display());
        self.load_file(&path).map(Some)
    }

    /// Write a price series to the cache, returning the file path.
    pub fn store(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        prices: &Frame,
    ) -> Result<PathBuf, LoaderError> {
        fs::create_dir_all(&self.cache_dir)?;
        let path = self.cache_path(symbol, start, end);

        let mut df = frame_to_dataframe(prices)?;
        let file = fs::File::create(&path)?;
        ParquetWriter::new(file)
            .with_compression(ParquetCompression::Zstd(Some(ZstdLevel::try_new(3)?)))
            .finish(&mut df)?;

        info!("Cached {} rows to {}", prices.len(), path.display());
        Ok(path)
    }

    /// Load a price series from a parquet or CSV file.
    pub fn load_file(&self, path: &Path) -> Result<Frame, LoaderError> {
        if !path.exists() {
            return Err(LoaderError::FileNotFound(path.display().to_string()));
        }

        let lf = match path.extension().and_then(|e| e.to_str()) {
            Some("csv") => LazyCsvReader::new(path).with_has_header(true).finish()?,
            _ => LazyFrame::scan_parquet(path, ScanArgsParquet::default())?,
        };

        dataframe_to_prices(&lf.collect()?)
    }

    /// Cached series if present, otherwise fetch, cache and return it.
    ///
    /// A fetch that yields no bars surfaces as
    /// `LoaderError::Provider(YahooError::NoData)`.
    pub async fn fetch_prices(
        &self,
        client: &YahooClient,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Frame, LoaderError> {
        if let Some(frame) = self.load_cached(symbol, start, end)? {
            return Ok(frame);
        }

        let bars = client.fetch_daily(symbol, start, end).await?;
        let frame = bars_to_frame(&bars)?;
        self.store(symbol, start, end, &frame)?;
        Ok(frame)
    }
}

/// Convert a frame to a polars DataFrame with a string `date` column.
pub fn frame_to_dataframe(frame: &Frame) -> Result<DataFrame, LoaderError> {
    let dates: Vec<String> = frame.index().iter().map(|d| d.to_string()).collect();

    let mut columns = Vec::with_capacity(frame.column_names().len() + 1);
    columns.push(Column::new(DATE_COLUMN.into(), dates));
    for name in frame.column_names() {
        let values = frame.column(name)?.to_vec();
        columns.push(Column::new(name.into(), values));
    }

    Ok(DataFrame::new(columns)?)
}

/// Build a cleaned price series from a DataFrame of raw bars.
pub fn dataframe_to_prices(df: &DataFrame) -> Result<Frame, LoaderError> {
    let dates = read_dates(df)?;
    let open = read_f64(df, OPEN)?;
    let high = read_f64(df, HIGH)?;
    let low = read_f64(df, LOW)?;
    let close = read_f64(df, CLOSE)?;
    let volume = read_f64(df, VOLUME)?;

    let bars: Vec<PriceBar> = dates
        .into_iter()
        .enumerate()
        .filter_map(|(i, date)| {
            Some(PriceBar {
                date: date?,
                open: open[i],
                high: high[i],
                low: low[i],
                close: close[i],
                volume: volume[i],
            })
        })
        .collect();

    Ok(bars_to_frame(&clean_bars(bars))?)
}

/// Resolve a column name ignoring case.
fn find_column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Column, LoaderError> {
    let resolved = df
        .get_column_names()
        .into_iter()
        .find(|c| c.as_str().eq_ignore_ascii_case(name))
        .map(|c| c.to_string())
        .ok_or_else(|| LoaderError::InvalidData(format!("Missing column: {}", name)))?;
    Ok(df.column(&resolved)?)
}

/// Read a numeric column as f64; nulls become NaN.
fn read_f64(df: &DataFrame, name: &str) -> Result<Vec<f64>, LoaderError> {
    let casted = find_column(df, name)?.cast(&DataType::Float64)?;
    Ok(casted
        .f64()?
        .into_iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect())
}

/// Read the date column, accepting strings or a polars `Date`.
fn read_dates(df: &DataFrame) -> Result<Vec<Option<NaiveDate>>, LoaderError> {
    let column = find_column(df, DATE_COLUMN)?;

    match column.dtype() {
        DataType::String => Ok(column
            .str()?
            .into_iter()
            .map(|s| s.and_then(parse_date))
            .collect()),
        DataType::Date => {
            let days = column.cast(&DataType::Int32)?;
            Ok(days
                .i32()?
                .into_iter()
                .map(|d| d.and_then(date_from_days))
                .collect())
        }
        other => Err(LoaderError::InvalidData(format!(
            "date column has unexpected type {}",
            other
        ))),
    }
}

/// Accepts `YYYY-MM-DD`, optionally followed by a time part.
fn parse_date(s: &str) -> Option<NaiveDate> {
    let day = s.get(..10).unwrap_or(s);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

/// Convert days since Unix epoch to NaiveDate.
fn date_from_days(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days + 719_163)
}
