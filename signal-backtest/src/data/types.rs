//! Core price data types.
//!
//! A daily OHLCV bar and the conversion from a list of bars into the
//! `Frame` that every downstream stage consumes.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::frame::{Frame, FrameError};

pub const OPEN: &str = "Open";
pub const HIGH: &str = "High";
pub const LOW: &str = "Low";
pub const CLOSE: &str = "Close";
pub const VOLUME: &str = "Volume";

/// Columns every price series carries, in storage order.
pub const PRICE_COLUMNS: &[&str] = &[OPEN, HIGH, LOW, CLOSE, VOLUME];

/// Daily OHLCV bar for the traded asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl PriceBar {
    /// All five fields are present and finite.
    pub fn is_complete(&self) -> bool {
        [self.open, self.high, self.low, self.close, self.volume]
            .iter()
            .all(|v| v.is_finite())
    }
}

/// Drop incomplete bars, sort by date and keep the last bar seen for a
/// repeated date.
pub fn clean_bars(bars: Vec<PriceBar>) -> Vec<PriceBar> {
    let mut bars: Vec<PriceBar> = bars.into_iter().filter(PriceBar::is_complete).collect();
    // Stable sort, so among equal dates the later input bar stays last.
    bars.sort_by_key(|b| b.date);

    let mut cleaned: Vec<PriceBar> = Vec::with_capacity(bars.len());
    for bar in bars {
        match cleaned.last_mut() {
            Some(prev) if prev.date == bar.date => *prev = bar,
            _ => cleaned.push(bar),
        }
    }
    cleaned
}

/// Build a price series frame. Bars must already be cleaned.
pub fn bars_to_frame(bars: &[PriceBar]) -> Result<Frame, FrameError> {
    let index = bars.iter().map(|b| b.date).collect();
    Frame::new(index)?
        .with_column(OPEN, bars.iter().map(|b| b.open).collect())?
        .with_column(HIGH, bars.iter().map(|b| b.high).collect())?
        .with_column(LOW, bars.iter().map(|b| b.low).collect())?
        .with_column(CLOSE, bars.iter().map(|b| b.close).collect())?
        .with_column(VOLUME, bars.iter().map(|b| b.volume).collect())
}

/// Read the bars back out of a price series frame.
pub fn frame_to_bars(frame: &Frame) -> Result<Vec<PriceBar>, FrameError> {
    let open = frame.column(OPEN)?;
    let high = frame.column(HIGH)?;
    let low = frame.column(LOW)?;
    let close = frame.column(CLOSE)?;
    let volume = frame.column(VOLUME)?;

    Ok(frame
        .index()
        .iter()
        .enumerate()
        .map(|(i, &date)| PriceBar {
            date,
            open: open[i],
            high: high[i],
            low: low[i],
            close: close[i],
            volume: volume[i],
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(day: u32, close: f64) -> PriceBar {
        PriceBar {
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1_000.0,
        }
    }

    #[test]
    fn test_clean_bars_sorts_and_dedups() {
        let mut incomplete = bar(4, 10.0);
        incomplete.volume = f64::NAN;

        let cleaned = clean_bars(vec![bar(3, 3.0), bar(2, 2.0), bar(3, 30.0), incomplete]);

        assert_eq!(cleaned.len(), 2);
        assert_eq!(cleaned[0].close, 2.0);
        assert_eq!(cleaned[1].close, 30.0);
    }

    #[test]
    fn test_frame_round_trip() {
        let bars = vec![bar(2, 100.0), bar(3, 101.0)];
        let frame = bars_to_frame(&bars).unwrap();

        assert_eq!(frame.column_names(), PRICE_COLUMNS.to_vec());
        assert_eq!(frame.column(CLOSE).unwrap(), &[100.0, 101.0]);
        assert_eq!(frame_to_bars(&frame).unwrap(), bars);
    }
}
