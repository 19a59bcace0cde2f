//! Trading signals built from a price series.
//!
//! Each function returns a new frame with extra columns; the input is left
//! untouched. Signal values are in {-1, 0, +1} and use only data up to and
//! including their own row.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::data::{Frame, FrameError, CLOSE};

use super::rolling::{pct_change, rolling_mean, rolling_std, sign_ffill};

/// Close-to-close return column.
pub const RET_1D: &str = "ret_1d";
pub const MOM: &str = "mom";
pub const SIGNAL_MOM: &str = "signal_mom";
pub const Z_SCORE: &str = "z";
pub const SIGNAL_MR: &str = "signal_mr";

/// Add `ret_1d = Close[t] / Close[t-1] - 1`.
pub fn add_returns(frame: &Frame) -> Result<Frame, FrameError> {
    let close = frame.column(CLOSE)?;
    frame.with_column(RET_1D, pct_change(close, 1))
}

/// Momentum: sign of the close change over `lookback` rows.
pub fn add_momentum_signal(frame: &Frame, lookback: usize) -> Result<Frame, FrameError> {
    if lookback == 0 {
        return Err(FrameError::InvalidParameter(
            "momentum lookback must be at least 1".to_string(),
        ));
    }

    let mom = pct_change(frame.column(CLOSE)?, lookback);
    let signal = sign_ffill(&mom);

    frame.with_column(MOM, mom)?.with_column(SIGNAL_MOM, signal)
}

/// Mean reversion: short when Close sits above its rolling mean, long when
/// below. `z` uses the population standard deviation over `z_window` rows.
pub fn add_mean_reversion_signal(frame: &Frame, z_window: usize) -> Result<Frame, FrameError> {
    if z_window == 0 {
        return Err(FrameError::InvalidParameter(
            "z-score window must be at least 1".to_string(),
        ));
    }

    let close = frame.column(CLOSE)?;
    let mean = rolling_mean(close, z_window);
    let std = rolling_std(close, z_window);

    let z: Vec<f64> = close
        .iter()
        .zip(mean.iter().zip(&std))
        .map(|(c, (m, s))| (c - m) / s)
        .collect();
    let inverted: Vec<f64> = z.iter().map(|v| -v).collect();
    let signal = sign_ffill(&inverted);

    frame.with_column(Z_SCORE, z)?.with_column(SIGNAL_MR, signal)
}

/// Returns plus momentum signal; usable directly as a feature builder.
pub fn momentum_features(prices: &Frame, lookback: usize) -> Result<Frame, FrameError> {
    add_momentum_signal(&add_returns(prices)?, lookback)
}

/// Returns plus mean-reversion signal; usable directly as a feature builder.
pub fn mean_reversion_features(prices: &Frame, z_window: usize) -> Result<Frame, FrameError> {
    add_mean_reversion_signal(&add_returns(prices)?, z_window)
}

/// Built-in single-parameter strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Momentum,
    MeanReversion,
}

impl Strategy {
    /// Column holding this strategy's signal.
    pub fn signal_column(&self) -> &'static str {
        match self {
            Self::Momentum => SIGNAL_MOM,
            Self::MeanReversion => SIGNAL_MR,
        }
    }

    /// Build the feature/signal frame for `param` (lookback or z window).
    pub fn build(&self, prices: &Frame, param: usize) -> Result<Frame, FrameError> {
        match self {
            Self::Momentum => momentum_features(prices, param),
            Self::MeanReversion => mean_reversion_features(prices, param),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Momentum => write!(f, "momentum"),
            Self::MeanReversion => write!(f, "mean_reversion"),
        }
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "momentum" | "mom" => Ok(Self::Momentum),
            "mean_reversion" | "mr" => Ok(Self::MeanReversion),
            other => Err(format!("unknown strategy: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{Duration, NaiveDate};

    fn prices(closes: &[f64]) -> Frame {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let index = (0..closes.len())
            .map(|i| start + Duration::days(i as i64))
            .collect();
        Frame::new(index)
            .unwrap()
            .with_column(CLOSE, closes.to_vec())
            .unwrap()
    }

    #[test]
    fn test_returns() {
        let frame = add_returns(&prices(&[100.0, 102.0, 96.9])).unwrap();
        let ret = frame.column(RET_1D).unwrap();
        assert!(ret[0].is_nan());
        assert_relative_eq!(ret[1], 0.02, epsilon = 1e-12);
        assert_relative_eq!(ret[2], -0.05, epsilon = 1e-12);
    }

    #[test]
    fn test_momentum_signal() {
        let frame = momentum_features(&prices(&[10.0, 11.0, 12.0, 12.0, 9.0]), 2).unwrap();
        // mom: NaN, NaN, +0.2, +0.0909, -0.25
        assert_eq!(frame.column(SIGNAL_MOM).unwrap(), &[0.0, 0.0, 1.0, 1.0, -1.0]);

        // Trailing price return, not a change in daily returns.
        let mom = frame.column(MOM).unwrap();
        assert_relative_eq!(mom[2], 0.2, epsilon = 1e-12);
        assert_relative_eq!(mom[4], 9.0 / 12.0 - 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_momentum_flat_carries_previous_sign() {
        let frame = momentum_features(&prices(&[10.0, 11.0, 11.0, 11.0]), 1).unwrap();
        assert_eq!(frame.column(SIGNAL_MOM).unwrap(), &[0.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_mean_reversion_signal() {
        let frame = mean_reversion_features(&prices(&[10.0, 10.0, 12.0, 8.0]), 2).unwrap();
        let z = frame.column(Z_SCORE).unwrap();
        // Window [10, 10] has zero spread: z is undefined, signal stays 0.
        assert!(z[1].is_nan());
        assert_relative_eq!(z[2], 1.0, epsilon = 1e-12);
        assert_eq!(frame.column(SIGNAL_MR).unwrap(), &[0.0, 0.0, -1.0, 1.0]);
    }

    #[test]
    fn test_zero_window_rejected() {
        assert!(matches!(
            momentum_features(&prices(&[1.0, 2.0]), 0),
            Err(FrameError::InvalidParameter(_))
        ));
        assert!(mean_reversion_features(&prices(&[1.0, 2.0]), 0).is_err());
    }

    #[test]
    fn test_input_frame_untouched() {
        let input = prices(&[1.0, 2.0, 3.0]);
        let _ = momentum_features(&input, 1).unwrap();
        assert_eq!(input.column_names(), vec![CLOSE]);
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!("momentum".parse::<Strategy>().unwrap(), Strategy::Momentum);
        assert_eq!("mean-reversion".parse::<Strategy>().unwrap(), Strategy::MeanReversion);
        assert!("carry".parse::<Strategy>().is_err());
        assert_eq!(Strategy::MeanReversion.signal_column(), SIGNAL_MR);
    }
}
