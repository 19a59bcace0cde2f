//! Volatility regime labelling.
//!
//! Marks each day as high or normal volatility by comparing the recent
//! realized volatility of close-to-close returns against a trailing quantile
//! of its own history.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::data::{Frame, FrameError, CLOSE};
use crate::features::rolling::{pct_change, rolling_quantile, rolling_std};

/// Rolling volatility column.
pub const VOL: &str = "vol";
/// Regime label column: 1.0 for high volatility, 0.0 otherwise.
pub const HIGH_VOL: &str = "high_vol";

/// Volatility regime with the numeric label stored in the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VolRegime {
    Normal,
    High,
}

impl VolRegime {
    pub fn label(&self) -> f64 {
        match self {
            Self::Normal => 0.0,
            Self::High => 1.0,
        }
    }

    pub fn from_label(label: f64) -> Option<Self> {
        if label == 0.0 {
            Some(Self::Normal)
        } else if label == 1.0 {
            Some(Self::High)
        } else {
            None
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Normal => "Normal volatility",
            Self::High => "High volatility",
        }
    }
}

/// Volatility regime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolRegimeConfig {
    /// Rows in the realized volatility window.
    #[serde(default = "default_vol_window")]
    pub vol_window: usize,
    /// Rows of volatility history the threshold is taken over.
    #[serde(default = "default_threshold_window")]
    pub threshold_window: usize,
    /// Quantile of trailing volatility above which a day is high-vol.
    #[serde(default = "default_quantile")]
    pub quantile: f64,
}

fn default_vol_window() -> usize {
    20
}

fn default_threshold_window() -> usize {
    252
}

fn default_quantile() -> f64 {
    0.7
}

impl Default for VolRegimeConfig {
    fn default() -> Self {
        Self {
            vol_window: default_vol_window(),
            threshold_window: default_threshold_window(),
            quantile: default_quantile(),
        }
    }
}

/// Add `vol` and `high_vol` columns.
///
/// Days where either the volatility or its threshold is still undefined are
/// labelled normal.
pub fn add_vol_regime(frame: &Frame, config: &VolRegimeConfig) -> Result<Frame, FrameError> {
    if config.vol_window == 0 || config.threshold_window == 0 {
        return Err(FrameError::InvalidParameter(
            "volatility windows must be at least 1".to_string(),
        ));
    }
    if !(0.0..=1.0).contains(&config.quantile) {
        return Err(FrameError::InvalidParameter(format!(
            "quantile {} outside [0, 1]",
            config.quantile
        )));
    }

    let returns = pct_change(frame.column(CLOSE)?, 1);
    let vol = rolling_std(&returns, config.vol_window);
    let threshold = rolling_quantile(&vol, config.threshold_window, config.quantile);

    let labels: Vec<f64> = vol
        .iter()
        .zip(&threshold)
        .map(|(v, t)| {
            if v > t {
                VolRegime::High.label()
            } else {
                VolRegime::Normal.label()
            }
        })
        .collect();

    let high_days = labels.iter().filter(|&&l| l == VolRegime::High.label()).count();
    debug!("Labelled {} of {} days as high volatility", high_days, labels.len());

    frame.with_column(VOL, vol)?.with_column(HIGH_VOL, labels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn prices(closes: Vec<f64>) -> Frame {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let index = (0..closes.len())
            .map(|i| start + Duration::days(i as i64))
            .collect();
        Frame::new(index).unwrap().with_column(CLOSE, closes).unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = VolRegimeConfig::default();
        assert_eq!(config.vol_window, 20);
        assert_eq!(config.threshold_window, 252);
        assert_eq!(config.quantile, 0.7);
    }

    #[test]
    fn test_volatility_burst_is_high() {
        // Calm drift, then large alternating moves.
        let mut closes = Vec::new();
        let mut price = 100.0;
        for i in 0..40 {
            price *= if i < 30 { 1.001 } else if i % 2 == 0 { 1.05 } else { 0.95 };
            closes.push(price);
        }
        let config = VolRegimeConfig {
            vol_window: 3,
            threshold_window: 10,
            quantile: 0.7,
        };
        let frame = add_vol_regime(&prices(closes), &config).unwrap();
        let labels = frame.column(HIGH_VOL).unwrap();

        // Undefined warm-up rows are normal.
        assert!(labels[..12].iter().all(|&l| l == 0.0));
        assert_eq!(labels[32], 1.0);
        assert!(labels.iter().all(|&l| l == 0.0 || l == 1.0));
        assert!(frame.column(VOL).unwrap()[0].is_nan());
    }

    #[test]
    fn test_invalid_config() {
        let config = VolRegimeConfig {
            vol_window: 0,
            ..Default::default()
        };
        assert!(add_vol_regime(&prices(vec![1.0, 2.0]), &config).is_err());

        let config = VolRegimeConfig {
            quantile: 1.5,
            ..Default::default()
        };
        assert!(add_vol_regime(&prices(vec![1.0, 2.0]), &config).is_err());
    }

    #[test]
    fn test_regime_labels() {
        assert_eq!(VolRegime::from_label(1.0), Some(VolRegime::High));
        assert_eq!(VolRegime::from_label(0.0), Some(VolRegime::Normal));
        assert_eq!(VolRegime::from_label(2.0), None);
        assert_eq!(VolRegime::High.description(), "High volatility");
    }
}
