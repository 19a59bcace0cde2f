//! Backward-looking series helpers.
//!
//! Every output value at row `t` depends only on inputs at rows `<= t`.
//! A window containing an undefined (`NaN`) input yields `NaN`.

use statrs::statistics::Statistics;

/// `values[t] / values[t - periods] - 1`, undefined for the first `periods` rows.
pub fn pct_change(values: &[f64], periods: usize) -> Vec<f64> {
    (0..values.len())
        .map(|t| {
            if periods == 0 || t < periods {
                f64::NAN
            } else {
                values[t] / values[t - periods] - 1.0
            }
        })
        .collect()
}

fn rolling(values: &[f64], window: usize, f: impl Fn(&[f64]) -> f64) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if window == 0 || window > values.len() {
        return out;
    }
    for (i, w) in values.windows(window).enumerate() {
        if w.iter().all(|v| !v.is_nan()) {
            out[i + window - 1] = f(w);
        }
    }
    out
}

pub fn rolling_mean(values: &[f64], window: usize) -> Vec<f64> {
    rolling(values, window, |w| w.iter().mean())
}

/// Rolling standard deviation with divisor N.
pub fn rolling_std(values: &[f64], window: usize) -> Vec<f64> {
    rolling(values, window, |w| w.iter().population_std_dev())
}

/// Rolling quantile, linearly interpolated between order statistics.
pub fn rolling_quantile(values: &[f64], window: usize, q: f64) -> Vec<f64> {
    rolling(values, window, |w| quantile_linear(w, q))
}

fn quantile_linear(window: &[f64], q: f64) -> f64 {
    let mut sorted = window.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Sign that keeps `NaN` and maps zero to zero (`f64::signum` does neither).
pub fn sign(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        x * 0.0
    }
}

/// Sign of each value, carrying the last non-zero sign over zero or
/// undefined values; rows before the first non-zero sign are 0.
pub fn sign_ffill(values: &[f64]) -> Vec<f64> {
    let mut last = 0.0;
    values
        .iter()
        .map(|&v| {
            let s = sign(v);
            if s != 0.0 && !s.is_nan() {
                last = s;
            }
            last
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_pct_change() {
        let out = pct_change(&[100.0, 110.0, 99.0], 1);
        assert!(out[0].is_nan());
        assert_relative_eq!(out[1], 0.1, epsilon = 1e-12);
        assert_relative_eq!(out[2], -0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_rolling_mean_and_std() {
        let values = [1.0, 2.0, 3.0, 4.0];
        let mean = rolling_mean(&values, 2);
        assert!(mean[0].is_nan());
        assert_eq!(&mean[1..], &[1.5, 2.5, 3.5]);

        let std = rolling_std(&values, 2);
        assert_relative_eq!(std[3], 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_rolling_skips_windows_with_nan() {
        let out = rolling_mean(&[f64::NAN, 1.0, 2.0, 3.0], 2);
        assert!(out[1].is_nan());
        assert_eq!(out[2], 1.5);
    }

    #[test]
    fn test_window_longer_than_series() {
        assert!(rolling_mean(&[1.0, 2.0], 5).iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_quantile_interpolates() {
        assert_relative_eq!(quantile_linear(&[4.0, 1.0, 3.0, 2.0], 0.5), 2.5);
        assert_relative_eq!(quantile_linear(&[1.0, 2.0, 3.0, 4.0, 5.0], 0.7), 3.8, epsilon = 1e-12);
    }

    #[test]
    fn test_sign_ffill() {
        let out = sign_ffill(&[f64::NAN, 0.0, 0.3, 0.0, f64::NAN, -2.0, 0.0]);
        assert_eq!(out, vec![0.0, 0.0, 1.0, 1.0, 1.0, -1.0, -1.0]);
    }
}
