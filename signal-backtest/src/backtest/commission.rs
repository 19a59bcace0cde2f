//! Transaction cost model.
//!
//! Costs are linear in turnover: trading one unit of exposure costs
//! `fee_bps / 10_000` of capital, whatever the direction.

use serde::{Deserialize, Serialize};

const BPS_PER_UNIT: f64 = 10_000.0;

/// Basis-point fee charged on turnover.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeeModel {
    /// Fee per unit of turnover, in basis points.
    pub fee_bps: f64,
}

impl Default for FeeModel {
    fn default() -> Self {
        Self { fee_bps: 1.0 }
    }
}

impl FeeModel {
    pub fn new(fee_bps: f64) -> Self {
        Self { fee_bps }
    }

    /// Create a zero-cost model.
    pub fn zero() -> Self {
        Self { fee_bps: 0.0 }
    }

    /// Fee as a fraction of capital per unit of turnover.
    pub fn rate(&self) -> f64 {
        self.fee_bps / BPS_PER_UNIT
    }

    /// Fee charged for a given turnover.
    pub fn charge(&self, turnover: f64) -> f64 {
        self.rate() * turnover
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_fee() {
        assert_eq!(FeeModel::default().fee_bps, 1.0);
    }

    #[test]
    fn test_rate_and_charge() {
        let model = FeeModel::new(5.0);
        assert_relative_eq!(model.rate(), 0.0005);

        // Full reversal from long to short is two units of turnover.
        assert_relative_eq!(model.charge(2.0), 0.001);
        assert_eq!(model.charge(0.0), 0.0);
    }

    #[test]
    fn test_zero_fee() {
        assert_eq!(FeeModel::zero().charge(3.0), 0.0);
    }
}
