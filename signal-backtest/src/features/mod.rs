//! Feature and signal construction.
//!
//! All builders are backward-looking: the value at date `t` only uses rows
//! up to and including `t`, so a frame built over the full history can be
//! sliced to any window without leaking future data.

pub mod rolling;
pub mod signals;

pub use signals::{
    add_mean_reversion_signal, add_momentum_signal, add_returns, mean_reversion_features,
    momentum_features, Strategy, MOM, RET_1D, SIGNAL_MOM, SIGNAL_MR, Z_SCORE,
};

use crate::data::{Frame, FrameError};

/// Builds a feature/signal frame from the full price history and one
/// hyperparameter value.
pub trait FeatureBuilder<P>: Sync {
    fn build(&self, prices: &Frame, param: P) -> Result<Frame, FrameError>;
}

impl<P, F> FeatureBuilder<P> for F
where
    F: Fn(&Frame, P) -> Result<Frame, FrameError> + Sync,
{
    fn build(&self, prices: &Frame, param: P) -> Result<Frame, FrameError> {
        self(prices, param)
    }
}
