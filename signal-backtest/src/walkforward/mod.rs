//! Walk-forward validation module.
//!
//! Rolls calendar-year windows through the price history:
//! - Train: `train_years` years (hyperparameter selection by Sharpe)
//! - Test: the following `test_years` years (out-of-sample evaluation)
//! - Roll: `test_years`, so test spans never overlap

pub mod optimizer;
pub mod periods;

pub use optimizer::{
    walkforward_select_param, OutOfSampleTrack, WalkForwardConfig, WalkForwardError,
    WalkForwardResult, WindowResult,
};
pub use periods::{year_windows, WalkForwardWindow};
