//! Market regime labelling.
//!
//! Regimes are stored as numeric label columns on a frame so they can be fed
//! straight into `metrics::regime_summary`.

pub mod classifier;

pub use classifier::{add_vol_regime, VolRegime, VolRegimeConfig, HIGH_VOL, VOL};
