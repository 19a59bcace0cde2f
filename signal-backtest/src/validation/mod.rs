//! Validation of price series before research runs.
//!
//! Integrity checks only report problems; cleaning happens in the data layer.

pub mod data_integrity;

pub use data_integrity::{
    CheckResult, DataIntegrityReport, DataIntegrityValidator, ValidationError, ValidationResult,
};
