//! Error-budget drift analysis.

mod analyzer;

pub use analyzer::{DriftAnalyzer, DriftThresholds};
