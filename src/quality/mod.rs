//! Data-quality scoring.
//!
//! Measures completeness, duplication and geocoding yield of a table and
//! folds them into a 100-point score and a letter grade.

pub mod analyzer;
pub mod grade;
pub mod types;
pub mod utility;

pub use analyzer::QualityAnalyzer;
pub use types::{Grade, QualityMetrics};
