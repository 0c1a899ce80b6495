//! Data types produced by quality analysis.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Letter grade derived from the 100-point quality score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        };
        f.write_str(letter)
    }
}

/// Snapshot of one analysis run.
///
/// Rates and scores are rounded: `completeness_score` and
/// `avg_geocoding_score` to 3 decimals, percentages to 2.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub total_records: usize,
    pub valid_records: usize,
    pub completeness_score: f64,
    pub duplicates_count: usize,
    pub duplicates_pct: f64,
    pub geocoding_success_rate: f64,
    pub avg_geocoding_score: f64,
    pub null_counts: HashMap<String, usize>,
    pub quality_grade: Grade,
}
