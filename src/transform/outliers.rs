//! Row filters that drop statistical outliers column by column.
//!
//! Columns are filtered one after the other, each on the table left by the
//! previous one, so later quartiles and means are computed on already
//! filtered rows. A row whose value is null in a filtered column is dropped.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::quality::utility::{mean, present, quantile, sample_stddev};
use crate::table::Table;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutlierMethod {
    /// Keep values within `[Q1 - k·IQR, Q3 + k·IQR]`.
    Iqr,
    /// Keep values with `|x - mean| / std < threshold`.
    ZScore,
}

impl OutlierMethod {
    pub fn default_threshold(self) -> f64 {
        match self {
            OutlierMethod::Iqr => 1.5,
            OutlierMethod::ZScore => 3.0,
        }
    }
}

impl FromStr for OutlierMethod {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "iqr" => Ok(OutlierMethod::Iqr),
            "zscore" | "z-score" => Ok(OutlierMethod::ZScore),
            _ => Err(PipelineError::UnknownOutlierMethod(s.to_string())),
        }
    }
}

impl fmt::Display for OutlierMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutlierMethod::Iqr => f.write_str("iqr"),
            OutlierMethod::ZScore => f.write_str("zscore"),
        }
    }
}

/// A validated outlier filter: method plus multiplier / threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutlierFilter {
    pub method: OutlierMethod,
    pub threshold: f64,
}

impl OutlierFilter {
    /// # Errors
    ///
    /// Fails if the threshold is not a finite positive number.
    pub fn new(method: OutlierMethod, threshold: Option<f64>) -> Result<Self> {
        let threshold = threshold.unwrap_or_else(|| method.default_threshold());
        if !threshold.is_finite() || threshold <= 0.0 {
            return Err(PipelineError::InvalidThreshold(threshold));
        }
        Ok(Self { method, threshold })
    }

    /// Builds a filter from a method name such as `"iqr"` or `"zscore"`.
    pub fn parse(method: &str, threshold: Option<f64>) -> Result<Self> {
        Self::new(method.parse()?, threshold)
    }

    /// Which rows of a single column survive the filter.
    pub fn keep_mask(&self, values: &[Option<f64>]) -> Vec<bool> {
        let data = present(values);

        match self.method {
            OutlierMethod::Iqr => {
                let (Some(q1), Some(q3)) = (quantile(&data, 0.25), quantile(&data, 0.75)) else {
                    return vec![false; values.len()];
                };
                let iqr = q3 - q1;
                let lower = q1 - self.threshold * iqr;
                let upper = q3 + self.threshold * iqr;
                debug!(q1, q3, lower, upper, "IQR bounds");

                values
                    .iter()
                    .map(|v| v.is_some_and(|x| x >= lower && x <= upper))
                    .collect()
            }
            OutlierMethod::ZScore => {
                let mu = mean(&data);
                match sample_stddev(&data, mu).filter(|sd| *sd > 0.0) {
                    Some(sd) => values
                        .iter()
                        .map(|v| v.is_some_and(|x| ((x - mu) / sd).abs() < self.threshold))
                        .collect(),
                    // no spread: nothing stands out
                    None => values.iter().map(Option::is_some).collect(),
                }
            }
        }
    }

    /// Filters `table` on each listed column in order and returns the number
    /// of rows removed. Columns absent from the table are skipped.
    ///
    /// # Errors
    ///
    /// Fails before touching the table if a listed column is not numeric.
    pub fn apply(&self, table: &mut Table, columns: &[String]) -> Result<usize> {
        for name in columns {
            if let Some(col) = table.column(name) {
                if col.as_numeric().is_none() {
                    return Err(PipelineError::NonNumericColumn(name.clone()));
                }
            }
        }

        let initial = table.row_count();

        for name in columns {
            let Some(values) = table.column(name).and_then(|c| c.as_numeric()) else {
                debug!(column = %name, "Outlier column not in table, skipping");
                continue;
            };
            let mask = self.keep_mask(values);
            table.retain_rows(&mask);
        }

        Ok(initial - table.row_count())
    }
}
