use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::error::PipelineError;
use crate::quality::utility::{mean, median, present};

/// How nulls in numeric columns are filled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericStrategy {
    #[default]
    Median,
    Mean,
    Zero,
    /// Leave nulls in place.
    None,
}

impl NumericStrategy {
    /// Fill value for a column, or `None` when nothing should be filled
    /// (no-op strategy, or no value to take a median/mean of).
    pub fn fill_value(self, values: &[Option<f64>]) -> Option<f64> {
        let values = present(values);
        match self {
            NumericStrategy::Median => median(&values),
            NumericStrategy::Mean if values.is_empty() => None,
            NumericStrategy::Mean => Some(mean(&values)),
            NumericStrategy::Zero => Some(0.0),
            NumericStrategy::None => None,
        }
    }
}

impl FromStr for NumericStrategy {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "median" => Ok(NumericStrategy::Median),
            "mean" => Ok(NumericStrategy::Mean),
            "zero" => Ok(NumericStrategy::Zero),
            "none" => Ok(NumericStrategy::None),
            _ => Err(PipelineError::UnknownImputeStrategy(s.to_string())),
        }
    }
}

impl fmt::Display for NumericStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NumericStrategy::Median => "median",
            NumericStrategy::Mean => "mean",
            NumericStrategy::Zero => "zero",
            NumericStrategy::None => "none",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_values() {
        let values = [Some(1.0), None, Some(3.0), Some(8.0)];
        assert_eq!(NumericStrategy::Median.fill_value(&values), Some(3.0));
        assert_eq!(NumericStrategy::Mean.fill_value(&values), Some(4.0));
        assert_eq!(NumericStrategy::Zero.fill_value(&values), Some(0.0));
        assert_eq!(NumericStrategy::None.fill_value(&values), None);
    }

    #[test]
    fn test_all_null_column_has_no_statistic() {
        let values = [None, None];
        assert_eq!(NumericStrategy::Median.fill_value(&values), None);
        assert_eq!(NumericStrategy::Mean.fill_value(&values), None);
        assert_eq!(NumericStrategy::Zero.fill_value(&values), Some(0.0));
    }

    #[test]
    fn test_parse() {
        assert_eq!("Median".parse::<NumericStrategy>().unwrap(), NumericStrategy::Median);
        assert_eq!("none".parse::<NumericStrategy>().unwrap(), NumericStrategy::None);
        assert!(matches!(
            "mode".parse::<NumericStrategy>(),
            Err(PipelineError::UnknownImputeStrategy(_))
        ));
    }
}
