//! Audit records for the cleaning chain.

use serde::Serialize;
use std::fmt;

use crate::transform::outliers::OutlierMethod;

/// Value substituted for nulls in a column.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FillValue {
    Number(f64),
    Text(String),
}

impl fmt::Display for FillValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FillValue::Number(n) => write!(f, "{n:.2}"),
            FillValue::Text(t) => write!(f, "'{t}'"),
        }
    }
}

/// One step applied by [`DataTransformer`](super::transformer::DataTransformer).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Transformation {
    DuplicatesRemoved {
        removed: usize,
    },
    NullsFilled {
        column: String,
        count: usize,
        fill: FillValue,
    },
    TextNormalized {
        columns: Vec<String>,
    },
    OutliersFiltered {
        method: OutlierMethod,
        removed: usize,
    },
    ColumnAdded {
        column: String,
    },
    Custom {
        name: String,
    },
}

impl fmt::Display for Transformation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transformation::DuplicatesRemoved { removed } => {
                write!(f, "Duplicates removed: {removed}")
            }
            Transformation::NullsFilled {
                column,
                count,
                fill,
            } => write!(f, "{column}: {count} nulls → {fill}"),
            Transformation::TextNormalized { columns } => {
                write!(f, "Text normalized: [{}]", columns.join(", "))
            }
            Transformation::OutliersFiltered { method, removed } => {
                write!(f, "Outliers filtered ({method}): {removed}")
            }
            Transformation::ColumnAdded { column } => write!(f, "Added: {column}"),
            Transformation::Custom { name } => write!(f, "Custom: {name}"),
        }
    }
}
