//! Cleaning transformations: deduplication, imputation, outlier filtering
//! and derived columns, each recorded in an audit log.

pub mod impute;
pub mod outliers;
pub mod transformer;
pub mod types;

pub use impute::NumericStrategy;
pub use outliers::{OutlierFilter, OutlierMethod};
pub use transformer::DataTransformer;
pub use types::{FillValue, Transformation};
