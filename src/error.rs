//! Typed failures raised by the enrichment and cleaning core.
//!
//! Per-record and per-address problems never surface here; they are counted
//! and degrade to "not enriched". Only invalid configuration and failures at
//! the geocoding provider boundary are errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("unknown outlier method '{0}' (expected 'iqr' or 'zscore')")]
    UnknownOutlierMethod(String),

    #[error("unknown numeric imputation strategy '{0}' (expected 'median', 'mean', 'zero' or 'none')")]
    UnknownImputeStrategy(String),

    #[error("outlier threshold must be a finite positive number, got {0}")]
    InvalidThreshold(f64),

    #[error("column '{0}' is not numeric and cannot be filtered for outliers")]
    NonNumericColumn(String),

    #[error("column '{column}' has {actual} rows, expected {expected}")]
    RaggedTable {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("geocoding provider unreachable: {0}")]
    GeocoderTransport(#[from] reqwest::Error),

    #[error("geocoding provider returned a malformed response for '{address}': {source}")]
    GeocoderDecode {
        address: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid geocoding request for '{address}': {message}")]
    GeocoderRequest { address: String, message: String },

    #[error("geocoding task failed: {0}")]
    GeocoderTask(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
