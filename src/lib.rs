pub mod address;
pub mod config;
pub mod enricher;
pub mod error;
pub mod fetch;
pub mod infra;
pub mod output;
pub mod publish;
pub mod quality;
pub mod records;
pub mod services;
pub mod table;
pub mod transform;

pub use error::{PipelineError, Result};
