//! Deduplicating geocoding enrichment.
//!
//! Two separate stages: [`cache::build_geocoding_cache`] resolves each unique
//! normalized address once, then [`merge::DataEnricher`] walks the records and
//! reattaches results by key. The cache is fully built before any merge runs.

pub mod cache;
pub mod merge;
pub mod stats;

pub use cache::{GeocodingCache, build_geocoding_cache};
pub use merge::DataEnricher;
pub use stats::EnrichmentStats;
