//! Trait and types for resolving store addresses to coordinates.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Outcome of geocoding one normalized address.
///
/// `original_address` is the key the address was requested under; all
/// correlation with the request happens through it, never through position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodingResult {
    pub original_address: String,
    pub is_valid: bool,
    pub label: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    /// Provider confidence in `[0, 1]`.
    pub score: Option<f64>,
}

impl GeocodingResult {
    /// A result marking `address` as unresolved.
    pub fn invalid(address: &str) -> Self {
        Self {
            original_address: address.to_string(),
            is_valid: false,
            label: None,
            latitude: None,
            longitude: None,
            city: None,
            postal_code: None,
            score: None,
        }
    }
}

/// Abstraction over a batch geocoding provider.
///
/// Implementations may return results in any order and may omit addresses
/// they could not resolve. An `Err` means the provider itself failed and the
/// whole batch is unusable.
#[async_trait::async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode_batch(&self, addresses: &[String]) -> Result<Vec<GeocodingResult>>;
}
