//! Geocoding cache: one provider lookup per unique normalized address.

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, info};

use crate::error::Result;
use crate::services::geocoder::{Geocoder, GeocodingResult};

/// Read-only mapping from normalized address to its geocoding outcome.
///
/// Built once by [`build_geocoding_cache`]; addresses the provider omitted
/// are simply absent and behave like an invalid entry on lookup.
#[derive(Debug, Default, Clone)]
pub struct GeocodingCache {
    entries: HashMap<String, GeocodingResult>,
}

impl GeocodingCache {
    pub fn get(&self, address: &str) -> Option<&GeocodingResult> {
        self.entries.get(address)
    }

    /// Returns the entry only if it resolved successfully.
    pub fn valid(&self, address: &str) -> Option<&GeocodingResult> {
        self.get(address).filter(|r| r.is_valid)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fraction of cached entries that resolved, in `[0, 1]`. Zero when empty.
    pub fn success_rate(&self) -> f64 {
        if self.entries.is_empty() {
            return 0.0;
        }
        let valid = self.entries.values().filter(|r| r.is_valid).count();
        valid as f64 / self.entries.len() as f64
    }
}

impl FromIterator<GeocodingResult> for GeocodingCache {
    /// Later results for the same key replace earlier ones.
    fn from_iter<I: IntoIterator<Item = GeocodingResult>>(iter: I) -> Self {
        let entries = iter
            .into_iter()
            .map(|r| (r.original_address.clone(), r))
            .collect();
        Self { entries }
    }
}

/// Geocodes every address exactly once and indexes the results by key.
///
/// Results may arrive in any order. Results for keys that were not requested
/// are dropped. A provider failure propagates; per-address misses do not.
#[tracing::instrument(skip_all, fields(addresses = addresses.len()))]
pub async fn build_geocoding_cache<G>(
    geocoder: &G,
    addresses: &BTreeSet<String>,
) -> Result<GeocodingCache>
where
    G: Geocoder + ?Sized,
{
    info!(unique = addresses.len(), "Geocoding unique addresses");

    if addresses.is_empty() {
        return Ok(GeocodingCache::default());
    }

    let batch: Vec<String> = addresses.iter().cloned().collect();
    let results = geocoder.geocode_batch(&batch).await?;

    let cache: GeocodingCache = results
        .into_iter()
        .filter(|r| {
            let requested = addresses.contains(&r.original_address);
            if !requested {
                debug!(address = %r.original_address, "Dropping result for unrequested address");
            }
            requested
        })
        .collect();

    info!(
        cached = cache.len(),
        success_rate_pct = cache.success_rate() * 100.0,
        "Geocoding cache built"
    );

    Ok(cache)
}
