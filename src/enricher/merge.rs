//! Reattaches cached geocoding results to every record sharing an address.

use tracing::debug;

use crate::address::record_address;
use crate::enricher::cache::GeocodingCache;
use crate::enricher::stats::EnrichmentStats;
use crate::records::{GeoFields, Record};

/// Merges a [`GeocodingCache`] into records and counts the outcomes.
///
/// Counters start at zero and only grow for the lifetime of the enricher.
#[derive(Debug, Clone)]
pub struct DataEnricher {
    address_field: String,
    stats: EnrichmentStats,
}

impl DataEnricher {
    pub fn new(address_field: impl Into<String>) -> Self {
        Self {
            address_field: address_field.into(),
            stats: EnrichmentStats::default(),
        }
    }

    pub fn stats(&self) -> EnrichmentStats {
        self.stats
    }

    /// Returns one record per input, in order. Records whose address is
    /// missing or has no valid cache entry come back as plain copies.
    pub fn enrich(&mut self, records: &[Record], cache: &GeocodingCache) -> Vec<Record> {
        records
            .iter()
            .map(|record| self.enrich_one(record, cache))
            .collect()
    }

    fn enrich_one(&mut self, record: &Record, cache: &GeocodingCache) -> Record {
        self.stats.total_processed += 1;

        let hit = record_address(record, &self.address_field)
            .and_then(|key| cache.valid(&key).map(GeoFields::from_result));

        match hit {
            Some(geo) => {
                self.stats.successfully_enriched += 1;
                record.with_geo(geo)
            }
            None => {
                debug!(field = %self.address_field, "Record left unenriched");
                self.stats.failed_enrichment += 1;
                record.clone()
            }
        }
    }
}
