//! Address normalization and extraction of geocoding candidates.
//!
//! [`normalize_address`] is the only way a cache key is derived. Extraction,
//! cache construction and merge lookup all go through it, so a record and its
//! cache entry always agree on the key.

use std::collections::BTreeSet;

use crate::records::Record;

/// Minimum length, in characters, of a normalized address worth geocoding.
const MIN_ADDRESS_CHARS: usize = 4;
/// Minimum number of whitespace-separated tokens.
const MIN_ADDRESS_TOKENS: usize = 2;

/// Canonicalizes a raw address into a cache key.
///
/// Keeps the part before the first comma, trims it and lowercases it.
/// Everything after the comma (city, postal code, country) is ignored.
pub fn normalize_address(raw: &str) -> String {
    raw.split(',').next().unwrap_or("").trim().to_lowercase()
}

/// Normalizes the address held in `field`, if the record has one as a string.
pub fn record_address(record: &Record, field: &str) -> Option<String> {
    record
        .text(field)
        .filter(|raw| !raw.is_empty())
        .map(normalize_address)
}

fn is_geocodable(normalized: &str) -> bool {
    normalized.chars().count() >= MIN_ADDRESS_CHARS
        && normalized.split_whitespace().count() >= MIN_ADDRESS_TOKENS
}

/// Collects the distinct normalized addresses worth geocoding.
///
/// Records with a missing, null or non-string address are skipped, as are
/// addresses too short or with a single token.
pub fn extract_addresses(records: &[Record], field: &str) -> BTreeSet<String> {
    records
        .iter()
        .filter_map(|r| record_address(r, field))
        .filter(|a| is_geocodable(a))
        .collect()
}
