//! Product records and decoding of the ingestion payload.

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::warn;

use crate::services::geocoder::GeocodingResult;

/// The six fields attached to a record by a successful enrichment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoFields {
    pub store_address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub geocoding_score: Option<f64>,
}

impl GeoFields {
    /// Column names in the order they are appended to a table.
    pub const COLUMNS: [&'static str; 6] = [
        "store_address",
        "latitude",
        "longitude",
        "city",
        "postal_code",
        "geocoding_score",
    ];

    pub fn from_result(result: &GeocodingResult) -> Self {
        Self {
            store_address: result.label.clone(),
            latitude: result.latitude,
            longitude: result.longitude,
            city: result.city.clone(),
            postal_code: result.postal_code.clone(),
            geocoding_score: result.score,
        }
    }

    /// Field/value pairs in [`GeoFields::COLUMNS`] order, absent values as `null`.
    pub fn entries(&self) -> [(&'static str, Value); 6] {
        fn num(v: Option<f64>) -> Value {
            v.and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .unwrap_or(Value::Null)
        }
        fn text(v: &Option<String>) -> Value {
            v.clone().map(Value::String).unwrap_or(Value::Null)
        }

        [
            ("store_address", text(&self.store_address)),
            ("latitude", num(self.latitude)),
            ("longitude", num(self.longitude)),
            ("city", text(&self.city)),
            ("postal_code", text(&self.postal_code)),
            ("geocoding_score", num(self.geocoding_score)),
        ]
    }
}

/// One product: an ordered open field map plus an optional typed geo block.
///
/// Enrichment never touches `fields`; it produces a new record carrying
/// [`GeoFields`]. When flattened, geo values win over raw fields of the
/// same name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Map<String, Value>,
    geo: Option<GeoFields>,
}

impl Record {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields, geo: None }
    }

    /// Builds a record from a JSON value, or `None` if it is not an object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self::new(fields)),
            _ => None,
        }
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn geo(&self) -> Option<&GeoFields> {
        self.geo.as_ref()
    }

    pub fn is_enriched(&self) -> bool {
        self.geo.is_some()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Returns the field only when it holds a string.
    pub fn text(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }

    pub(crate) fn with_geo(&self, geo: GeoFields) -> Self {
        Self {
            fields: self.fields.clone(),
            geo: Some(geo),
        }
    }

    /// Flattens raw fields and geo fields into a single JSON object.
    pub fn to_value(&self) -> Value {
        let mut out = self.fields.clone();
        if let Some(geo) = &self.geo {
            for (name, value) in geo.entries() {
                out.insert(name.to_string(), value);
            }
        }
        Value::Object(out)
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

/// Decodes product records from a JSON payload.
///
/// Accepts a bare array of objects or a catalogue search response carrying a
/// `products` array. Entries that are not objects are skipped.
///
/// # Errors
///
/// Returns an error if the bytes are not JSON or have neither shape.
pub fn parse_records(bytes: &[u8]) -> Result<Vec<Record>> {
    let value: Value = serde_json::from_slice(bytes)?;

    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut obj) => match obj.remove("products") {
            Some(Value::Array(items)) => items,
            _ => bail!("expected a JSON array or an object with a 'products' array"),
        },
        _ => bail!("expected a JSON array or an object with a 'products' array"),
    };

    let total = items.len();
    let records: Vec<Record> = items.into_iter().filter_map(Record::from_value).collect();

    if records.len() < total {
        warn!(
            skipped = total - records.len(),
            "Skipped non-object entries in record payload"
        );
    }

    Ok(records)
}
