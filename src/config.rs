//! Pipeline configuration.
//!
//! Built from defaults, then an optional JSON file, then environment
//! variables. Secrets are not part of this struct; they are read from the
//! environment where they are used.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GeocoderConfig {
    pub base_url: String,
    /// Maximum requests in flight at once.
    pub concurrency: usize,
    /// Results scoring below this are marked invalid.
    pub min_score: f64,
    pub timeout_secs: u64,
    /// Retries for HTTP 429 and 5xx responses.
    pub max_retries: u32,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api-adresse.data.gouv.fr".to_string(),
            concurrency: 5,
            min_score: 0.0,
            timeout_secs: 30,
            max_retries: 3,
        }
    }
}

impl GeocoderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct NarratorConfig {
    pub endpoint: String,
    pub model: String,
    pub max_tokens: u32,
}

impl Default for NarratorConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.anthropic.com/v1/messages".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            max_tokens: 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Record field holding the raw store address.
    pub address_field: String,
    pub geocoder: GeocoderConfig,
    pub narrator: NarratorConfig,
    pub output_dir: String,
    pub reports_dir: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            address_field: "stores".to_string(),
            geocoder: GeocoderConfig::default(),
            narrator: NarratorConfig::default(),
            output_dir: "data".to_string(),
            reports_dir: "reports".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Loads the config from a JSON file at `path`; missing keys keep defaults.
    pub fn load(path: &str) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("failed to read config '{path}'"))?;
        let config = serde_json::from_str(&content)
            .with_context(|| format!("invalid config file '{path}'"))?;
        Ok(config)
    }

    /// Defaults, overlaid with `path` if given, overlaid with the environment.
    pub fn resolve(path: Option<&str>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Overrides fields from variables returned by `lookup`. Unparsable
    /// numbers are ignored with a warning.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parse<T: std::str::FromStr>(key: &str, raw: String, slot: &mut T) {
            match raw.parse() {
                Ok(v) => *slot = v,
                Err(_) => warn!(key, value = %raw, "Ignoring unparsable environment value"),
            }
        }

        if let Some(v) = lookup("STORE_ADDRESS_FIELD") {
            self.address_field = v;
        }
        if let Some(v) = lookup("GEOCODER_BASE_URL") {
            self.geocoder.base_url = v;
        }
        if let Some(v) = lookup("GEOCODER_CONCURRENCY") {
            parse("GEOCODER_CONCURRENCY", v, &mut self.geocoder.concurrency);
        }
        if let Some(v) = lookup("GEOCODER_MIN_SCORE") {
            parse("GEOCODER_MIN_SCORE", v, &mut self.geocoder.min_score);
        }
        if let Some(v) = lookup("NARRATOR_MODEL") {
            self.narrator.model = v;
        }
        if let Some(v) = lookup("OUTPUT_DIR") {
            self.output_dir = v;
        }
        if let Some(v) = lookup("REPORTS_DIR") {
            self.reports_dir = v;
        }
    }
}
