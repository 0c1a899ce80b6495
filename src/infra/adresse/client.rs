use async_trait::async_trait;
use reqwest::{Method, Request, StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::GeocoderConfig;
use crate::error::{PipelineError, Result};
use crate::fetch::HttpClient;
use crate::services::geocoder::{Geocoder, GeocodingResult};

const BASE_BACKOFF_MS: u64 = 250;
const MAX_BACKOFF_MS: u64 = 30_000;

/// Delay before retry number `attempt` (1-based): doubles from 250ms, capped at 30s.
fn backoff_delay(attempt: u32) -> Duration {
    // 250 << 7 already exceeds the cap
    let shift = attempt.saturating_sub(1).min(7);
    Duration::from_millis((BASE_BACKOFF_MS << shift).min(MAX_BACKOFF_MS))
}

#[derive(Deserialize)]
struct SearchResponse {
    features: Vec<Feature>,
}

#[derive(Deserialize)]
struct Feature {
    geometry: Option<Geometry>,
    #[serde(default)]
    properties: Properties,
}

#[derive(Deserialize)]
struct Geometry {
    /// `[longitude, latitude]`
    coordinates: Vec<f64>,
}

#[derive(Deserialize, Default)]
struct Properties {
    label: Option<String>,
    score: Option<f64>,
    city: Option<String>,
    postcode: Option<String>,
}

#[derive(Default)]
struct Counters {
    requests: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    retries: AtomicU64,
}

/// Request counters of an [`AdresseGeocoder`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GeocoderStats {
    pub requests: u64,
    pub successes: u64,
    pub failures: u64,
    pub retries: u64,
}

struct Inner<C> {
    http: C,
    search_url: Url,
    min_score: f64,
    max_retries: u32,
    counters: Counters,
}

/// Geocoder backed by the French national address search API
/// (`GET /search/?q=<address>&limit=1`).
///
/// Requests run concurrently up to the configured limit; results come back
/// in completion order. HTTP 429 and 5xx are retried with exponential
/// backoff. An address the API rejects or cannot match comes back invalid;
/// an unreachable API or an unreadable body fails the whole batch.
pub struct AdresseGeocoder<C> {
    inner: Arc<Inner<C>>,
    concurrency: usize,
}

impl<C: HttpClient + 'static> AdresseGeocoder<C> {
    pub fn new(http: C, config: &GeocoderConfig) -> Result<Self> {
        let base = config.base_url.trim_end_matches('/');
        let search_url =
            Url::parse(&format!("{base}/search/")).map_err(|e| PipelineError::GeocoderRequest {
                address: String::new(),
                message: format!("invalid base URL '{}': {e}", config.base_url),
            })?;

        Ok(Self {
            inner: Arc::new(Inner {
                http,
                search_url,
                min_score: config.min_score,
                max_retries: config.max_retries,
                counters: Counters::default(),
            }),
            concurrency: config.concurrency.max(1),
        })
    }

    pub fn stats(&self) -> GeocoderStats {
        let c = &self.inner.counters;
        GeocoderStats {
            requests: c.requests.load(Ordering::Relaxed),
            successes: c.successes.load(Ordering::Relaxed),
            failures: c.failures.load(Ordering::Relaxed),
            retries: c.retries.load(Ordering::Relaxed),
        }
    }
}

impl<C: HttpClient> Inner<C> {
    async fn geocode_one(&self, address: &str) -> Result<GeocodingResult> {
        let mut url = self.search_url.clone();
        url.query_pairs_mut()
            .append_pair("q", address)
            .append_pair("limit", "1");

        let mut attempt = 0;
        loop {
            self.counters.requests.fetch_add(1, Ordering::Relaxed);
            let resp = self.http.execute(Request::new(Method::GET, url.clone())).await?;
            let status = resp.status();

            if status.is_success() {
                let body = resp.bytes().await?;
                let parsed: SearchResponse =
                    serde_json::from_slice(&body).map_err(|source| PipelineError::GeocoderDecode {
                        address: address.to_string(),
                        source,
                    })?;
                let result = self.to_result(address, parsed);
                let counter = if result.is_valid {
                    &self.counters.successes
                } else {
                    &self.counters.failures
                };
                counter.fetch_add(1, Ordering::Relaxed);
                return Ok(result);
            }

            let retryable = status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
            if retryable && attempt < self.max_retries {
                attempt += 1;
                self.counters.retries.fetch_add(1, Ordering::Relaxed);
                let backoff = backoff_delay(attempt);
                debug!(address, %status, attempt, ?backoff, "Retrying geocoding request");
                tokio::time::sleep(backoff).await;
                continue;
            }

            warn!(address, %status, "Geocoding request rejected");
            self.counters.failures.fetch_add(1, Ordering::Relaxed);
            return Ok(GeocodingResult::invalid(address));
        }
    }

    fn to_result(&self, address: &str, response: SearchResponse) -> GeocodingResult {
        let Some(feature) = response.features.into_iter().next() else {
            return GeocodingResult::invalid(address);
        };

        let coords = feature
            .geometry
            .filter(|g| g.coordinates.len() >= 2)
            .map(|g| (g.coordinates[1], g.coordinates[0]));
        let props = feature.properties;
        let is_valid =
            coords.is_some() && props.score.is_some_and(|s| s >= self.min_score);

        GeocodingResult {
            original_address: address.to_string(),
            is_valid,
            label: props.label,
            latitude: coords.map(|(lat, _)| lat),
            longitude: coords.map(|(_, lon)| lon),
            city: props.city,
            postal_code: props.postcode,
            score: props.score,
        }
    }
}

#[async_trait]
impl<C: HttpClient + 'static> Geocoder for AdresseGeocoder<C> {
    #[tracing::instrument(skip_all, fields(addresses = addresses.len(), concurrency = self.concurrency))]
    async fn geocode_batch(&self, addresses: &[String]) -> Result<Vec<GeocodingResult>> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for address in addresses {
            let inner = self.inner.clone();
            let sem = semaphore.clone();
            let address = address.clone();
            tasks.spawn(async move {
                let _permit = sem.acquire_owned().await.ok();
                inner.geocode_one(&address).await
            });
        }

        let mut results = Vec::with_capacity(addresses.len());
        while let Some(joined) = tasks.join_next().await {
            // dropping `tasks` on error aborts the requests still in flight
            results.push(joined??);
        }

        let stats = self.stats();
        info!(
            requests = stats.requests,
            successes = stats.successes,
            failures = stats.failures,
            retries = stats.retries,
            "Geocoding batch finished"
        );

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Serves canned responses keyed by the `q` parameter. A queue per key
    /// lets a test script retries.
    #[derive(Default)]
    struct FakeApi {
        responses: Mutex<HashMap<String, Vec<(u16, String)>>>,
        queries: Mutex<Vec<String>>,
    }

    impl FakeApi {
        fn respond(self, q: &str, status: u16, body: &str) -> Self {
            self.responses
                .lock()
                .unwrap()
                .entry(q.to_string())
                .or_default()
                .push((status, body.to_string()));
            self
        }
    }

    #[async_trait]
    impl HttpClient for FakeApi {
        async fn execute(&self, req: Request) -> reqwest::Result<reqwest::Response> {
            let q = req
                .url()
                .query_pairs()
                .find(|(k, _)| k == "q")
                .map(|(_, v)| v.into_owned())
                .unwrap_or_default();
            self.queries.lock().unwrap().push(q.clone());

            let mut responses = self.responses.lock().unwrap();
            let queue = responses.entry(q).or_default();
            let (status, body) = if queue.len() > 1 {
                queue.remove(0)
            } else {
                queue.first().cloned().unwrap_or((200, r#"{"features":[]}"#.into()))
            };
            let resp = http::Response::builder().status(status).body(body).unwrap();
            Ok(reqwest::Response::from(resp))
        }
    }

    fn feature(label: &str, score: f64) -> String {
        format!(
            r#"{{"type":"FeatureCollection","features":[{{"geometry":{{"type":"Point","coordinates":[2.34,48.86]}},"properties":{{"label":"{label}","score":{score},"city":"Paris","postcode":"75001"}}}}]}}"#
        )
    }

    fn config() -> GeocoderConfig {
        GeocoderConfig {
            base_url: "http://geo.test/".into(),
            concurrency: 2,
            ..Default::default()
        }
    }

    fn batch(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_parses_feature_into_result() {
        let api = FakeApi::default().respond("10 rue de paris", 200, &feature("10 Rue de Paris 75001 Paris", 0.93));
        let geocoder = AdresseGeocoder::new(api, &config()).unwrap();

        let results = geocoder.geocode_batch(&batch(&["10 rue de paris"])).await.unwrap();

        assert_eq!(results.len(), 1);
        let r = &results[0];
        assert!(r.is_valid);
        assert_eq!(r.original_address, "10 rue de paris");
        assert_eq!(r.latitude, Some(48.86));
        assert_eq!(r.longitude, Some(2.34));
        assert_eq!(r.postal_code.as_deref(), Some("75001"));
        assert_eq!(r.score, Some(0.93));
    }

    #[tokio::test]
    async fn test_one_request_per_address() {
        let api = FakeApi::default()
            .respond("a b", 200, &feature("A", 0.5))
            .respond("c d", 200, &feature("C", 0.5));
        let geocoder = AdresseGeocoder::new(api, &config()).unwrap();

        let results = geocoder.geocode_batch(&batch(&["a b", "c d", "e f"])).await.unwrap();

        assert_eq!(results.len(), 3);
        let mut queries = geocoder.inner.http.queries.lock().unwrap().clone();
        queries.sort();
        assert_eq!(queries, vec!["a b", "c d", "e f"]);
        assert_eq!(geocoder.stats().successes, 2);
        assert_eq!(geocoder.stats().failures, 1);
    }

    #[tokio::test]
    async fn test_low_score_is_invalid() {
        let api = FakeApi::default().respond("a b", 200, &feature("A", 0.2));
        let cfg = GeocoderConfig {
            min_score: 0.4,
            ..config()
        };
        let geocoder = AdresseGeocoder::new(api, &cfg).unwrap();

        let results = geocoder.geocode_batch(&batch(&["a b"])).await.unwrap();
        assert!(!results[0].is_valid);
    }

    #[tokio::test]
    async fn test_retries_server_errors_then_succeeds() {
        let api = FakeApi::default()
            .respond("a b", 503, "")
            .respond("a b", 429, "")
            .respond("a b", 200, &feature("A", 0.8));
        let geocoder = AdresseGeocoder::new(api, &config()).unwrap();

        let results = geocoder.geocode_batch(&batch(&["a b"])).await.unwrap();

        assert!(results[0].is_valid);
        assert_eq!(geocoder.stats().retries, 2);
        assert_eq!(geocoder.stats().requests, 3);
    }

    #[test]
    fn test_backoff_doubles_then_caps() {
        assert_eq!(backoff_delay(1), Duration::from_millis(250));
        assert_eq!(backoff_delay(2), Duration::from_millis(500));
        assert_eq!(backoff_delay(7), Duration::from_millis(16_000));
        assert_eq!(backoff_delay(8), Duration::from_millis(MAX_BACKOFF_MS));
        assert_eq!(backoff_delay(65), Duration::from_millis(MAX_BACKOFF_MS));
        assert_eq!(backoff_delay(u32::MAX), Duration::from_millis(MAX_BACKOFF_MS));
    }

    #[tokio::test]
    async fn test_rejected_address_is_invalid_not_error() {
        let api = FakeApi::default().respond("a b", 400, r#"{"message":"q must contain"}"#);
        let geocoder = AdresseGeocoder::new(api, &config()).unwrap();

        let results = geocoder.geocode_batch(&batch(&["a b"])).await.unwrap();
        assert_eq!(results, vec![GeocodingResult::invalid("a b")]);
    }

    #[tokio::test]
    async fn test_malformed_body_fails_batch() {
        let api = FakeApi::default().respond("a b", 200, r#"{"unexpected":true}"#);
        let geocoder = AdresseGeocoder::new(api, &config()).unwrap();

        let err = geocoder.geocode_batch(&batch(&["a b"])).await.unwrap_err();
        assert!(matches!(err, PipelineError::GeocoderDecode { .. }));
    }
}
