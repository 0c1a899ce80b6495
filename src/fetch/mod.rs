mod client;
mod basic;
pub mod auth;

pub use client::HttpClient;
pub use basic::BasicClient;

use anyhow::{Context, Result};
use tracing::debug;

/// GETs `url` and returns the body, failing on a non-success status.
pub async fn fetch_bytes<C: HttpClient + ?Sized>(
    client: &C,
    url: &str,
) -> Result<Vec<u8>> {
    let req = reqwest::Request::new(
        reqwest::Method::GET,
        url.parse().with_context(|| format!("invalid URL '{url}'"))?,
    );

    let resp = client.execute(req).await?.error_for_status()?;
    let bytes = resp.bytes().await?.to_vec();
    debug!(url, bytes = bytes.len(), "Fetched payload");
    Ok(bytes)
}

/// Loads a payload from a local path, or over HTTP when it looks like a URL.
pub async fn load_source<C: HttpClient + ?Sized>(client: &C, source: &str) -> Result<Vec<u8>> {
    if source.starts_with("http://") || source.starts_with("https://") {
        fetch_bytes(client, source).await
    } else {
        std::fs::read(source).with_context(|| format!("failed to read '{source}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct Canned {
        status: u16,
        body: &'static str,
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl HttpClient for Canned {
        async fn execute(&self, req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
            self.seen.lock().unwrap().push(req.url().to_string());
            let resp = http::Response::builder()
                .status(self.status)
                .body(self.body)
                .unwrap();
            Ok(reqwest::Response::from(resp))
        }
    }

    #[tokio::test]
    async fn test_fetch_bytes_returns_body() {
        let client = Canned {
            status: 200,
            body: "[]",
            seen: Mutex::new(Vec::new()),
        };
        let bytes = fetch_bytes(&client, "https://example.org/products.json").await.unwrap();
        assert_eq!(bytes, b"[]");
        assert_eq!(client.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_bytes_fails_on_error_status() {
        let client = Canned {
            status: 503,
            body: "",
            seen: Mutex::new(Vec::new()),
        };
        assert!(fetch_bytes(&client, "https://example.org/x").await.is_err());
    }

    #[tokio::test]
    async fn test_load_source_reads_local_file() {
        let path = std::env::temp_dir().join("store_geo_quality_load_source.json");
        std::fs::write(&path, b"[{}]").unwrap();
        let client = Canned {
            status: 500,
            body: "",
            seen: Mutex::new(Vec::new()),
        };

        let bytes = load_source(&client, path.to_str().unwrap()).await.unwrap();

        assert_eq!(bytes, b"[{}]");
        assert!(client.seen.lock().unwrap().is_empty());
        std::fs::remove_file(&path).unwrap();
    }
}
