use crate::fetch::client::HttpClient;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue};

/// An [`HttpClient`] wrapper that injects an API key as an HTTP header.
///
/// `header` is the header field to set (e.g. `"Authorization"` or a
/// provider-specific name such as `"x-api-key"`). The key is marked
/// sensitive so it never shows up in debug output.
pub struct ApiKey<C> {
    pub inner: C,
    header: HeaderName,
    value: HeaderValue,
}

impl<C> ApiKey<C> {
    /// # Errors
    ///
    /// Fails if the header name or key are not valid header text.
    pub fn new(inner: C, header_name: &str, key: &str) -> Result<Self> {
        let header = HeaderName::from_bytes(header_name.as_bytes())
            .with_context(|| format!("invalid header name '{header_name}'"))?;
        let mut value = HeaderValue::from_str(key).context("API key is not valid header text")?;
        value.set_sensitive(true);
        Ok(Self {
            inner,
            header,
            value,
        })
    }
}

#[async_trait]
impl<C: HttpClient> HttpClient for ApiKey<C> {
    async fn execute(&self, mut req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        req.headers_mut()
            .insert(self.header.clone(), self.value.clone());
        self.inner.execute(req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct HeaderEcho(Mutex<Vec<(String, String)>>);

    #[async_trait]
    impl HttpClient for HeaderEcho {
        async fn execute(&self, req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
            let mut seen = self.0.lock().unwrap();
            for (name, value) in req.headers() {
                seen.push((name.to_string(), value.to_str().unwrap().to_string()));
            }
            Ok(reqwest::Response::from(http::Response::new("")))
        }
    }

    #[tokio::test]
    async fn test_injects_header() {
        let client = ApiKey::new(HeaderEcho::default(), "x-api-key", "secret").unwrap();
        let req = reqwest::Request::new(reqwest::Method::GET, "https://example.org".parse().unwrap());

        client.execute(req).await.unwrap();

        let seen = client.inner.0.lock().unwrap();
        assert_eq!(seen.as_slice(), &[("x-api-key".to_string(), "secret".to_string())]);
    }

    #[test]
    fn test_invalid_header_is_rejected() {
        assert!(ApiKey::new(HeaderEcho::default(), "bad header", "k").is_err());
        assert!(ApiKey::new(HeaderEcho::default(), "x-api-key", "line\nbreak").is_err());
    }
}
