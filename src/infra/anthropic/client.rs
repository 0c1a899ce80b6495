use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use reqwest::{Method, Request, Url};
use serde::Deserialize;
use serde_json::json;

use crate::config::NarratorConfig;
use crate::fetch::HttpClient;
use crate::fetch::auth::ApiKey;
use crate::quality::types::QualityMetrics;
use crate::services::narrator::{Narrator, metrics_context};

const API_VERSION: &str = "2023-06-01";

const RECOMMEND_SYSTEM: &str =
    "You are a data quality expert. Give concrete, actionable recommendations.";

const TRANSFORM_SYSTEM: &str =
    "You are a data engineering expert. Propose concrete cleaning steps, each with the columns it touches.";

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

/// [`Narrator`] backed by the Anthropic Messages API.
pub struct AnthropicNarrator<C> {
    http: ApiKey<C>,
    endpoint: Url,
    model: String,
    max_tokens: u32,
}

impl<C: HttpClient> AnthropicNarrator<C> {
    pub fn new(http: C, api_key: &str, config: &NarratorConfig) -> Result<Self> {
        Ok(Self {
            http: ApiKey::new(http, "x-api-key", api_key)?,
            endpoint: config
                .endpoint
                .parse()
                .with_context(|| format!("invalid narrator endpoint '{}'", config.endpoint))?,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        })
    }

    fn build_request(&self, system: &str, prompt: String) -> Result<Request> {
        let body = json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "system": system,
            "messages": [{
                "role": "user",
                "content": prompt,
            }],
        });

        let mut req = Request::new(Method::POST, self.endpoint.clone());
        let headers = req.headers_mut();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            HeaderName::from_static("anthropic-version"),
            HeaderValue::from_static(API_VERSION),
        );
        *req.body_mut() = Some(serde_json::to_vec(&body)?.into());
        Ok(req)
    }

    async fn complete(&self, system: &str, prompt: String) -> Result<String> {
        let req = self.build_request(system, prompt)?;
        let response = self
            .http
            .execute(req)
            .await
            .map_err(|e| anyhow!("Failed to send narrator request: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Narrator API returned status {}: {}", status, body));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| anyhow!("Failed to parse narrator response: {}", e))?;

        Ok(parsed
            .content
            .into_iter()
            .filter(|b| b.kind == "text")
            .map(|b| b.text)
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

#[async_trait]
impl<C: HttpClient> Narrator for AnthropicNarrator<C> {
    #[tracing::instrument(skip_all, fields(model = %self.model))]
    async fn recommend(&self, metrics: &QualityMetrics) -> Result<String> {
        let prompt = format!(
            "{}\n\nWhat are your 5 priority recommendations to improve this dataset?",
            metrics_context(metrics)
        );
        self.complete(RECOMMEND_SYSTEM, prompt).await
    }

    #[tracing::instrument(skip_all, fields(model = %self.model))]
    async fn suggest_transformations(&self, context: &str) -> Result<String> {
        let prompt = format!("{context}\n\nWhich further transformations do you recommend?");
        self.complete(TRANSFORM_SYSTEM, prompt).await
    }
}
