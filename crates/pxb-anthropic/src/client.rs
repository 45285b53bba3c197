use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use pxb_core::{AnalysisResult, ClusterContext, ResourceDescriptor};
use pxb_providers::AnalysisProvider;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::prompts;

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
pub const API_VERSION: &str = "2023-06-01";

#[derive(Clone, Debug)]
pub struct AnthropicSettings {
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// Joins the text blocks of a Messages API response.
fn response_text(resp: MessagesResponse) -> Result<String> {
    let text: Vec<String> = resp
        .content
        .into_iter()
        .filter(|b| b.kind == "text")
        .filter_map(|b| b.text)
        .collect();
    if text.is_empty() {
        bail!("response contained no text content");
    }
    Ok(text.join("\n"))
}

/// Analysis provider backed by the Anthropic Messages API.
pub struct AnthropicClient {
    http: Client,
    api_key: String,
    model: String,
    max_tokens: u32,
    base_url: String,
}

impl AnthropicClient {
    pub fn new(settings: &AnthropicSettings) -> Result<Self> {
        if settings.api_key.trim().is_empty() {
            bail!("anthropic api key is not configured");
        }
        let http = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .unwrap_or_else(|e| {
                error!(error = %e, "failed to build HTTP client with custom timeout, using default client");
                Client::new()
            });
        Ok(Self {
            http,
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, purpose: &str, prompt: &str) -> Result<String> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        debug!(model = %self.model, purpose, "sending messages request");
        let resp = self
            .http
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("{purpose} request"))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow!("{purpose}: API error {status}: {text}"));
        }

        let parsed: MessagesResponse = resp.json().await.with_context(|| format!("decode {purpose} response"))?;
        response_text(parsed).with_context(|| purpose.to_string())
    }
}

#[async_trait]
impl AnalysisProvider for AnthropicClient {
    async fn analyze(&self, resource: &ResourceDescriptor, context: Option<&ClusterContext>) -> Result<String> {
        self.complete("analysis", &prompts::analysis(resource, context)).await
    }

    async fn security_review(&self, resource: &ResourceDescriptor) -> Result<String> {
        self.complete("security review", &prompts::security_review(resource)).await
    }

    async fn optimization_review(&self, resource: &ResourceDescriptor) -> Result<String> {
        self.complete("optimization review", &prompts::optimization(resource)).await
    }

    async fn infra_template(&self, resource: &ResourceDescriptor) -> Result<String> {
        self.complete("terraform template", &prompts::terraform(resource)).await
    }

    async fn config_template(&self, resource: &ResourceDescriptor) -> Result<String> {
        self.complete("ansible playbook", &prompts::ansible(resource)).await
    }

    async fn summarize(&self, results: &[AnalysisResult], context: &ClusterContext) -> Result<String> {
        self.complete("infrastructure summary", &prompts::summary(results, context)).await
    }
}
