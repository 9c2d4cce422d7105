//! Anthropic Messages API classifier.
//!
//! Endpoint: POST /v1/messages
//! Auth: `x-api-key` header

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{build_prompt, parse_classification, Classifier, ClassifyError, RawClassification};

/// Default model for classification
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

const DEFAULT_ENDPOINT: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

/// Classifier backed by the Anthropic Messages API
pub struct AnthropicClassifier {
    endpoint: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    timeout: Duration,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
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

impl AnthropicClassifier {
    /// Create a new client
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: api_key.into(),
            model: model.into(),
            max_tokens: 500,
            timeout,
            client: reqwest::Client::new(),
        }
    }

    /// Point the client at a different endpoint (proxies, local stubs)
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    async fn send(&self, prompt: String) -> Result<String, ClassifyError> {
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| ClassifyError::Unavailable(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ClassifyError::Unavailable(format!(
                "Anthropic API error ({}): {}",
                status,
                text.trim()
            )));
        }

        let body: MessagesResponse = response
            .json()
            .await
            .map_err(|e| ClassifyError::Malformed(format!("invalid response JSON: {}", e)))?;

        Ok(collect_text(&body))
    }
}

fn collect_text(body: &MessagesResponse) -> String {
    body.content
        .iter()
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text.as_deref())
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl Classifier for AnthropicClassifier {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn classify(&self, text: &str) -> Result<RawClassification, ClassifyError> {
        let reply = tokio::time::timeout(self.timeout, self.send(build_prompt(text)))
            .await
            .map_err(|_| ClassifyError::Timeout(self.timeout))??;

        parse_classification(&reply)
    }

    async fn health_check(&self) -> Result<(), ClassifyError> {
        if self.api_key.trim().is_empty() {
            return Err(ClassifyError::Unavailable(
                "ANTHROPIC_API_KEY is not set".to_string(),
            ));
        }
        Ok(())
    }
}
