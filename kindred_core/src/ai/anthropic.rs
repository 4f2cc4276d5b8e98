use crate::ai::backend::{AiBackend, SYSTEM_PROMPT};
use crate::error::AiError;
use crate::sources::common::USER_AGENT;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

const DEFAULT_API_BASE: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

pub struct AnthropicBackend {
    client: Client,
    api_key: String,
    model: String,
    max_tokens: u32,
    api_base: String,
}

impl AnthropicBackend {
    pub fn new(
        api_key: String,
        model: &str,
        max_tokens: u32,
        timeout: Duration,
    ) -> Result<Self, AiError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            api_key,
            model: model.to_string(),
            max_tokens,
            api_base: DEFAULT_API_BASE.to_string(),
        })
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }
}

/// Join the text blocks of a Messages API response.
fn extract_text(value: &Value) -> String {
    value
        .get("content")
        .and_then(|c| c.as_array())
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default()
}

#[async_trait]
impl AiBackend for AnthropicBackend {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    async fn completion(&self, prompt: &str) -> Result<String, AiError> {
        let body = json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "system": SYSTEM_PROMPT,
            "messages": [ { "role": "user", "content": prompt } ],
        });

        let resp = self
            .client
            .post(format!("{}/v1/messages", self.api_base.trim_end_matches('/')))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(AiError::Api {
                backend: "anthropic",
                status: status.as_u16(),
                body: text.chars().take(500).collect(),
            });
        }

        let value: Value =
            serde_json::from_str(&text).map_err(|e| AiError::Parse(e.to_string()))?;
        let answer = extract_text(&value);
        if answer.trim().is_empty() {
            return Err(AiError::EmptyResponse("anthropic"));
        }
        Ok(answer)
    }
}
