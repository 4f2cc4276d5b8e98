use crate::ai::backend::{AiBackend, SYSTEM_PROMPT};
use crate::error::AiError;
use crate::sources::common::USER_AGENT;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

const DEFAULT_API_BASE: &str = "https://api.openai.com";

pub struct OpenAiBackend {
    client: Client,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    api_base: String,
}

impl OpenAiBackend {
    pub fn new(
        api_key: String,
        model: &str,
        max_tokens: u32,
        temperature: f32,
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
            temperature,
            api_base: DEFAULT_API_BASE.to_string(),
        })
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }
}

fn extract_message(value: &Value) -> Option<&str> {
    value
        .pointer("/choices/0/message/content")
        .and_then(|v| v.as_str())
}

#[async_trait]
impl AiBackend for OpenAiBackend {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn completion(&self, prompt: &str) -> Result<String, AiError> {
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": prompt }
            ],
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
        });

        let resp = self
            .client
            .post(format!(
                "{}/v1/chat/completions",
                self.api_base.trim_end_matches('/')
            ))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(AiError::Api {
                backend: "openai",
                status: status.as_u16(),
                body: text.chars().take(500).collect(),
            });
        }

        let value: Value =
            serde_json::from_str(&text).map_err(|e| AiError::Parse(e.to_string()))?;
        match extract_message(&value) {
            Some(answer) if !answer.trim().is_empty() => Ok(answer.to_string()),
            _ => Err(AiError::EmptyResponse("openai")),
        }
    }
}
