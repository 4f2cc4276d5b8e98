use crate::ai::{AnthropicBackend, OpenAiBackend};
use crate::config::{AiConfig, DEFAULT_AI_TIMEOUT_MS};
use crate::error::AiError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const SYSTEM_PROMPT: &str = "You are a genealogy research assistant. \
Provide structured, helpful responses for family history research.";

/// A text-completion capability.
#[async_trait]
pub trait AiBackend: Send + Sync {
    fn name(&self) -> &'static str;

    async fn completion(&self, prompt: &str) -> Result<String, AiError>;
}

/// Backend selection with a fixed preference order.
///
/// The secondary backend is only used when no primary is configured; a
/// failing primary is never retried on the secondary. Every completion is
/// bounded by `timeout`, whatever the backend does.
#[derive(Clone)]
pub struct AiClient {
    primary: Option<Arc<dyn AiBackend>>,
    secondary: Option<Arc<dyn AiBackend>>,
    timeout: Duration,
}

impl Default for AiClient {
    fn default() -> Self {
        Self::new(None, None)
    }
}

impl AiClient {
    pub fn new(
        primary: Option<Arc<dyn AiBackend>>,
        secondary: Option<Arc<dyn AiBackend>>,
    ) -> Self {
        Self {
            primary,
            secondary,
            timeout: Duration::from_millis(DEFAULT_AI_TIMEOUT_MS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    /// Anthropic first, OpenAI second, each only if its key is usable.
    pub fn from_config(config: &AiConfig) -> Self {
        let timeout = Duration::from_millis(config.timeout_ms);
        let primary = config.anthropic_key().and_then(|key| {
            match AnthropicBackend::new(key, &config.anthropic_model, config.max_tokens, timeout) {
                Ok(b) => Some(Arc::new(b) as Arc<dyn AiBackend>),
                Err(e) => {
                    warn!(backend = "anthropic", error = %e, "AI backend unavailable");
                    None
                }
            }
        });
        let secondary = config.openai_key().and_then(|key| {
            match OpenAiBackend::new(
                key,
                &config.openai_model,
                config.max_tokens,
                config.temperature,
                timeout,
            ) {
                Ok(b) => Some(Arc::new(b) as Arc<dyn AiBackend>),
                Err(e) => {
                    warn!(backend = "openai", error = %e, "AI backend unavailable");
                    None
                }
            }
        });
        Self::new(primary, secondary).with_timeout(timeout)
    }

    pub fn is_available(&self) -> bool {
        self.selected().is_some()
    }

    pub fn backend_name(&self) -> Option<&'static str> {
        self.selected().map(|b| b.name())
    }

    fn selected(&self) -> Option<&Arc<dyn AiBackend>> {
        self.primary.as_ref().or(self.secondary.as_ref())
    }

    /// Run `prompt` on exactly one backend.
    pub async fn completion(&self, prompt: &str) -> Result<String, AiError> {
        let backend = self.selected().ok_or(AiError::NotConfigured)?;
        debug!(backend = backend.name(), prompt_len = prompt.len(), "AI completion");
        match tokio::time::timeout(self.timeout, backend.completion(prompt)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    backend = backend.name(),
                    timeout_ms = self.timeout.as_millis() as u64,
                    "AI completion timed out"
                );
                Err(AiError::Timeout(self.timeout.as_millis() as u64))
            }
        }
    }
}

impl std::fmt::Debug for AiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AiClient")
            .field("primary", &self.primary.as_ref().map(|b| b.name()))
            .field("secondary", &self.secondary.as_ref().map(|b| b.name()))
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::testing::Canned;

    #[tokio::test]
    async fn test_primary_preferred_secondary_untouched() {
        let primary = Canned::ok("primary", "from primary");
        let secondary = Canned::ok("secondary", "from secondary");
        let client = AiClient::new(Some(primary.clone()), Some(secondary.clone()));

        assert_eq!(client.completion("hi").await.unwrap(), "from primary");
        assert_eq!(primary.calls(), 1);
        assert_eq!(secondary.calls(), 0);
    }

    #[tokio::test]
    async fn test_failing_primary_does_not_fall_through() {
        let primary = Canned::failing("primary");
        let secondary = Canned::ok("secondary", "unused");
        let client = AiClient::new(Some(primary.clone()), Some(secondary.clone()));

        assert!(client.completion("hi").await.is_err());
        assert_eq!(secondary.calls(), 0);
    }

    #[tokio::test]
    async fn test_secondary_used_when_no_primary() {
        let secondary = Canned::ok("secondary", "answer");
        let client = AiClient::new(None, Some(secondary.clone()));
        assert_eq!(client.backend_name(), Some("secondary"));
        assert_eq!(client.completion("hi").await.unwrap(), "answer");
    }

    #[tokio::test]
    async fn test_disabled_is_not_configured() {
        let client = AiClient::disabled();
        assert!(!client.is_available());
        assert!(matches!(
            client.completion("hi").await,
            Err(AiError::NotConfigured)
        ));
    }

    struct Stalled;

    #[async_trait]
    impl AiBackend for Stalled {
        fn name(&self) -> &'static str {
            "stalled"
        }

        async fn completion(&self, _prompt: &str) -> Result<String, AiError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_stalled_backend_times_out() {
        let client = AiClient::new(Some(Arc::new(Stalled)), None)
            .with_timeout(Duration::from_millis(50));
        assert!(matches!(
            client.completion("hi").await,
            Err(AiError::Timeout(50))
        ));
    }

    #[test]
    fn test_from_config_ignores_placeholder_keys() {
        let config = AiConfig {
            anthropic_api_key: Some("your-anthropic-key-here".into()),
            openai_api_key: Some("sk-real".into()),
            ..AiConfig::default()
        };
        let client = AiClient::from_config(&config);
        assert_eq!(client.backend_name(), Some("openai"));

        assert!(!AiClient::from_config(&AiConfig::default()).is_available());
    }
}
