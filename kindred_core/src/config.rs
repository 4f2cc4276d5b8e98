//! Runtime configuration.
//!
//! Loaded from `~/.config/kindred/config.toml` (or `--config`), then
//! overlaid with the provider environment variables. Every section has
//! defaults, so an empty or missing file is valid.

use crate::auth::{usable_secret, AuthDetails};
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Default per-source timeout in milliseconds
pub const DEFAULT_SOURCE_TIMEOUT_MS: u64 = 10_000;

/// Default whole-request timeout in milliseconds
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-5-sonnet-20241022";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4";
pub const DEFAULT_MAX_TOKENS: u32 = 1000;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Default limit for one AI completion in milliseconds
pub const DEFAULT_AI_TIMEOUT_MS: u64 = 20_000;

/// (source id, credential field, environment variable)
const SOURCE_ENV: &[(&str, &str, &str)] = &[
    ("ancestry", "api_key", "ANCESTRY_API_KEY"),
    ("familysearch", "username", "FAMILYSEARCH_USERNAME"),
    ("familysearch", "access_token", "FAMILYSEARCH_ACCESS_TOKEN"),
    ("findmypast", "api_key", "FINDMYPAST_API_KEY"),
    ("myheritage", "api_key", "MYHERITAGE_API_KEY"),
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KindredConfig {
    /// Credential bundle per source id
    #[serde(default)]
    pub sources: HashMap<String, AuthDetails>,

    #[serde(default)]
    pub ai: AiConfig,

    #[serde(default)]
    pub search: SearchSettings,

    #[serde(default)]
    pub history: HistorySettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSettings {
    /// Per-source timeout (default: 10000)
    #[serde(default = "default_source_timeout_ms")]
    pub source_timeout_ms: u64,

    /// Whole fan-out timeout (default: 30000)
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Optional cap on concurrently running adapter calls
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrency: Option<usize>,

    /// Sources used when a request names none (empty = all registered)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub default_sources: Vec<String>,
}

fn default_source_timeout_ms() -> u64 {
    DEFAULT_SOURCE_TIMEOUT_MS
}

fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            source_timeout_ms: DEFAULT_SOURCE_TIMEOUT_MS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            max_concurrency: None,
            default_sources: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anthropic_api_key: Option<String>,

    #[serde(default = "default_anthropic_model")]
    pub anthropic_model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openai_api_key: Option<String>,

    #[serde(default = "default_openai_model")]
    pub openai_model: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Limit for one completion, connect to last byte (default: 20000)
    #[serde(default = "default_ai_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_anthropic_model() -> String {
    DEFAULT_ANTHROPIC_MODEL.to_string()
}

fn default_openai_model() -> String {
    DEFAULT_OPENAI_MODEL.to_string()
}

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

fn default_ai_timeout_ms() -> u64 {
    DEFAULT_AI_TIMEOUT_MS
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            anthropic_api_key: None,
            anthropic_model: default_anthropic_model(),
            openai_api_key: None,
            openai_model: default_openai_model(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            timeout_ms: DEFAULT_AI_TIMEOUT_MS,
        }
    }
}

impl AiConfig {
    pub fn anthropic_key(&self) -> Option<String> {
        usable_secret(self.anthropic_api_key.as_deref())
    }

    pub fn openai_key(&self) -> Option<String> {
        usable_secret(self.openai_api_key.as_deref())
    }

    pub fn is_configured(&self) -> bool {
        self.anthropic_key().is_some() || self.openai_key().is_some()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistorySettings {
    /// JSON-lines history file (default: ~/.kindred/history.jsonl)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl HistorySettings {
    pub fn resolved_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".kindred")
                .join("history.jsonl")
        })
    }
}

impl KindredConfig {
    /// `~/.config/kindred/config.toml` on Unix, the platform config dir elsewhere.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|p| p.join(".config")))
            .unwrap_or_else(|| PathBuf::from("."))
            .join("kindred")
            .join("config.toml")
    }

    /// Load from `path`, or from the default path if `None`.
    ///
    /// An explicit path must exist; a missing default file yields defaults.
    /// The environment overlay is applied in both cases.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default = Self::default_path();
                if default.exists() {
                    Self::from_file(&default)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env();
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Fill credentials from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|name| std::env::var(name).ok());
    }

    /// Fill credentials from `lookup`. Values already present in the file win.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        for (source, field, env) in SOURCE_ENV {
            let Some(value) = usable_secret(lookup(env).as_deref()) else {
                continue;
            };
            let auth = self.sources.entry((*source).to_string()).or_default();
            if usable_secret(auth.get(*field).map(String::as_str)).is_none() {
                auth.insert((*field).to_string(), value);
            }
        }

        if self.ai.anthropic_key().is_none() {
            self.ai.anthropic_api_key = usable_secret(lookup("ANTHROPIC_API_KEY").as_deref());
        }
        if self.ai.openai_key().is_none() {
            self.ai.openai_api_key = usable_secret(lookup("OPENAI_API_KEY").as_deref());
        }
    }

    /// Credential bundle for `source`, empty when none is configured.
    pub fn source_auth(&self, source: &str) -> AuthDetails {
        self.sources.get(source).cloned().unwrap_or_default()
    }

    /// Environment variables consulted for credentials, for display.
    pub fn credential_env_vars() -> Vec<(&'static str, &'static str, &'static str)> {
        SOURCE_ENV.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_is_default() {
        let config = KindredConfig::from_toml("").unwrap();
        assert!(config.sources.is_empty());
        assert_eq!(config.search.source_timeout_ms, DEFAULT_SOURCE_TIMEOUT_MS);
        assert_eq!(config.search.request_timeout_ms, DEFAULT_REQUEST_TIMEOUT_MS);
        assert_eq!(config.ai.anthropic_model, DEFAULT_ANTHROPIC_MODEL);
        assert_eq!(config.ai.max_tokens, DEFAULT_MAX_TOKENS);
        assert_eq!(config.ai.timeout_ms, DEFAULT_AI_TIMEOUT_MS);
        assert!(!config.ai.is_configured());
    }

    #[test]
    fn test_parse_full_toml() {
        let config = KindredConfig::from_toml(
            r#"
            [sources.ancestry]
            api_key = "anc-key"

            [sources.familysearch]
            username = "jdoe"

            [ai]
            openai_api_key = "sk-test"
            openai_model = "gpt-4o"
            timeout_ms = 5000

            [search]
            source_timeout_ms = 2500
            max_concurrency = 3
            default_sources = ["familysearch", "ancestry"]

            [history]
            path = "/tmp/kindred-history.jsonl"
            "#,
        )
        .unwrap();

        assert_eq!(config.source_auth("ancestry")["api_key"], "anc-key");
        assert_eq!(config.source_auth("familysearch")["username"], "jdoe");
        assert!(config.source_auth("myheritage").is_empty());
        assert_eq!(config.ai.openai_key().as_deref(), Some("sk-test"));
        assert_eq!(config.ai.openai_model, "gpt-4o");
        assert_eq!(config.ai.timeout_ms, 5000);
        assert_eq!(config.search.source_timeout_ms, 2500);
        assert_eq!(config.search.request_timeout_ms, DEFAULT_REQUEST_TIMEOUT_MS);
        assert_eq!(config.search.max_concurrency, Some(3));
        assert_eq!(config.search.default_sources, vec!["familysearch", "ancestry"]);
        assert_eq!(
            config.history.resolved_path(),
            PathBuf::from("/tmp/kindred-history.jsonl")
        );
    }

    #[test]
    fn test_env_vars_match_adapter_fields() {
        let vars = KindredConfig::credential_env_vars();
        assert!(vars.contains(&("familysearch", "access_token", "FAMILYSEARCH_ACCESS_TOKEN")));
        assert!(vars.iter().all(|(_, field, _)| *field != "password"));
    }

    #[test]
    fn test_env_overlay_fills_gaps_only() {
        let mut config = KindredConfig::from_toml(
            r#"
            [sources.ancestry]
            api_key = "from-file"
            "#,
        )
        .unwrap();

        config.apply_env_from(|name| match name {
            "ANCESTRY_API_KEY" => Some("from-env".into()),
            "FINDMYPAST_API_KEY" => Some("fmp".into()),
            "ANTHROPIC_API_KEY" => Some("your-anthropic-key-here".into()),
            "OPENAI_API_KEY" => Some("sk-live".into()),
            _ => None,
        });

        assert_eq!(config.source_auth("ancestry")["api_key"], "from-file");
        assert_eq!(config.source_auth("findmypast")["api_key"], "fmp");
        assert!(!config.sources.contains_key("myheritage"));
        assert_eq!(config.ai.anthropic_key(), None);
        assert_eq!(config.ai.openai_key().as_deref(), Some("sk-live"));
        assert!(config.ai.is_configured());
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let err = KindredConfig::load(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_bad_toml_is_error() {
        assert!(matches!(
            KindredConfig::from_toml("[search]\nsource_timeout_ms = \"soon\""),
            Err(ConfigError::Toml(_))
        ));
    }
}
