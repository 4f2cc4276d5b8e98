// src/error.rs

/// Failure of a single source adapter call.
///
/// Expected absence of data (missing credentials, no matches) is never an
/// `AdapterError`; adapters return a placeholder or an empty list for those.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),

    #[error("Upstream error: {status} - {body}")]
    Upstream { status: u16, body: String },

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Adapter panicked: {0}")]
    Panicked(String),

    #[error("Other error: {0}")]
    Other(String),
}

impl AdapterError {
    pub fn code_str(&self) -> &'static str {
        match self {
            AdapterError::Authentication(_) => "auth_failed",
            AdapterError::SerdeJson(_) => "parse_error",
            AdapterError::Timeout(_) => "timeout",
            AdapterError::HttpRequest(_) => "upstream_error",
            AdapterError::Upstream { .. } => "upstream_error",
            AdapterError::Panicked(_) => "internal_error",
            AdapterError::Other(_) => "internal_error",
        }
    }

    pub fn is_timeout(&self) -> bool {
        match self {
            AdapterError::Timeout(_) => true,
            AdapterError::HttpRequest(e) => e.is_timeout(),
            _ => false,
        }
    }
}

/// Caller-facing validation failure, raised before any fan-out starts.
///
/// This is the only error kind a search caller ever sees.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SearchError {
    #[error("query has no recognizable fields (first_name, last_name, birth_year, birth_place, death_year, death_place)")]
    EmptyQuery,

    #[error("invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("too many sources requested: {requested} (max {max})")]
    TooManySources { requested: usize, max: usize },
}

impl SearchError {
    pub fn code_str(&self) -> &'static str {
        match self {
            SearchError::EmptyQuery => "empty_query",
            SearchError::InvalidField { .. } => "invalid_field",
            SearchError::TooManySources { .. } => "too_many_sources",
        }
    }
}

/// Failure of an AI backend call. Always mapped to a fallback value.
#[derive(Debug, thiserror::Error)]
pub enum AiError {
    #[error("no AI backend configured")]
    NotConfigured,

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{backend} API error: {status} - {body}")]
    Api {
        backend: &'static str,
        status: u16,
        body: String,
    },

    #[error("AI completion timed out after {0}ms")]
    Timeout(u64),

    #[error("{0} returned no text content")]
    EmptyResponse(&'static str),

    #[error("Parse error: {0}")]
    Parse(String),
}

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("other: {0}")]
    Other(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
