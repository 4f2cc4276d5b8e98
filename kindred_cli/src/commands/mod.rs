pub mod config;
pub mod history;
pub mod search;
pub mod sources;

use crate::cli::Cli;
use kindred_core::config::KindredConfig;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("{0}")]
    Search(#[from] kindred_core::error::SearchError),

    #[error("Invalid configuration: {0}")]
    Config(#[from] kindred_core::error::ConfigError),

    #[error("History error: {0}")]
    History(#[from] kindred_core::error::HistoryError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, CommandError>;

/// Config from `--config` (or the default location) with env overlay.
pub fn load_config(cli: &Cli) -> Result<KindredConfig> {
    Ok(KindredConfig::load(cli.config.as_deref())?)
}

/// Truncate to `max_len` characters on the first line, adding "..." if cut.
pub fn truncate_text(s: &str, max_len: usize) -> String {
    let first_line = s.lines().next().unwrap_or(s);
    if first_line.chars().count() <= max_len {
        first_line.to_string()
    } else {
        let truncated: String = first_line.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

pub fn terminal_width() -> usize {
    terminal_size::terminal_size()
        .map(|(w, _)| w.0 as usize)
        .unwrap_or(80)
}
