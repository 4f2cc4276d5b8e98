use clap::{Parser, Subcommand, ValueEnum};
use kindred_core::history::DEFAULT_HISTORY_LIMIT;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "kindred")]
#[command(about = "Kindred - search genealogy record providers from one place")]
#[command(version)]
#[command(after_help = "\x1b[1;36mQuick Start:\x1b[0m
  kindred sources                                   List record providers
  kindred search --first-name Jane --last-name Doe  Search every provider
  kindred search --last-name Doe -s ancestry,familysearch --birth-year 1900
  kindred history                                   Show your recent searches

\x1b[1;36mConfiguration:\x1b[0m
  kindred config init                               Write a starter config file
  kindred config show                               View configuration (secrets masked)")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Pretty)]
    pub output: OutputFormat,

    /// Config file (default: <config dir>/kindred/config.toml)
    #[arg(long, global = true, env = "KINDRED_CONFIG")]
    pub config: Option<PathBuf>,

    /// User the search history is recorded under
    #[arg(long, global = true, env = "KINDRED_USER", default_value = "local")]
    pub user: String,

    /// Verbose output (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Search genealogy records across providers
    ///
    /// At least one of the person fields is required. Providers without
    /// credentials answer with a link to their own search page.
    #[command(after_help = "\x1b[1;33mExamples:\x1b[0m
  kindred search --first-name Jane --last-name Doe --birth-year 1900
  kindred search --last-name Murphy --birth-place Cork -s familysearch
  kindred search --last-name Doe --ai --output json")]
    Search {
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
        #[arg(long)]
        birth_year: Option<i32>,
        #[arg(long)]
        birth_place: Option<String>,
        #[arg(long)]
        death_year: Option<i32>,
        #[arg(long)]
        death_place: Option<String>,
        /// Comma-separated providers to search (default: configured or all)
        #[arg(short, long, value_delimiter = ',')]
        sources: Option<Vec<String>>,
        /// Use the configured AI backend for strategy and ranking
        #[arg(long)]
        ai: bool,
    },

    /// List record providers and their status
    #[command(alias = "ls")]
    Sources {
        /// Include the credential fields each provider understands
        #[arg(long)]
        detailed: bool,
    },

    /// Show recorded searches, newest first
    History {
        /// Maximum number of entries
        #[arg(short, long, default_value_t = DEFAULT_HISTORY_LIMIT)]
        limit: usize,
        /// Entries to skip
        #[arg(long, default_value_t = 0)]
        skip: usize,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigAction {
    /// Show current configuration with secrets masked
    Show,
    /// Print the config file path
    Path,
    /// Write a starter config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable formatted output
    Pretty,
    /// JSON output
    Json,
    /// YAML output
    Yaml,
    /// Plain text output
    Text,
    /// Markdown output
    Markdown,
}
