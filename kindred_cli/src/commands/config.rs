use crate::cli::{Cli, ConfigAction, OutputFormat};
use crate::commands::{load_config, CommandError, Result};
use crate::output::{format_output, OutputData};
use kindred_core::config::KindredConfig;
use owo_colors::OwoColorize;
use serde_json::{json, Map, Value};
use std::path::PathBuf;

const CONFIG_TEMPLATE: &str = r#"# kindred configuration
#
# Credentials may also come from the environment, e.g. ANCESTRY_API_KEY,
# FAMILYSEARCH_ACCESS_TOKEN, ANTHROPIC_API_KEY or OPENAI_API_KEY.
# Values in this file take precedence.

[sources.ancestry]
# api_key = ""

[sources.familysearch]
# username = ""
# access_token = ""

[sources.findmypast]
# api_key = ""

[sources.myheritage]
# api_key = ""

[ai]
# anthropic_api_key = ""
# anthropic_model = "claude-3-5-sonnet-20241022"
# openai_api_key = ""
# openai_model = "gpt-4"
# max_tokens = 1000
# temperature = 0.7
# timeout_ms = 20000

[search]
# source_timeout_ms = 10000
# request_timeout_ms = 30000
# max_concurrency = 4
# default_sources = ["familysearch", "ancestry"]

[history]
# path = "~/.kindred/history.jsonl"
"#;

pub fn run(cli: &Cli, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => show_config(cli),
        ConfigAction::Path => {
            println!("{}", config_path(cli).display());
            Ok(())
        }
        ConfigAction::Init { force } => init_config(cli, force),
    }
}

fn config_path(cli: &Cli) -> PathBuf {
    cli.config.clone().unwrap_or_else(KindredConfig::default_path)
}

fn show_config(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    let path = config_path(cli);
    let info = config_json(&config, &path);

    if cli.output != OutputFormat::Pretty {
        return format_output(&OutputData::ConfigInfo(info), &cli.output);
    }

    println!();
    println!("{}", "Configuration".bold().cyan());
    println!("{}", "=============".cyan());
    println!();
    let marker = if path.exists() {
        String::new()
    } else {
        format!(" {}", "(not created, defaults in use)".yellow())
    };
    println!("Config file:  {}{}", path.display().dimmed(), marker);
    println!(
        "History file: {}",
        config.history.resolved_path().display().dimmed()
    );
    println!();

    println!("{}", "Sources".bold());
    let mut ids: Vec<_> = config.sources.keys().collect();
    ids.sort();
    if ids.is_empty() {
        println!("  {}", "no credentials configured".dimmed());
    }
    for id in ids {
        let mut fields: Vec<_> = config.sources[id].keys().map(String::as_str).collect();
        fields.sort_unstable();
        println!("  {} {}", id.green(), fields.join(", ").dimmed());
    }
    println!();

    println!("{}", "AI".bold());
    let status = |on: bool| {
        if on {
            "configured".green().to_string()
        } else {
            "not configured".yellow().to_string()
        }
    };
    println!(
        "  anthropic  {} ({})",
        status(config.ai.anthropic_key().is_some()),
        config.ai.anthropic_model
    );
    println!(
        "  openai     {} ({})",
        status(config.ai.openai_key().is_some()),
        config.ai.openai_model
    );
    println!("  completion timeout {} ms", config.ai.timeout_ms);
    println!();

    println!("{}", "Search".bold());
    println!(
        "  per-source timeout {} ms, request timeout {} ms",
        config.search.source_timeout_ms, config.search.request_timeout_ms
    );
    if let Some(limit) = config.search.max_concurrency {
        println!("  at most {} sources at once", limit);
    }
    if !config.search.default_sources.is_empty() {
        println!(
            "  default sources: {}",
            config.search.default_sources.join(", ")
        );
    }
    println!();

    println!("{}", "Environment variables".bold());
    for (source, field, env) in KindredConfig::credential_env_vars() {
        println!("  {:<28} {}.{}", env.cyan(), source, field);
    }
    println!("  {:<28} ai.anthropic_api_key", "ANTHROPIC_API_KEY".cyan());
    println!("  {:<28} ai.openai_api_key", "OPENAI_API_KEY".cyan());
    Ok(())
}

/// Serializable view with every credential value masked.
fn config_json(config: &KindredConfig, path: &std::path::Path) -> Value {
    let mut sources = Map::new();
    for (id, auth) in &config.sources {
        let masked: Map<String, Value> = auth
            .keys()
            .map(|k| (k.clone(), Value::String("***".to_string())))
            .collect();
        sources.insert(id.clone(), Value::Object(masked));
    }

    let env: Vec<Value> = KindredConfig::credential_env_vars()
        .into_iter()
        .map(|(source, field, env)| json!({ "source": source, "field": field, "env": env }))
        .collect();

    json!({
        "config_path": path.display().to_string(),
        "config_exists": path.exists(),
        "sources": sources,
        "ai": {
            "anthropic_configured": config.ai.anthropic_key().is_some(),
            "anthropic_model": config.ai.anthropic_model,
            "openai_configured": config.ai.openai_key().is_some(),
            "openai_model": config.ai.openai_model,
            "max_tokens": config.ai.max_tokens,
            "temperature": config.ai.temperature,
            "timeout_ms": config.ai.timeout_ms,
        },
        "search": config.search,
        "history_path": config.history.resolved_path().display().to_string(),
        "environment": env,
    })
}

fn init_config(cli: &Cli, force: bool) -> Result<()> {
    let path = config_path(cli);
    if path.exists() && !force {
        return Err(CommandError::InvalidInput(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, CONFIG_TEMPLATE)?;
    println!("{} {}", "Wrote".green().bold(), path.display());
    Ok(())
}
