use clap::Parser;
use owo_colors::OwoColorize;
use std::process;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod commands;
mod output;

use cli::{Cli, Commands};
use commands::*;

fn default_filter(verbose: u8) -> String {
    let core = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    format!("kindred_cli=info,kindred_core={}", core)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter(cli.verbose).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let result = match &cli.command {
        None => show_overview(&cli),
        Some(Commands::Search {
            first_name,
            last_name,
            birth_year,
            birth_place,
            death_year,
            death_place,
            sources,
            ai,
        }) => {
            let query = search::build_query(
                first_name.as_deref(),
                last_name.as_deref(),
                *birth_year,
                birth_place.as_deref(),
                *death_year,
                death_place.as_deref(),
            );
            search::run(&cli, query, sources.clone(), *ai).await
        }
        Some(Commands::Sources { detailed }) => sources::run(&cli, *detailed),
        Some(Commands::History { limit, skip }) => history::run(&cli, *limit, *skip),
        Some(Commands::Config { action }) => config::run(&cli, action.clone()),
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        process::exit(1);
    }
}

fn show_overview(cli: &Cli) -> commands::Result<()> {
    let config = load_config(cli)?;
    let registry = kindred_core::build_registry(&config);
    let configured = registry
        .ids()
        .iter()
        .filter_map(|id| registry.resolve(id))
        .filter(|s| s.is_configured())
        .count();

    println!();
    println!(
        "{}  {}",
        "Kindred".bold().cyan(),
        "- Federated genealogy search".dimmed()
    );
    println!();
    println!(
        "  {} record providers ({} with credentials)",
        registry.len().to_string().green().bold(),
        configured.to_string().green()
    );
    let ai = if config.ai.is_configured() {
        "available".green().to_string()
    } else {
        "not configured".yellow().to_string()
    };
    println!("  AI assistance: {}", ai);
    println!();

    println!("{}", "Quick Start:".bold().cyan());
    println!(
        "  {}{}",
        "kindred sources".cyan(),
        "                                  Show providers and their status".dimmed()
    );
    println!(
        "  {}{}",
        "kindred search --first-name Jane --last-name Doe".cyan(),
        " Search every provider".dimmed()
    );
    println!(
        "  {}{}",
        "kindred config init".cyan(),
        "                              Write a starter config file".dimmed()
    );
    println!();
    println!(
        "{} Use {} for full help",
        "Tip:".dimmed(),
        "kindred --help".cyan()
    );
    println!();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_levels() {
        assert_eq!(default_filter(0), "kindred_cli=info,kindred_core=warn");
        assert_eq!(default_filter(1), "kindred_cli=info,kindred_core=info");
        assert_eq!(default_filter(5), "kindred_cli=info,kindred_core=debug");
    }
}
