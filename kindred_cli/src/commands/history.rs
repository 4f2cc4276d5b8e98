use crate::cli::{Cli, OutputFormat};
use crate::commands::{load_config, terminal_width, truncate_text, Result};
use crate::output::{format_output, OutputData};
use chrono::Local;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, ContentArrangement, Table};
use kindred_core::history::{FileHistoryStore, HistoryStore, UserRef};
use owo_colors::OwoColorize;

pub fn run(cli: &Cli, limit: usize, skip: usize) -> Result<()> {
    let config = load_config(cli)?;
    let store = FileHistoryStore::new(config.history.resolved_path());
    let user = UserRef::new(cli.user.clone());
    let entries = store.list(&user, skip, limit)?;

    if cli.output != OutputFormat::Pretty {
        return format_output(&OutputData::History(entries), &cli.output);
    }

    if entries.is_empty() {
        println!("{}", format!("No searches recorded for '{}'", user).yellow());
        println!("History file: {}", store.path().display().dimmed());
        return Ok(());
    }

    println!("{} {}", "Search history for".bold().cyan(), user.green());
    println!();

    let width = terminal_width();
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(width as u16)
        .set_header(vec!["When", "Query", "Mode", "Results", "Sources"]);

    for entry in &entries {
        table.add_row(vec![
            entry
                .timestamp
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M")
                .to_string(),
            truncate_text(&entry.query.to_string(), width.saturating_sub(60).max(20)),
            entry.mode.as_str().to_string(),
            entry.result_count.to_string(),
            entry.sources_searched.join(", "),
        ]);
    }

    println!("{}", table);
    Ok(())
}
