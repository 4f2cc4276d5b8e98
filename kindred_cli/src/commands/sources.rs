use crate::cli::{Cli, OutputFormat};
use crate::commands::{load_config, terminal_width, Result};
use crate::output::{format_output, OutputData, SourceStatus};
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, ContentArrangement, Table};
use kindred_core::{build_registry, SourceRegistry};
use owo_colors::OwoColorize;

pub fn run(cli: &Cli, detailed: bool) -> Result<()> {
    let config = load_config(cli)?;
    let registry = build_registry(&config);
    let statuses = collect(&registry, detailed);

    if statuses.is_empty() {
        println!("{}", "No record providers compiled in".yellow());
        return Ok(());
    }

    match cli.output {
        OutputFormat::Pretty => print_table(&statuses, detailed),
        _ => format_output(&OutputData::SourceList(statuses), &cli.output)?,
    }
    Ok(())
}

fn collect(registry: &SourceRegistry, detailed: bool) -> Vec<SourceStatus> {
    registry
        .ids()
        .iter()
        .filter_map(|id| registry.resolve(id))
        .map(|source| SourceStatus {
            info: source.info(),
            configured: source.is_configured(),
            fields: if detailed {
                source.config_schema().fields
            } else {
                Vec::new()
            },
        })
        .collect()
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

fn print_table(statuses: &[SourceStatus], detailed: bool) {
    println!("{}", "Record Providers".bold().cyan());
    println!();

    let mut header = vec!["ID", "Name", "Auth", "API", "Configured"];
    if detailed {
        header.push("Credentials");
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(terminal_width() as u16)
        .set_header(header);

    for s in statuses {
        let mut row = vec![
            s.info.id.clone(),
            s.info.name.clone(),
            yes_no(s.info.requires_auth).to_string(),
            yes_no(s.info.api_available).to_string(),
            yes_no(s.configured).to_string(),
        ];
        if detailed {
            row.push(
                s.fields
                    .iter()
                    .map(|f| match &f.env {
                        Some(env) => format!("{} ({})", f.name, env),
                        None => f.name.clone(),
                    })
                    .collect::<Vec<_>>()
                    .join("\n"),
            );
        }
        table.add_row(row);
    }

    println!("{}", table);
    println!();
    println!(
        "{} Providers without credentials answer with a link to their search page. See {}",
        "Tip:".green().bold(),
        "kindred config init".cyan()
    );
}
