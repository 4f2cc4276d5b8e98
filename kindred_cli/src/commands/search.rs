use crate::cli::{Cli, OutputFormat};
use crate::commands::{load_config, terminal_width, truncate_text, Result};
use crate::output::{format_output, OutputData};
use indicatif::{ProgressBar, ProgressStyle};
use kindred_core::history::UserRef;
use kindred_core::search::{AiAnalysis, NormalizedQuery, SearchRequest, SearchResponse};
use kindred_core::GenealogySearchService;
use owo_colors::OwoColorize;
use std::time::Duration;
use tracing::debug;

pub fn build_query(
    first_name: Option<&str>,
    last_name: Option<&str>,
    birth_year: Option<i32>,
    birth_place: Option<&str>,
    death_year: Option<i32>,
    death_place: Option<&str>,
) -> NormalizedQuery {
    NormalizedQuery {
        first_name: first_name.map(str::to_string),
        last_name: last_name.map(str::to_string),
        birth_year,
        birth_place: birth_place.map(str::to_string),
        death_year,
        death_place: death_place.map(str::to_string),
    }
}

pub async fn run(
    cli: &Cli,
    query: NormalizedQuery,
    sources: Option<Vec<String>>,
    use_ai: bool,
) -> Result<()> {
    let config = load_config(cli)?;
    let service = GenealogySearchService::from_config(&config);

    let mut request = SearchRequest::new(query).with_ai(use_ai);
    request.sources = sources;

    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(format!(
        "Searching {} source(s)...",
        request
            .sources
            .as_ref()
            .map(|s| s.len())
            .unwrap_or_else(|| service.registry().len())
    ));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let outcome = service
        .search_tracked(&UserRef::new(cli.user.clone()), request)
        .await;
    spinner.finish_and_clear();
    let (response, history) = outcome?;

    match cli.output {
        OutputFormat::Pretty => format_pretty_response(&response),
        _ => format_output(&OutputData::SearchResults(Box::new(response)), &cli.output)?,
    }

    // The process exits right after, so let the history write land.
    if let Err(e) = history.await {
        debug!(error = %e, "history task did not complete");
    }
    Ok(())
}

fn format_pretty_response(response: &SearchResponse) {
    println!("{} {}", "Search:".bold().cyan(), response.query.yellow());
    println!();

    let width = terminal_width();

    if response.results.is_empty() {
        println!("   {}", "No matching sources are registered".dimmed());
    }

    for entry in response.results.iter() {
        let header = format!("{} ({} results)", entry.source, entry.results.len());
        let line_len = width.saturating_sub(header.len() + 6).min(60);
        println!(
            "{} {} {}",
            "──".cyan(),
            header.green().bold(),
            "─".repeat(line_len).cyan()
        );
        println!();

        if entry.results.is_empty() {
            println!("   {}", "No results".dimmed());
            println!();
            continue;
        }

        for (i, r) in entry.results.iter().enumerate() {
            let score = match r.confidence_score {
                Some(s) if s > 0.0 => format!(" [{:.0}%]", s * 100.0),
                _ => String::new(),
            };
            println!(
                " {:>3}. {}{}",
                (i + 1).to_string().cyan().bold(),
                truncate_text(&r.name, 70).bold(),
                score.dimmed()
            );

            let mut facts = Vec::new();
            if r.birth_date.is_some() || r.birth_place.is_some() {
                facts.push(format!(
                    "b. {}",
                    [r.birth_date.as_deref(), r.birth_place.as_deref()]
                        .into_iter()
                        .flatten()
                        .collect::<Vec<_>>()
                        .join(", ")
                ));
            }
            if r.death_date.is_some() || r.death_place.is_some() {
                facts.push(format!(
                    "d. {}",
                    [r.death_date.as_deref(), r.death_place.as_deref()]
                        .into_iter()
                        .flatten()
                        .collect::<Vec<_>>()
                        .join(", ")
                ));
            }
            if !facts.is_empty() {
                println!("      {}", truncate_text(&facts.join("; "), 100));
            }
            if let Some(ref url) = r.url {
                println!("      {}", url.blue());
            }
            if let Some(ref note) = r.note {
                for line in textwrap::wrap(note, width.saturating_sub(8).max(40)) {
                    println!("      {}", line.yellow());
                }
            }
            println!();
        }
    }

    if let Some(ref analysis) = response.ai_analysis {
        format_pretty_analysis(analysis, width);
    }

    println!(
        "{}",
        format!(
            "{} results from {} source(s)",
            response.total_results,
            response.sources_searched.len()
        )
        .dimmed()
    );
}

fn format_pretty_analysis(analysis: &AiAnalysis, width: usize) {
    let wrap_width = width.saturating_sub(6).max(40);
    println!("{}", "AI analysis".bold().cyan());

    if let Some(ref strategy) = analysis.strategy {
        println!(
            "   {} {}",
            "Suggested order:".dimmed(),
            strategy.suggested_sources.join(", ").green()
        );
    }
    if let Some(ref enhancements) = analysis.enhancements {
        let groups = [
            ("Name variations:", &enhancements.name_variations),
            ("Date ranges:", &enhancements.date_ranges),
            ("Places:", &enhancements.location_variations),
            ("Other terms:", &enhancements.additional_terms),
        ];
        for (label, values) in groups {
            if !values.is_empty() {
                println!("   {} {}", label.dimmed(), values.join(", "));
            }
        }
    }
    if let Some(ref ranking) = analysis.ranking {
        for rec in &ranking.recommendations {
            for (i, line) in textwrap::wrap(rec, wrap_width).into_iter().enumerate() {
                let bullet = if i == 0 { "•" } else { " " };
                println!("   {} {}", bullet.dimmed(), line);
            }
        }
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_query_keeps_given_fields() {
        let query = build_query(Some("Jane"), None, Some(1900), None, None, Some("Salem"));
        assert_eq!(query.first_name.as_deref(), Some("Jane"));
        assert!(query.last_name.is_none());
        assert_eq!(query.birth_year, Some(1900));
        assert_eq!(query.death_place.as_deref(), Some("Salem"));
    }
}
