use crate::cli::OutputFormat;
use crate::commands::Result;
use kindred_core::capabilities::Field;
use kindred_core::history::SearchHistoryEntry;
use kindred_core::search::{SearchResponse, SearchResult};
use kindred_core::SourceInfo;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Catalog entry plus local configuration status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceStatus {
    #[serde(flatten)]
    pub info: SourceInfo,
    pub configured: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OutputData {
    SourceList(Vec<SourceStatus>),
    SearchResults(Box<SearchResponse>),
    History(Vec<SearchHistoryEntry>),
    ConfigInfo(Value),
}

/// Machine-readable and plain renderings. Pretty output is rendered by
/// each command.
pub fn format_output(data: &OutputData, format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(data)?);
        }
        OutputFormat::Yaml => {
            println!("{}", serde_yaml::to_string(data)?);
        }
        OutputFormat::Text => {
            format_text_output(data)?;
        }
        OutputFormat::Markdown => {
            format_markdown_output(data)?;
        }
        OutputFormat::Pretty => {
            println!("{}", serde_json::to_string_pretty(data)?);
        }
    }
    Ok(())
}

fn life_span(r: &SearchResult) -> String {
    let part = |date: &Option<String>, place: &Option<String>| {
        [date.as_deref(), place.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(", ")
    };
    let born = part(&r.birth_date, &r.birth_place);
    let died = part(&r.death_date, &r.death_place);
    match (born.is_empty(), died.is_empty()) {
        (true, true) => String::new(),
        (false, true) => format!("b. {}", born),
        (true, false) => format!("d. {}", died),
        (false, false) => format!("b. {}; d. {}", born, died),
    }
}

fn format_text_output(data: &OutputData) -> Result<()> {
    match data {
        OutputData::SourceList(sources) => {
            for s in sources {
                println!(
                    "{}\t{}\tauth={}\tapi={}\tconfigured={}",
                    s.info.id, s.info.name, s.info.requires_auth, s.info.api_available, s.configured
                );
            }
        }
        OutputData::SearchResults(response) => {
            println!("Search results for '{}':", response.query);
            for entry in response.results.iter() {
                println!("[{}] {} result(s)", entry.source, entry.results.len());
                for r in &entry.results {
                    let mut line = format!("  {}", r.name);
                    let span = life_span(r);
                    if !span.is_empty() {
                        line.push_str(&format!(" ({})", span));
                    }
                    if let Some(url) = &r.url {
                        line.push_str(&format!(" {}", url));
                    }
                    if let Some(note) = &r.note {
                        line.push_str(&format!(" - {}", note));
                    }
                    println!("{}", line);
                }
            }
            println!("Total: {}", response.total_results);
        }
        OutputData::History(entries) => {
            for e in entries {
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    e.timestamp.to_rfc3339(),
                    e.mode.as_str(),
                    e.result_count,
                    e.sources_searched.join(","),
                    e.query
                );
            }
        }
        OutputData::ConfigInfo(config) => {
            println!("Configuration:");
            println!("{}", serde_json::to_string_pretty(config)?);
        }
    }
    Ok(())
}

fn format_markdown_output(data: &OutputData) -> Result<()> {
    match data {
        OutputData::SourceList(sources) => {
            println!("# Record Providers\n");
            println!("| ID | Name | Requires auth | API | Configured |");
            println!("|----|------|---------------|-----|------------|");
            for s in sources {
                println!(
                    "| {} | {} | {} | {} | {} |",
                    s.info.id, s.info.name, s.info.requires_auth, s.info.api_available, s.configured
                );
            }
            println!();
        }
        OutputData::SearchResults(response) => {
            println!("# Search Results\n");
            println!("**Query:** {}\n", response.query);
            println!("**Total:** {}\n", response.total_results);
            for entry in response.results.iter() {
                println!("## {} ({})\n", entry.source, entry.results.len());
                if entry.results.is_empty() {
                    println!("_No results_\n");
                    continue;
                }
                for r in &entry.results {
                    let name = match &r.url {
                        Some(url) => format!("[{}]({})", r.name, url),
                        None => r.name.clone(),
                    };
                    let span = life_span(r);
                    if span.is_empty() {
                        println!("- {}", name);
                    } else {
                        println!("- {} ({})", name, span);
                    }
                    if let Some(note) = &r.note {
                        println!("  - _{}_", note);
                    }
                }
                println!();
            }
            if let Some(analysis) = &response.ai_analysis {
                println!("## AI analysis\n");
                println!("```json");
                println!("{}", serde_json::to_string_pretty(analysis)?);
                println!("```\n");
            }
        }
        OutputData::History(entries) => {
            println!("# Search History\n");
            println!("| When | Mode | Results | Sources | Query |");
            println!("|------|------|---------|---------|-------|");
            for e in entries {
                println!(
                    "| {} | {} | {} | {} | {} |",
                    e.timestamp.format("%Y-%m-%d %H:%M"),
                    e.mode.as_str(),
                    e.result_count,
                    e.sources_searched.join(", "),
                    e.query
                );
            }
            println!();
        }
        OutputData::ConfigInfo(config) => {
            println!("# Configuration\n");
            println!("```json");
            println!("{}", serde_json::to_string_pretty(config)?);
            println!("```\n");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_life_span() {
        let r = SearchResult::new("x", "Jane Doe")
            .with_birth(Some("1900".into()), Some("Boston".into()))
            .with_death(None, Some("Salem".into()));
        assert_eq!(life_span(&r), "b. 1900, Boston; d. Salem");
        assert_eq!(life_span(&SearchResult::new("x", "Jane")), "");
    }
}
