use crate::ai::parse::{extract_json_object, string_list, truncate_chars};
use crate::ai::{AiClient, Enrichment};
use crate::search::NormalizedQuery;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Providers the advisor knows how to recommend, in default priority.
pub const KNOWN_SOURCES: [&str; 4] = ["ancestry", "familysearch", "findmypast", "myheritage"];

const MAX_NOTES_CHARS: usize = 500;
const MAX_SUGGESTION_CHARS: usize = 500;

/// Advisory source ordering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyResult {
    pub suggested_sources: Vec<String>,
    #[serde(default)]
    pub notes: String,
}

impl StrategyResult {
    pub fn new(suggested_sources: Vec<String>) -> Self {
        Self {
            suggested_sources,
            notes: String::new(),
        }
    }

    /// Every known provider, default order, no notes.
    pub fn default_sources() -> Self {
        Self::new(KNOWN_SOURCES.iter().map(|s| s.to_string()).collect())
    }
}

/// Search variations proposed for a query. Annotation only; adapters
/// still receive the original query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryEnhancements {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub name_variations: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub date_ranges: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub location_variations: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additional_terms: Vec<String>,
    /// Raw model answer, truncated
    #[serde(default)]
    pub raw_suggestions: String,
}

pub struct StrategyAdvisor {
    ai: AiClient,
}

impl StrategyAdvisor {
    pub fn new(ai: AiClient) -> Self {
        Self { ai }
    }

    pub fn is_available(&self) -> bool {
        self.ai.is_available()
    }

    /// Suggest which sources to search first.
    ///
    /// Without a backend: every known provider. On failure: the `requested`
    /// list unchanged.
    pub async fn suggest_strategy(
        &self,
        query: &NormalizedQuery,
        requested: &[String],
    ) -> Enrichment<StrategyResult> {
        if !self.ai.is_available() {
            debug!("no AI backend configured, default strategy");
            return Enrichment::Fallback(StrategyResult::default_sources());
        }

        match self.ai.completion(&strategy_prompt(query)).await {
            Ok(text) => Enrichment::Ai(parse_strategy(&text)),
            Err(e) => {
                warn!(error = %e, "AI search strategy failed, using requested sources");
                Enrichment::Fallback(StrategyResult::new(requested.to_vec()))
            }
        }
    }

    /// Propose name, date and place variations for `query`.
    pub async fn enhance_query(&self, query: &NormalizedQuery) -> Enrichment<QueryEnhancements> {
        if !self.ai.is_available() {
            return Enrichment::Fallback(QueryEnhancements::default());
        }

        match self.ai.completion(&enhancement_prompt(query)).await {
            Ok(text) => Enrichment::Ai(parse_enhancements(&text)),
            Err(e) => {
                warn!(error = %e, "AI query enhancement failed");
                Enrichment::Fallback(QueryEnhancements::default())
            }
        }
    }
}

fn field_or_na(value: Option<String>) -> String {
    value.unwrap_or_else(|| "N/A".to_string())
}

fn strategy_prompt(query: &NormalizedQuery) -> String {
    format!(
        "Given the following search query for a genealogy search:\n{}\n\n\
Suggest:\n\
1. Which genealogy sources would be most effective ({})\n\
2. What variations of the name should be searched\n\
3. What time periods to focus on\n\
4. Any specific record types that might be most helpful\n\
5. Alternative search strategies if initial search yields no results\n\n\
Provide a structured JSON response with a \"suggested_sources\" array ordered \
from most to least promising.",
        query,
        KNOWN_SOURCES.join(", ")
    )
}

fn enhancement_prompt(query: &NormalizedQuery) -> String {
    format!(
        "Analyze this genealogy search query and suggest enhancements:\n\n\
Query:\n\
- First Name: {}\n\
- Last Name: {}\n\
- Birth Year: {}\n\
- Birth Place: {}\n\
- Death Year: {}\n\
- Death Place: {}\n\n\
Suggest:\n\
1. Alternative spellings of names (common misspellings, variations, nicknames)\n\
2. Possible date ranges to search (accounting for transcription errors)\n\
3. Location variations (nearby towns, old vs new place names)\n\
4. Additional search terms that might help\n\n\
Format as JSON with keys: name_variations, date_ranges, location_variations, additional_terms",
        field_or_na(query.first_name.clone()),
        field_or_na(query.last_name.clone()),
        field_or_na(query.birth_year.map(|y| y.to_string())),
        field_or_na(query.birth_place.clone()),
        field_or_na(query.death_year.map(|y| y.to_string())),
        field_or_na(query.death_place.clone()),
    )
}

/// Map a free-form provider mention ("Ancestry.com", "Find My Past") to
/// a known id.
fn known_source(mention: &str) -> Option<&'static str> {
    let compact: String = mention
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();
    KNOWN_SOURCES
        .iter()
        .find(|id| compact.contains(*id))
        .copied()
}

fn parse_strategy(text: &str) -> StrategyResult {
    let mentions = match extract_json_object(text) {
        Some(obj) => string_list(
            &obj,
            &["suggested_sources", "sources", "recommended_sources"],
        ),
        None => Vec::new(),
    };

    let mut suggested: Vec<String> = Vec::new();
    for id in mentions.iter().filter_map(|m| known_source(m)) {
        if !suggested.iter().any(|s| s == id) {
            suggested.push(id.to_string());
        }
    }

    if suggested.is_empty() {
        // Unstructured answer: order by first mention in the text
        let compact = text.to_ascii_lowercase().replace([' ', '.'], "");
        let mut found: Vec<(usize, &str)> = KNOWN_SOURCES
            .iter()
            .filter_map(|id| compact.find(id).map(|pos| (pos, *id)))
            .collect();
        found.sort();
        suggested = found.into_iter().map(|(_, id)| id.to_string()).collect();
    }

    if suggested.is_empty() {
        suggested = StrategyResult::default_sources().suggested_sources;
    }

    StrategyResult {
        suggested_sources: suggested,
        notes: truncate_chars(text, MAX_NOTES_CHARS),
    }
}

fn parse_enhancements(text: &str) -> QueryEnhancements {
    let raw_suggestions = truncate_chars(text, MAX_SUGGESTION_CHARS);
    let Some(obj) = extract_json_object(text) else {
        return QueryEnhancements {
            raw_suggestions,
            ..QueryEnhancements::default()
        };
    };
    QueryEnhancements {
        name_variations: string_list(&obj, &["name_variations", "names"]),
        date_ranges: string_list(&obj, &["date_ranges", "dates"]),
        location_variations: string_list(&obj, &["location_variations", "locations"]),
        additional_terms: string_list(&obj, &["additional_terms", "terms"]),
        raw_suggestions,
    }
}

/// Order `requested` by the strategy: suggested sources first in suggested
/// order, then the rest in request order. Never adds or drops a source.
pub fn prioritize_sources(requested: &[String], strategy: &StrategyResult) -> Vec<String> {
    let mut ordered: Vec<String> = strategy
        .suggested_sources
        .iter()
        .filter(|s| requested.contains(s))
        .fold(Vec::new(), |mut acc, s| {
            if !acc.contains(s) {
                acc.push(s.clone());
            }
            acc
        });
    for source in requested {
        if !ordered.contains(source) {
            ordered.push(source.clone());
        }
    }
    ordered
}
