use crate::ai::parse::{extract_json_object, score, string_list, truncate_chars};
use crate::ai::{AiClient, Enrichment};
use crate::search::{AggregatedResults, NormalizedQuery};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Records summarized per source in the analysis prompt
pub const MAX_PROMPT_RECORDS_PER_SOURCE: usize = 5;

/// Records summarized overall in the analysis prompt
pub const MAX_PROMPT_RECORDS: usize = 20;

const MAX_ANALYSIS_CHARS: usize = 1000;

/// Ranked view of aggregated results.
///
/// Scores are keyed by record id `"<source>:<index>"`, the index being the
/// record's position in the unranked list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RankedView {
    #[serde(default, skip_serializing_if = "AggregatedResults::is_empty")]
    pub ranked_results: AggregatedResults,
    #[serde(default)]
    pub confidence_scores: BTreeMap<String, f64>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<String>,
}

impl RankedView {
    /// Results unchanged, nothing scored.
    pub fn passthrough(results: &AggregatedResults) -> Self {
        Self {
            ranked_results: results.clone(),
            ..Self::default()
        }
    }
}

pub struct ResultRanker {
    ai: AiClient,
}

impl ResultRanker {
    pub fn new(ai: AiClient) -> Self {
        Self { ai }
    }

    pub fn is_available(&self) -> bool {
        self.ai.is_available()
    }

    /// Ask the backend to score the records and reorder each source by it.
    ///
    /// Falls back to [`RankedView::passthrough`] when no backend is
    /// configured, when there are no real records to rank, or on failure.
    pub async fn analyze_results(
        &self,
        query: &NormalizedQuery,
        results: &AggregatedResults,
    ) -> Enrichment<RankedView> {
        if !self.ai.is_available() {
            return Enrichment::Fallback(RankedView::passthrough(results));
        }

        let summary = summarize(results);
        if summary.is_empty() {
            debug!("only placeholder results, skipping AI ranking");
            return Enrichment::Fallback(RankedView::passthrough(results));
        }

        match self.ai.completion(&analysis_prompt(query, &summary)).await {
            Ok(text) => Enrichment::Ai(apply_analysis(results, &text)),
            Err(e) => {
                warn!(error = %e, "AI result analysis failed, results unranked");
                Enrichment::Fallback(RankedView::passthrough(results))
            }
        }
    }
}

fn record_id(source: &str, index: usize) -> String {
    format!("{}:{}", source, index)
}

/// One prompt line per real record, capped per source and overall.
fn summarize(results: &AggregatedResults) -> Vec<String> {
    let opt = |v: &Option<String>| v.clone().unwrap_or_default();
    results
        .iter()
        .flat_map(|entry| {
            entry
                .results
                .iter()
                .enumerate()
                .filter(|(_, r)| !r.is_placeholder())
                .take(MAX_PROMPT_RECORDS_PER_SOURCE)
                .map(move |(i, r)| {
                    format!(
                        "[{}] Source: {}, Name: {}, Birth: {} {}, Death: {} {}",
                        record_id(&entry.source, i),
                        entry.source,
                        r.name,
                        opt(&r.birth_date),
                        opt(&r.birth_place),
                        opt(&r.death_date),
                        opt(&r.death_place),
                    )
                })
        })
        .take(MAX_PROMPT_RECORDS)
        .collect()
}

fn analysis_prompt(query: &NormalizedQuery, summary: &[String]) -> String {
    format!(
        "Analyze these genealogy search results for the query:\n{}\n\n\
Results:\n{}\n\n\
Rank the results by likelihood of being the correct person. Consider:\n\
1. Name similarity (accounting for spelling variations)\n\
2. Date accuracy (accounting for estimation errors)\n\
3. Location proximity\n\
4. Consistency across sources\n\n\
Respond in JSON with \"confidence_scores\" mapping each bracketed record id \
to a score between 0 and 1, and \"recommendations\" as a list of strings.",
        query,
        summary.join("\n")
    )
}

/// Scores from either `{"confidence_scores": {id: score}}` or a list of
/// `{"id": .., "confidence"|"score": ..}` entries.
fn parse_scores(obj: &Map<String, Value>) -> BTreeMap<String, f64> {
    let mut scores = BTreeMap::new();
    if let Some(map) = obj.get("confidence_scores").and_then(|v| v.as_object()) {
        for (id, value) in map {
            if let Some(s) = score(value) {
                scores.insert(id.trim().to_string(), s);
            }
        }
    }
    for key in ["rankings", "ranked_results", "results"] {
        let Some(items) = obj.get(key).and_then(|v| v.as_array()) else {
            continue;
        };
        for item in items {
            let id = item.get("id").and_then(|v| v.as_str());
            let value = item.get("confidence").or_else(|| item.get("score"));
            if let (Some(id), Some(s)) = (id, value.and_then(score)) {
                scores.entry(id.trim().to_string()).or_insert(s);
            }
        }
    }
    scores
}

fn apply_analysis(results: &AggregatedResults, text: &str) -> RankedView {
    let obj = extract_json_object(text).unwrap_or_default();
    let mut scores = parse_scores(&obj);

    // Only ids that name a real record survive.
    scores.retain(|id, _| {
        id.rsplit_once(':')
            .and_then(|(source, idx)| Some((source, idx.parse::<usize>().ok()?)))
            .and_then(|(source, idx)| results.get(source)?.get(idx))
            .map(|r| !r.is_placeholder())
            .unwrap_or(false)
    });

    let mut ranked = results.clone();
    for entry in ranked.iter_mut() {
        let mut indexed: Vec<(usize, _)> = entry.results.drain(..).enumerate().collect();
        // Stable: unscored records and placeholders sink, keeping their order.
        indexed.sort_by(|(a, _), (b, _)| {
            let sa = scores.get(&record_id(&entry.source, *a)).copied().unwrap_or(-1.0);
            let sb = scores.get(&record_id(&entry.source, *b)).copied().unwrap_or(-1.0);
            sb.total_cmp(&sa)
        });
        entry.results = indexed.into_iter().map(|(_, r)| r).collect();
    }

    RankedView {
        ranked_results: ranked,
        confidence_scores: scores,
        recommendations: string_list(&obj, &["recommendations"]),
        analysis: Some(truncate_chars(text, MAX_ANALYSIS_CHARS)),
    }
}
