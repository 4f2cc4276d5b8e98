//! Core types for federated genealogy search.

use chrono::{DateTime, Utc};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

use crate::ai::RankedView;
use crate::ai::{QueryEnhancements, StrategyResult};

/// The single query model shared by every adapter.
///
/// Absent fields are `None` and are never sent to a provider as empty values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_year: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_place: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub death_year: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub death_place: Option<String>,
}

impl NormalizedQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_first_name(mut self, name: impl Into<String>) -> Self {
        self.first_name = Some(name.into());
        self
    }

    pub fn with_last_name(mut self, name: impl Into<String>) -> Self {
        self.last_name = Some(name.into());
        self
    }

    pub fn with_birth_year(mut self, year: i32) -> Self {
        self.birth_year = Some(year);
        self
    }

    pub fn with_birth_place(mut self, place: impl Into<String>) -> Self {
        self.birth_place = Some(place.into());
        self
    }

    pub fn with_death_year(mut self, year: i32) -> Self {
        self.death_year = Some(year);
        self
    }

    pub fn with_death_place(mut self, place: impl Into<String>) -> Self {
        self.death_place = Some(place.into());
        self
    }

    /// Trim text fields and drop the ones left empty.
    pub fn normalized(self) -> Self {
        fn clean(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.split_whitespace().collect::<Vec<_>>().join(" "))
                .filter(|v| !v.is_empty())
        }
        Self {
            first_name: clean(self.first_name),
            last_name: clean(self.last_name),
            birth_year: self.birth_year,
            birth_place: clean(self.birth_place),
            death_year: self.death_year,
            death_place: clean(self.death_place),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }

    /// Present fields in fixed order: first name, last name, birth year,
    /// birth place, death year, death place.
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        let mut out = Vec::with_capacity(6);
        if let Some(v) = &self.first_name {
            out.push(("first_name", v.clone()));
        }
        if let Some(v) = &self.last_name {
            out.push(("last_name", v.clone()));
        }
        if let Some(v) = self.birth_year {
            out.push(("birth_year", v.to_string()));
        }
        if let Some(v) = &self.birth_place {
            out.push(("birth_place", v.clone()));
        }
        if let Some(v) = self.death_year {
            out.push(("death_year", v.to_string()));
        }
        if let Some(v) = &self.death_place {
            out.push(("death_place", v.clone()));
        }
        out
    }

    /// "First Last", skipping whichever half is missing.
    pub fn display_name(&self) -> String {
        [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for NormalizedQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .fields()
            .into_iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}

/// A normalized record returned by any source adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Source identifier (e.g., "ancestry", "familysearch")
    pub source: String,

    /// Person name as reported by the provider
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_place: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub death_date: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub death_place: Option<String>,

    /// Link to the record (or the provider's search page for placeholders)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Match confidence in 0.0..=1.0. Exactly 0.0 marks a placeholder.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_score: Option<f64>,

    /// Human-readable note, set on placeholder results
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,

    /// Provider-specific fields that don't map to the common schema
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub additional_info: Value,
}

impl SearchResult {
    pub fn new(source: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            name: name.into(),
            birth_date: None,
            birth_place: None,
            death_date: None,
            death_place: None,
            url: None,
            confidence_score: None,
            note: None,
            additional_info: Value::Null,
        }
    }

    /// Informational result for a source that cannot search right now.
    pub fn placeholder(
        source: impl Into<String>,
        query: &NormalizedQuery,
        note: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self::new(source, query.display_name())
            .with_url(url)
            .with_confidence(0.0)
            .with_note(note)
    }

    pub fn with_birth(mut self, date: Option<String>, place: Option<String>) -> Self {
        self.birth_date = date;
        self.birth_place = place;
        self
    }

    pub fn with_death(mut self, date: Option<String>, place: Option<String>) -> Self {
        self.death_date = date;
        self.death_place = place;
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Set the confidence, clamped to 0.0..=1.0.
    pub fn with_confidence(mut self, score: f64) -> Self {
        self.confidence_score = Some(if score.is_nan() {
            0.0
        } else {
            score.clamp(0.0, 1.0)
        });
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn with_additional_info(mut self, info: Value) -> Self {
        self.additional_info = info;
        self
    }

    /// A 0.0 score means "no real match"; never rank on it.
    pub fn is_placeholder(&self) -> bool {
        self.confidence_score == Some(0.0)
    }

    /// Confidence usable for ranking, `None` for placeholders.
    pub fn rankable_score(&self) -> Option<f64> {
        self.confidence_score.filter(|s| *s > 0.0)
    }
}

/// Results of one source inside [`AggregatedResults`].
#[derive(Debug, Clone, PartialEq)]
pub struct SourceResults {
    pub source: String,
    pub results: Vec<SearchResult>,
}

/// Source → results, in the order sources were resolved.
///
/// Failed sources map to an empty list; keys are never missing for a
/// resolved source. Serialized as a JSON object with stable key order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregatedResults {
    sources: Vec<SourceResults>,
}

impl AggregatedResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            sources: Vec::with_capacity(capacity),
        }
    }

    /// Insert or replace the results for `source`, keeping first-seen order.
    pub fn insert(&mut self, source: impl Into<String>, results: Vec<SearchResult>) {
        let source = source.into();
        if let Some(existing) = self.sources.iter_mut().find(|s| s.source == source) {
            existing.results = results;
        } else {
            self.sources.push(SourceResults { source, results });
        }
    }

    pub fn get(&self, source: &str) -> Option<&[SearchResult]> {
        self.sources
            .iter()
            .find(|s| s.source == source)
            .map(|s| s.results.as_slice())
    }

    pub fn contains(&self, source: &str) -> bool {
        self.sources.iter().any(|s| s.source == source)
    }

    /// Source identifiers in order.
    pub fn sources(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.source.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SourceResults> {
        self.sources.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut SourceResults> {
        self.sources.iter_mut()
    }

    /// Sum of all per-source result counts.
    pub fn total_results(&self) -> usize {
        self.sources.iter().map(|s| s.results.len()).sum()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Get all results flattened, in source order.
    pub fn all_results(&self) -> Vec<&SearchResult> {
        self.sources.iter().flat_map(|s| s.results.iter()).collect()
    }
}

impl IntoIterator for AggregatedResults {
    type Item = SourceResults;
    type IntoIter = std::vec::IntoIter<SourceResults>;

    fn into_iter(self) -> Self::IntoIter {
        self.sources.into_iter()
    }
}

impl Serialize for AggregatedResults {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.sources.len()))?;
        for entry in &self.sources {
            map.serialize_entry(&entry.source, &entry.results)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for AggregatedResults {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct AggregatedVisitor;

        impl<'de> Visitor<'de> for AggregatedVisitor {
            type Value = AggregatedResults;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of source identifier to result list")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut out = AggregatedResults::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((source, results)) =
                    access.next_entry::<String, Vec<SearchResult>>()?
                {
                    out.insert(source, results);
                }
                Ok(out)
            }
        }

        deserializer.deserialize_map(AggregatedVisitor)
    }
}

/// How a search was run, as recorded in history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    #[default]
    Manual,
    AiAssisted,
}

impl SearchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMode::Manual => "manual",
            SearchMode::AiAssisted => "ai_assisted",
        }
    }
}

/// Incoming search request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchRequest {
    #[serde(flatten)]
    pub query: NormalizedQuery,

    #[serde(default)]
    pub use_ai: bool,

    /// Sources to search; `None` means every registered source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<String>>,
}

impl SearchRequest {
    pub fn new(query: NormalizedQuery) -> Self {
        Self {
            query,
            use_ai: false,
            sources: None,
        }
    }

    pub fn with_sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sources = Some(sources.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_ai(mut self, use_ai: bool) -> Self {
        self.use_ai = use_ai;
        self
    }
}

/// AI enrichment attached to a response. Only parts that really came from
/// an AI backend are present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AiAnalysis {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<StrategyResult>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enhancements: Option<QueryEnhancements>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ranking: Option<RankedView>,
}

impl AiAnalysis {
    pub fn is_empty(&self) -> bool {
        self.strategy.is_none() && self.enhancements.is_none() && self.ranking.is_none()
    }
}

/// Complete response for a federated genealogy search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: NormalizedQuery,

    pub results: AggregatedResults,

    /// Sum of all result-list lengths in `results`
    pub total_results: usize,

    /// Resolved sources, same order and set as the keys of `results`
    pub sources_searched: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_analysis: Option<AiAnalysis>,

    /// When the response was assembled
    pub searched_at: DateTime<Utc>,
}
