//! The search request pipeline.
//!
//! validate → strategy/enhancement (optional) → fan-out → ranking
//! (optional) → response, with the history write detached.

use crate::ai::{prioritize_sources, AiClient, ResultRanker, StrategyAdvisor};
use crate::config::{KindredConfig, SearchSettings};
use crate::error::SearchError;
use crate::history::{
    FileHistoryStore, HistoryRecorder, HistoryStore, SearchHistoryEntry, UserRef,
};
use crate::search::{
    AiAnalysis, NormalizedQuery, SearchMode, SearchOrchestrator, SearchRequest, SearchResponse,
};
use crate::{build_registry, SourceInfo, SourceRegistry};
use chrono::{Datelike, Utc};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Most source identifiers a single request may name
pub const MAX_SOURCES: usize = 32;
pub const MAX_NAME_CHARS: usize = 100;
pub const MAX_PLACE_CHARS: usize = 200;
pub const MIN_YEAR: i32 = 1000;

pub struct GenealogySearchService {
    orchestrator: SearchOrchestrator,
    advisor: StrategyAdvisor,
    ranker: ResultRanker,
    recorder: HistoryRecorder,
}

impl GenealogySearchService {
    pub fn new(
        registry: SourceRegistry,
        settings: SearchSettings,
        ai: AiClient,
        history: Arc<dyn HistoryStore>,
    ) -> Self {
        Self {
            orchestrator: SearchOrchestrator::new(Arc::new(registry), settings),
            advisor: StrategyAdvisor::new(ai.clone()),
            ranker: ResultRanker::new(ai),
            recorder: HistoryRecorder::new(history),
        }
    }

    /// Registry, AI backends and file history store from `config`.
    pub fn from_config(config: &KindredConfig) -> Self {
        Self::new(
            build_registry(config),
            config.search.clone(),
            AiClient::from_config(&config.ai),
            Arc::new(FileHistoryStore::new(config.history.resolved_path())),
        )
    }

    pub fn registry(&self) -> &SourceRegistry {
        self.orchestrator.registry()
    }

    /// Static metadata for every registered source.
    pub fn catalog(&self) -> Vec<SourceInfo> {
        self.registry().list_sources()
    }

    pub fn ai_available(&self) -> bool {
        self.advisor.is_available()
    }

    pub fn history(&self) -> &Arc<dyn HistoryStore> {
        self.recorder.store()
    }

    /// Run a search. Only validation failures are returned as errors.
    pub async fn search(
        &self,
        user: &UserRef,
        request: SearchRequest,
    ) -> Result<SearchResponse, SearchError> {
        let (response, _history) = self.search_tracked(user, request).await?;
        Ok(response)
    }

    /// Like [`search`](Self::search), also returning the detached history
    /// write so callers that exit right away can let it finish.
    pub async fn search_tracked(
        &self,
        user: &UserRef,
        request: SearchRequest,
    ) -> Result<(SearchResponse, JoinHandle<()>), SearchError> {
        let query = validate(&request)?;
        let requested = self.requested_sources(&request);
        info!(query = %query, sources = ?requested, use_ai = request.use_ai, "search request");

        let mut analysis = AiAnalysis::default();
        let order = if request.use_ai {
            let (strategy, enhancements) = tokio::join!(
                self.advisor.suggest_strategy(&query, &requested),
                self.advisor.enhance_query(&query),
            );
            analysis.enhancements = enhancements.ai();
            match strategy.ai() {
                Some(strategy) => {
                    let order = prioritize_sources(&requested, &strategy);
                    debug!(order = ?order, "sources reordered by strategy");
                    analysis.strategy = Some(strategy);
                    order
                }
                None => requested,
            }
        } else {
            requested
        };

        let mut results = self.orchestrator.search_all(&query, &order).await;

        if request.use_ai && results.total_results() > 0 {
            if let Some(mut ranking) = self.ranker.analyze_results(&query, &results).await.ai() {
                results = std::mem::take(&mut ranking.ranked_results);
                analysis.ranking = Some(ranking);
            }
        }

        let total_results = results.total_results();
        let sources_searched = results.sources();
        let mode = if request.use_ai {
            SearchMode::AiAssisted
        } else {
            SearchMode::Manual
        };

        let response = SearchResponse {
            query: query.clone(),
            results,
            total_results,
            sources_searched: sources_searched.clone(),
            ai_analysis: (!analysis.is_empty()).then_some(analysis),
            searched_at: Utc::now(),
        };

        let history = self.recorder.record(SearchHistoryEntry::new(
            user.clone(),
            query,
            mode,
            total_results,
            sources_searched,
        ));

        info!(total_results, mode = mode.as_str(), "search complete");
        Ok((response, history))
    }

    /// Request sources, else configured defaults, else every registered source.
    fn requested_sources(&self, request: &SearchRequest) -> Vec<String> {
        if let Some(sources) = &request.sources {
            return sources
                .iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        let defaults = &self.orchestrator.settings().default_sources;
        if !defaults.is_empty() {
            return defaults.clone();
        }
        self.registry().ids()
    }
}

/// Check a request before any fan-out and return its normalized query.
pub fn validate(request: &SearchRequest) -> Result<NormalizedQuery, SearchError> {
    if let Some(sources) = &request.sources {
        if sources.len() > MAX_SOURCES {
            return Err(SearchError::TooManySources {
                requested: sources.len(),
                max: MAX_SOURCES,
            });
        }
    }

    let query = request.query.clone().normalized();
    if query.is_empty() {
        return Err(SearchError::EmptyQuery);
    }

    let check_len = |field: &'static str, value: &Option<String>, max: usize| {
        match value {
            Some(v) if v.chars().count() > max => Err(SearchError::InvalidField {
                field,
                reason: format!("longer than {} characters", max),
            }),
            _ => Ok(()),
        }
    };
    check_len("first_name", &query.first_name, MAX_NAME_CHARS)?;
    check_len("last_name", &query.last_name, MAX_NAME_CHARS)?;
    check_len("birth_place", &query.birth_place, MAX_PLACE_CHARS)?;
    check_len("death_place", &query.death_place, MAX_PLACE_CHARS)?;

    let max_year = Utc::now().year() + 1;
    let check_year = |field: &'static str, value: Option<i32>| match value {
        Some(y) if !(MIN_YEAR..=max_year).contains(&y) => Err(SearchError::InvalidField {
            field,
            reason: format!("{} is outside {}..={}", y, MIN_YEAR, max_year),
        }),
        _ => Ok(()),
    };
    check_year("birth_year", query.birth_year)?;
    check_year("death_year", query.death_year)?;

    if let (Some(birth), Some(death)) = (query.birth_year, query.death_year) {
        if death < birth {
            return Err(SearchError::InvalidField {
                field: "death_year",
                reason: format!("{} is before birth year {}", death, birth),
            });
        }
    }

    Ok(query)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(query: NormalizedQuery) -> SearchRequest {
        SearchRequest::new(query)
    }

    #[test]
    fn test_validate_empty_query() {
        assert_eq!(
            validate(&request(NormalizedQuery::new())),
            Err(SearchError::EmptyQuery)
        );
        assert_eq!(
            validate(&request(NormalizedQuery::new().with_first_name("   "))),
            Err(SearchError::EmptyQuery)
        );
    }

    #[test]
    fn test_validate_normalizes() {
        let query = validate(&request(
            NormalizedQuery::new().with_first_name("  Jane ").with_last_name(""),
        ))
        .unwrap();
        assert_eq!(query.first_name.as_deref(), Some("Jane"));
        assert!(query.last_name.is_none());
    }

    #[test]
    fn test_validate_field_limits() {
        let long_name = "a".repeat(MAX_NAME_CHARS + 1);
        let err = validate(&request(NormalizedQuery::new().with_last_name(long_name))).unwrap_err();
        assert!(matches!(err, SearchError::InvalidField { field: "last_name", .. }));

        let place = "p".repeat(MAX_PLACE_CHARS);
        assert!(validate(&request(NormalizedQuery::new().with_birth_place(place))).is_ok());

        let err = validate(&request(NormalizedQuery::new().with_birth_year(999))).unwrap_err();
        assert!(matches!(err, SearchError::InvalidField { field: "birth_year", .. }));

        let far_future = Utc::now().year() + 2;
        let err = validate(&request(NormalizedQuery::new().with_death_year(far_future))).unwrap_err();
        assert!(matches!(err, SearchError::InvalidField { field: "death_year", .. }));
    }

    #[test]
    fn test_validate_death_before_birth() {
        let err = validate(&request(
            NormalizedQuery::new().with_birth_year(1900).with_death_year(1899),
        ))
        .unwrap_err();
        assert_eq!(err.code_str(), "invalid_field");
        assert!(validate(&request(
            NormalizedQuery::new().with_birth_year(1900).with_death_year(1900)
        ))
        .is_ok());
    }

    #[test]
    fn test_validate_source_count() {
        let sources: Vec<String> = (0..=MAX_SOURCES).map(|i| format!("s{}", i)).collect();
        let req = request(NormalizedQuery::new().with_last_name("Doe")).with_sources(sources);
        assert_eq!(
            validate(&req),
            Err(SearchError::TooManySources {
                requested: MAX_SOURCES + 1,
                max: MAX_SOURCES
            })
        );
    }
}
