//! Federated search across genealogy sources.
//!
//! This module provides:
//! - `NormalizedQuery`: the one query model every adapter understands
//! - `SearchResult` / `AggregatedResults`: normalized records grouped by source
//! - `SearchOrchestrator`: parallel fan-out/fan-in over registered adapters
//!
//! # Example
//!
//! ```ignore
//! use kindred_core::search::{NormalizedQuery, SearchOrchestrator};
//!
//! let orchestrator = SearchOrchestrator::new(registry, SearchSettings::default());
//! let query = NormalizedQuery::new().with_first_name("Jane").with_last_name("Doe");
//! let results = orchestrator.search_all(&query, &["ancestry".into()]).await;
//! ```

mod engine;
mod types;

pub use engine::SearchOrchestrator;
pub use types::{
    AggregatedResults, AiAnalysis, NormalizedQuery, SearchMode, SearchRequest, SearchResponse,
    SearchResult, SourceResults,
};
