//! Optional AI enrichment: strategy advice, query enhancement and result
//! ranking.
//!
//! Every operation returns an [`Enrichment`]. A missing backend, a failed
//! call or an unparseable answer all map to the documented fallback value;
//! nothing in here returns an error to the search pipeline.

mod advisor;
mod anthropic;
mod backend;
mod openai;
mod parse;
mod ranker;

pub use advisor::{
    prioritize_sources, QueryEnhancements, StrategyAdvisor, StrategyResult, KNOWN_SOURCES,
};
pub use anthropic::AnthropicBackend;
pub use backend::{AiBackend, AiClient, SYSTEM_PROMPT};
pub use openai::OpenAiBackend;
pub use ranker::{RankedView, ResultRanker, MAX_PROMPT_RECORDS, MAX_PROMPT_RECORDS_PER_SOURCE};

/// Outcome of an AI-assisted step.
#[derive(Debug, Clone, PartialEq)]
pub enum Enrichment<T> {
    /// Produced from a backend answer
    Ai(T),
    /// Deterministic fallback value
    Fallback(T),
}

impl<T> Enrichment<T> {
    pub fn is_ai(&self) -> bool {
        matches!(self, Enrichment::Ai(_))
    }

    pub fn value(&self) -> &T {
        match self {
            Enrichment::Ai(v) | Enrichment::Fallback(v) => v,
        }
    }

    pub fn into_inner(self) -> T {
        match self {
            Enrichment::Ai(v) | Enrichment::Fallback(v) => v,
        }
    }

    /// The value only if it came from a backend.
    pub fn ai(self) -> Option<T> {
        match self {
            Enrichment::Ai(v) => Some(v),
            Enrichment::Fallback(_) => None,
        }
    }
}
