//! Federated search execution engine.
//!
//! Fans one query out to every resolved adapter at once and joins on all of
//! them before returning.

use super::{AggregatedResults, NormalizedQuery, SearchResult};
use crate::config::SearchSettings;
use crate::error::AdapterError;
use crate::{SourceAdapter, SourceRegistry};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, warn};

/// Engine for executing federated searches across registered sources.
#[derive(Clone)]
pub struct SearchOrchestrator {
    registry: Arc<SourceRegistry>,
    settings: SearchSettings,
}

impl SearchOrchestrator {
    pub fn new(registry: Arc<SourceRegistry>, settings: SearchSettings) -> Self {
        Self { registry, settings }
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &SearchSettings {
        &self.settings
    }

    /// Resolve requested ids against the registry.
    ///
    /// Unregistered ids are dropped silently and duplicates keep their first
    /// position.
    pub fn resolve(&self, requested: &[String]) -> Vec<(String, Arc<dyn SourceAdapter>)> {
        let mut resolved: Vec<(String, Arc<dyn SourceAdapter>)> = Vec::new();
        for id in requested {
            if resolved.iter().any(|(seen, _)| seen == id) {
                continue;
            }
            match self.registry.resolve(id) {
                Some(adapter) => resolved.push((id.clone(), adapter)),
                None => debug!(source = %id, "skipping unregistered source"),
            }
        }
        resolved
    }

    /// Search every resolvable source in `sources` concurrently.
    ///
    /// The returned map has exactly one key per resolved source. A source
    /// whose call failed, panicked or timed out maps to an empty list.
    pub async fn search_all(&self, query: &NormalizedQuery, sources: &[String]) -> AggregatedResults {
        let adapters = self.resolve(sources);
        self.execute_search(query, adapters).await
    }

    async fn execute_search(
        &self,
        query: &NormalizedQuery,
        adapters: Vec<(String, Arc<dyn SourceAdapter>)>,
    ) -> AggregatedResults {
        let start = Instant::now();
        let deadline = start + Duration::from_millis(self.settings.request_timeout_ms);
        let source_timeout = Duration::from_millis(self.settings.source_timeout_ms);
        let permits = self
            .settings
            .max_concurrency
            .map(|n| Arc::new(Semaphore::new(n.max(1))));
        let query = Arc::new(query.clone());

        // One slot per resolved source, written once after its task settles.
        let mut slots: Vec<Option<Vec<SearchResult>>> = vec![None; adapters.len()];

        let mut tasks = JoinSet::new();
        for (idx, (name, adapter)) in adapters.iter().enumerate() {
            let name = name.clone();
            let adapter = Arc::clone(adapter);
            let query = Arc::clone(&query);
            let permits = permits.clone();

            tasks.spawn(async move {
                let _permit = match permits {
                    Some(semaphore) => semaphore.acquire_owned().await.ok(),
                    None => None,
                };
                let outcome = search_single_source(&name, adapter, &query, source_timeout).await;
                (idx, outcome)
            });
        }

        loop {
            match timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(Ok((idx, outcome)))) => {
                    let results = match outcome {
                        Ok(results) => results,
                        Err(e) => {
                            warn!(
                                source = %adapters[idx].0,
                                code = e.code_str(),
                                timeout = e.is_timeout(),
                                error = %e,
                                "source search failed"
                            );
                            Vec::new()
                        }
                    };
                    slots[idx] = Some(results);
                }
                Ok(Some(Err(join_error))) => {
                    warn!(error = %join_error, "source task did not complete");
                }
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        pending = tasks.len(),
                        timeout_ms = self.settings.request_timeout_ms,
                        "request deadline reached, cancelling remaining sources"
                    );
                    tasks.abort_all();
                    break;
                }
            }
        }

        let mut aggregated = AggregatedResults::with_capacity(adapters.len());
        for ((name, _), slot) in adapters.into_iter().zip(slots) {
            aggregated.insert(name, slot.unwrap_or_default());
        }

        debug!(
            sources = aggregated.len(),
            total = aggregated.total_results(),
            duration_ms = start.elapsed().as_millis() as u64,
            "federated search complete"
        );
        aggregated
    }
}

/// Run one adapter with its own timeout, turning a panic into an error.
async fn search_single_source(
    name: &str,
    adapter: Arc<dyn SourceAdapter>,
    query: &NormalizedQuery,
    limit: Duration,
) -> Result<Vec<SearchResult>, AdapterError> {
    let search = AssertUnwindSafe(adapter.search(query)).catch_unwind();

    match timeout(limit, search).await {
        Ok(Ok(result)) => result,
        Ok(Err(payload)) => Err(AdapterError::Panicked(panic_message(payload.as_ref()))),
        Err(_) => Err(AdapterError::Timeout(format!(
            "{} did not respond within {}ms",
            name,
            limit.as_millis()
        ))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Echo(&'static str);

    #[async_trait]
    impl SourceAdapter for Echo {
        fn id(&self) -> &str {
            self.0
        }

        async fn search(
            &self,
            query: &NormalizedQuery,
        ) -> Result<Vec<SearchResult>, AdapterError> {
            Ok(vec![
                SearchResult::new(self.0, query.display_name()).with_confidence(0.8)
            ])
        }
    }

    struct Failing;

    #[async_trait]
    impl SourceAdapter for Failing {
        fn id(&self) -> &str {
            "failing"
        }

        async fn search(&self, _query: &NormalizedQuery) -> Result<Vec<SearchResult>, AdapterError> {
            Err(AdapterError::Upstream {
                status: 503,
                body: "maintenance".into(),
            })
        }
    }

    struct Panicking;

    #[async_trait]
    impl SourceAdapter for Panicking {
        fn id(&self) -> &str {
            "panicking"
        }

        async fn search(&self, _query: &NormalizedQuery) -> Result<Vec<SearchResult>, AdapterError> {
            panic!("provider returned something unexpected");
        }
    }

    struct Slow(u64);

    #[async_trait]
    impl SourceAdapter for Slow {
        fn id(&self) -> &str {
            "slow"
        }

        async fn search(&self, query: &NormalizedQuery) -> Result<Vec<SearchResult>, AdapterError> {
            tokio::time::sleep(Duration::from_millis(self.0)).await;
            Ok(vec![SearchResult::new("slow", query.display_name())])
        }
    }

    /// Tracks how many searches run at the same time.
    struct Gauge {
        id: String,
        current: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl SourceAdapter for Gauge {
        fn id(&self) -> &str {
            &self.id
        }

        async fn search(&self, _query: &NormalizedQuery) -> Result<Vec<SearchResult>, AdapterError> {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.current.fetch_sub(1, Ordering::SeqCst);
            Ok(Vec::new())
        }
    }

    fn orchestrator(adapters: Vec<Arc<dyn SourceAdapter>>, settings: SearchSettings) -> SearchOrchestrator {
        let mut registry = SourceRegistry::new();
        for adapter in adapters {
            registry.register(adapter);
        }
        SearchOrchestrator::new(Arc::new(registry), settings)
    }

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn jane() -> NormalizedQuery {
        NormalizedQuery::new().with_first_name("Jane").with_last_name("Doe")
    }

    #[tokio::test]
    async fn test_keys_equal_resolved_subset() {
        let engine = orchestrator(
            vec![Arc::new(Echo("ancestry")), Arc::new(Echo("familysearch"))],
            SearchSettings::default(),
        );
        let results = engine
            .search_all(&jane(), &ids(&["familysearch", "unknown_source", "ancestry", "familysearch"]))
            .await;

        assert_eq!(results.sources(), vec!["familysearch", "ancestry"]);
        assert_eq!(results.total_results(), 2);
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let engine = orchestrator(
            vec![
                Arc::new(Echo("ancestry")),
                Arc::new(Failing),
                Arc::new(Panicking),
                Arc::new(Echo("myheritage")),
            ],
            SearchSettings::default(),
        );
        let results = engine
            .search_all(&jane(), &ids(&["ancestry", "failing", "panicking", "myheritage"]))
            .await;

        assert_eq!(results.len(), 4);
        assert_eq!(results.get("failing"), Some(&[][..]));
        assert_eq!(results.get("panicking"), Some(&[][..]));
        assert_eq!(results.get("ancestry").unwrap()[0].name, "Jane Doe");
        assert_eq!(results.get("myheritage").unwrap()[0].source, "myheritage");
    }

    #[tokio::test]
    async fn test_slow_source_times_out_alone() {
        let settings = SearchSettings {
            source_timeout_ms: 50,
            ..SearchSettings::default()
        };
        let engine = orchestrator(vec![Arc::new(Slow(2_000)), Arc::new(Echo("ancestry"))], settings);

        let started = std::time::Instant::now();
        let results = engine.search_all(&jane(), &ids(&["slow", "ancestry"])).await;

        assert!(started.elapsed() < Duration::from_millis(1_500));
        assert_eq!(results.get("slow"), Some(&[][..]));
        assert_eq!(results.get("ancestry").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_request_deadline_keeps_completed_slots() {
        let settings = SearchSettings {
            source_timeout_ms: 5_000,
            request_timeout_ms: 100,
            ..SearchSettings::default()
        };
        let engine = orchestrator(vec![Arc::new(Slow(3_000)), Arc::new(Echo("ancestry"))], settings);

        let results = engine.search_all(&jane(), &ids(&["ancestry", "slow"])).await;

        assert_eq!(results.sources(), vec!["ancestry", "slow"]);
        assert_eq!(results.get("ancestry").unwrap().len(), 1);
        assert!(results.get("slow").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_max_concurrency_caps_fan_out() {
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let adapters: Vec<Arc<dyn SourceAdapter>> = (0..6)
            .map(|i| {
                Arc::new(Gauge {
                    id: format!("s{}", i),
                    current: Arc::clone(&current),
                    peak: Arc::clone(&peak),
                }) as Arc<dyn SourceAdapter>
            })
            .collect();
        let settings = SearchSettings {
            max_concurrency: Some(2),
            ..SearchSettings::default()
        };
        let engine = orchestrator(adapters, settings);
        let requested: Vec<String> = (0..6).map(|i| format!("s{}", i)).collect();

        let results = engine.search_all(&jane(), &requested).await;

        assert_eq!(results.len(), 6);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_no_resolvable_sources() {
        let engine = orchestrator(vec![Arc::new(Echo("ancestry"))], SearchSettings::default());
        let results = engine.search_all(&jane(), &ids(&["nope"])).await;
        assert!(results.is_empty());
        assert_eq!(results.total_results(), 0);
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
    }
}
