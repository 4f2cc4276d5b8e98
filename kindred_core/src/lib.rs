// src/lib.rs
pub mod ai;
pub mod auth;
pub mod capabilities;
pub mod config;
pub mod error;
pub mod history;
pub mod search;
pub mod service;
pub mod sources;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::capabilities::SourceConfigSchema;
use crate::config::KindredConfig;
use crate::error::AdapterError;
use crate::search::{NormalizedQuery, SearchResult};

pub use crate::service::GenealogySearchService;

/// One external genealogy provider.
///
/// Implementations translate a [`NormalizedQuery`] into a provider request
/// and normalize what comes back. Expected conditions (missing credentials,
/// no matches) are reported as data: a 0.0-confidence placeholder or an
/// empty list. Only transport and protocol failures return `Err`.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Stable identifier used in requests and result maps (e.g. "ancestry").
    fn id(&self) -> &str;

    /// Human-readable provider name.
    fn display_name(&self) -> &str {
        self.id()
    }

    fn requires_auth(&self) -> bool {
        true
    }

    /// Whether the provider offers a programmatic search API.
    fn api_available(&self) -> bool {
        true
    }

    /// Whether usable credentials were supplied at construction.
    fn is_configured(&self) -> bool {
        false
    }

    fn config_schema(&self) -> SourceConfigSchema {
        SourceConfigSchema::default()
    }

    async fn search(&self, query: &NormalizedQuery) -> Result<Vec<SearchResult>, AdapterError>;

    fn info(&self) -> SourceInfo {
        SourceInfo {
            id: self.id().to_string(),
            name: self.display_name().to_string(),
            requires_auth: self.requires_auth(),
            api_available: self.api_available(),
        }
    }
}

/// Static catalog entry for a registered source.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SourceInfo {
    pub id: String,
    pub name: String,
    pub requires_auth: bool,
    pub api_available: bool,
}

/// Source identifier → adapter. Built once; adapters are immutable after
/// construction, so they are shared without locking.
pub struct SourceRegistry {
    sources: HashMap<String, Arc<dyn SourceAdapter>>,
    order: Vec<String>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        SourceRegistry {
            sources: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Register an adapter, replacing any adapter with the same id.
    pub fn register(&mut self, adapter: Arc<dyn SourceAdapter>) {
        let id = adapter.id().to_string();
        if self.sources.insert(id.clone(), adapter).is_none() {
            self.order.push(id);
        }
    }

    pub fn register_source(&mut self, adapter: impl SourceAdapter + 'static) {
        self.register(Arc::new(adapter));
    }

    /// `None` for unregistered ids; callers treat that as "skip".
    pub fn resolve(&self, id: &str) -> Option<Arc<dyn SourceAdapter>> {
        self.sources.get(id).map(Arc::clone)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sources.contains_key(id)
    }

    /// Registered ids in registration order.
    pub fn ids(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn list_sources(&self) -> Vec<SourceInfo> {
        self.order
            .iter()
            .filter_map(|id| self.sources.get(id))
            .map(|adapter| adapter.info())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a registry holding every provider enabled via Cargo features,
/// each constructed with its credential bundle from `config`.
pub fn build_registry(
    #[cfg_attr(
        not(any(
            feature = "ancestry",
            feature = "familysearch",
            feature = "findmypast",
            feature = "myheritage"
        )),
        allow(unused_variables)
    )]
    config: &KindredConfig,
) -> SourceRegistry {
    #[allow(unused_mut)]
    let mut registry = SourceRegistry::new();

    #[cfg(feature = "ancestry")]
    {
        let auth = config.source_auth(sources::ancestry::ID);
        match sources::ancestry::AncestryAdapter::new(&auth) {
            Ok(adapter) => registry.register_source(adapter),
            Err(e) => tracing::warn!(source = sources::ancestry::ID, error = %e, "adapter not registered"),
        }
    }

    #[cfg(feature = "familysearch")]
    {
        let auth = config.source_auth(sources::familysearch::ID);
        match sources::familysearch::FamilySearchAdapter::new(&auth) {
            Ok(adapter) => registry.register_source(adapter),
            Err(e) => tracing::warn!(source = sources::familysearch::ID, error = %e, "adapter not registered"),
        }
    }

    #[cfg(feature = "findmypast")]
    {
        let auth = config.source_auth(sources::findmypast::ID);
        match sources::findmypast::FindMyPastAdapter::new(&auth) {
            Ok(adapter) => registry.register_source(adapter),
            Err(e) => tracing::warn!(source = sources::findmypast::ID, error = %e, "adapter not registered"),
        }
    }

    #[cfg(feature = "myheritage")]
    {
        let auth = config.source_auth(sources::myheritage::ID);
        match sources::myheritage::MyHeritageAdapter::new(&auth) {
            Ok(adapter) => registry.register_source(adapter),
            Err(e) => tracing::warn!(source = sources::myheritage::ID, error = %e, "adapter not registered"),
        }
    }

    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(&'static str);

    #[async_trait]
    impl SourceAdapter for Fixed {
        fn id(&self) -> &str {
            self.0
        }

        async fn search(
            &self,
            query: &NormalizedQuery,
        ) -> Result<Vec<SearchResult>, AdapterError> {
            Ok(vec![SearchResult::new(self.0, query.display_name())])
        }
    }

    #[test]
    fn test_registry_resolve_and_order() {
        let mut registry = SourceRegistry::new();
        registry.register_source(Fixed("b"));
        registry.register_source(Fixed("a"));
        registry.register_source(Fixed("b"));

        assert_eq!(registry.ids(), vec!["b", "a"]);
        assert_eq!(registry.len(), 2);
        assert!(registry.resolve("a").is_some());
        assert!(registry.resolve("unknown_source").is_none());
    }

    #[test]
    fn test_default_info() {
        let info = Fixed("x").info();
        assert_eq!(info.id, "x");
        assert_eq!(info.name, "x");
        assert!(info.requires_auth);
        assert!(info.api_available);
    }

    #[cfg(feature = "all-sources")]
    #[test]
    fn test_build_registry_catalog() {
        let registry = build_registry(&KindredConfig::default());
        assert_eq!(
            registry.ids(),
            vec!["ancestry", "familysearch", "findmypast", "myheritage"]
        );
        let catalog = registry.list_sources();
        assert_eq!(catalog[0].name, "Ancestry.com");
        assert_eq!(catalog[2].name, "Find My Past");
        assert!(catalog.iter().all(|s| s.requires_auth));
        assert!(!catalog[3].api_available);
    }

    #[cfg(feature = "ancestry")]
    #[test]
    fn test_build_registry_passes_credentials() {
        let mut config = KindredConfig::default();
        config
            .sources
            .entry("ancestry".into())
            .or_default()
            .insert("api_key".into(), "anc-key".into());

        let registry = build_registry(&config);
        assert!(registry.resolve("ancestry").unwrap().is_configured());
        assert!(!build_registry(&KindredConfig::default())
            .resolve("ancestry")
            .unwrap()
            .is_configured());
    }
}
