use crate::auth::{credential, AuthDetails};
use crate::capabilities::{Field, SourceConfigSchema};
use crate::error::AdapterError;
use crate::search::{NormalizedQuery, SearchResult};
use crate::sources::common::{
    build_client, encode_params, normalize_records, placeholder, rename_fields, send_json,
    PAGE_SIZE,
};
use crate::SourceAdapter;
use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

pub const ID: &str = "ancestry";

const SITE_URL: &str = "https://www.ancestry.com";
const DEFAULT_API_BASE: &str = "https://api.ancestry.com";
const MISSING_AUTH_NOTE: &str =
    "Ancestry.com requires authentication. Please provide API key or credentials.";

/// Ancestry only accepts name and birth details on its partner search.
const FIELD_MAP: &[(&str, &str)] = &[
    ("first_name", "first_name"),
    ("last_name", "last_name"),
    ("birth_year", "birth_year"),
    ("birth_place", "birth_place"),
];

pub struct AncestryAdapter {
    client: Client,
    api_key: Option<String>,
    api_base: String,
}

impl AncestryAdapter {
    pub fn new(auth: &AuthDetails) -> Result<Self, AdapterError> {
        Ok(Self {
            client: build_client()?,
            api_key: credential(auth, "api_key"),
            api_base: credential(auth, "api_base").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
        })
    }

    /// Query string sent to the partner API, in fixed field order.
    pub fn build_search_params(&self, query: &NormalizedQuery) -> String {
        encode_params(&rename_fields(query, FIELD_MAP))
    }

    async fn api_search(
        &self,
        api_key: &str,
        params: &str,
    ) -> Result<Vec<SearchResult>, AdapterError> {
        let url = format!(
            "{}/v1/search/records?{}&count={}",
            self.api_base.trim_end_matches('/'),
            params,
            PAGE_SIZE
        );
        debug!(source = ID, url = %url, "Executing Ancestry search");

        let request = self.client.get(&url).bearer_auth(api_key);
        Ok(send_json(ID, request)
            .await?
            .map(|raw| normalize_records(ID, &raw))
            .unwrap_or_default())
    }
}

#[async_trait]
impl SourceAdapter for AncestryAdapter {
    fn id(&self) -> &str {
        ID
    }

    fn display_name(&self) -> &str {
        "Ancestry.com"
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn config_schema(&self) -> SourceConfigSchema {
        SourceConfigSchema {
            fields: vec![Field::secret("api_key", "Ancestry API Key", "ANCESTRY_API_KEY")],
        }
    }

    async fn search(&self, query: &NormalizedQuery) -> Result<Vec<SearchResult>, AdapterError> {
        let params = self.build_search_params(query);

        let Some(api_key) = self.api_key.as_deref() else {
            warn!(source = ID, "Ancestry search requires authentication or API key");
            return Ok(vec![placeholder(
                ID,
                query,
                MISSING_AUTH_NOTE,
                &format!("{}/search/", SITE_URL),
                &params,
            )]);
        };

        if params.is_empty() {
            debug!(source = ID, "no fields Ancestry can search on");
            return Ok(Vec::new());
        }

        self.api_search(api_key, &params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter(auth: &[(&str, &str)]) -> AncestryAdapter {
        let auth: AuthDetails = auth
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AncestryAdapter::new(&auth).unwrap()
    }

    #[test]
    fn test_search_params_fixed_order() {
        let query = NormalizedQuery::new()
            .with_birth_place("Boston")
            .with_death_year(1970)
            .with_last_name("Doe")
            .with_first_name("Jane");
        assert_eq!(
            adapter(&[]).build_search_params(&query),
            "first_name=Jane&last_name=Doe&birth_place=Boston"
        );
    }

    #[tokio::test]
    async fn test_placeholder_without_api_key() {
        let ancestry = adapter(&[("api_key", "  ")]);
        assert!(!ancestry.is_configured());

        let query = NormalizedQuery::new()
            .with_first_name("Jane")
            .with_last_name("Doe")
            .with_birth_year(1900);
        let results = ancestry.search(&query).await.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].source, "ancestry");
        assert_eq!(results[0].name, "Jane Doe");
        assert!(results[0].is_placeholder());
        assert_eq!(results[0].note.as_deref(), Some(MISSING_AUTH_NOTE));
        assert_eq!(
            results[0].additional_info["request"],
            "first_name=Jane&last_name=Doe&birth_year=1900"
        );
    }

    #[tokio::test]
    async fn test_configured_without_searchable_fields_is_empty() {
        let ancestry = adapter(&[("api_key", "key"), ("api_base", "http://127.0.0.1:9")]);
        assert!(ancestry.is_configured());
        let query = NormalizedQuery::new().with_death_place("Cork");
        assert!(ancestry.search(&query).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transport_failure_is_typed() {
        let ancestry = adapter(&[("api_key", "key"), ("api_base", "http://127.0.0.1:9")]);
        let query = NormalizedQuery::new().with_last_name("Doe");
        let err = ancestry.search(&query).await.unwrap_err();
        assert_eq!(err.code_str(), "upstream_error");
    }
}
