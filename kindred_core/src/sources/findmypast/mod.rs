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

pub const ID: &str = "findmypast";

const SITE_URL: &str = "https://www.findmypast.com";
const DEFAULT_API_BASE: &str = "https://api.findmypast.com";
const MISSING_AUTH_NOTE: &str = "FindMyPast requires subscription or API access";

const FIELD_MAP: &[(&str, &str)] = &[
    ("first_name", "firstname"),
    ("last_name", "lastname"),
    ("birth_year", "yearofbirth"),
    ("birth_place", "keywordsplace"),
    ("death_year", "yearofdeath"),
    ("death_place", "deathplace"),
];

pub struct FindMyPastAdapter {
    client: Client,
    api_key: Option<String>,
    api_base: String,
}

impl FindMyPastAdapter {
    pub fn new(auth: &AuthDetails) -> Result<Self, AdapterError> {
        Ok(Self {
            client: build_client()?,
            api_key: credential(auth, "api_key"),
            api_base: credential(auth, "api_base").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
        })
    }

    pub fn build_search_params(&self, query: &NormalizedQuery) -> String {
        encode_params(&rename_fields(query, FIELD_MAP))
    }

    async fn api_search(
        &self,
        api_key: &str,
        params: &str,
    ) -> Result<Vec<SearchResult>, AdapterError> {
        let url = format!(
            "{}/search/records?{}&pagesize={}",
            self.api_base.trim_end_matches('/'),
            params,
            PAGE_SIZE
        );
        debug!(source = ID, url = %url, "Executing FindMyPast search");

        let request = self.client.get(&url).header("X-Api-Key", api_key);
        Ok(send_json(ID, request)
            .await?
            .map(|raw| normalize_records(ID, &raw))
            .unwrap_or_default())
    }
}

#[async_trait]
impl SourceAdapter for FindMyPastAdapter {
    fn id(&self) -> &str {
        ID
    }

    fn display_name(&self) -> &str {
        "Find My Past"
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn config_schema(&self) -> SourceConfigSchema {
        SourceConfigSchema {
            fields: vec![Field::secret(
                "api_key",
                "FindMyPast API Key",
                "FINDMYPAST_API_KEY",
            )],
        }
    }

    async fn search(&self, query: &NormalizedQuery) -> Result<Vec<SearchResult>, AdapterError> {
        let params = self.build_search_params(query);

        let Some(api_key) = self.api_key.as_deref() else {
            warn!(source = ID, "FindMyPast search requires a subscription API key");
            return Ok(vec![placeholder(
                ID,
                query,
                MISSING_AUTH_NOTE,
                &format!("{}/search/", SITE_URL),
                &params,
            )]);
        };

        self.api_search(api_key, &params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_params_include_death_fields() {
        let fmp = FindMyPastAdapter::new(&AuthDetails::new()).unwrap();
        let query = NormalizedQuery::new()
            .with_death_place("Dublin")
            .with_first_name("Sean")
            .with_death_year(1922)
            .with_birth_place("Cork");
        assert_eq!(
            fmp.build_search_params(&query),
            "firstname=Sean&keywordsplace=Cork&yearofdeath=1922&deathplace=Dublin"
        );
    }

    #[tokio::test]
    async fn test_placeholder_without_api_key() {
        let fmp = FindMyPastAdapter::new(&AuthDetails::new()).unwrap();
        let query = NormalizedQuery::new().with_first_name("Jane").with_last_name("Doe");
        let results = fmp.search(&query).await.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "Jane Doe");
        assert_eq!(results[0].note.as_deref(), Some(MISSING_AUTH_NOTE));
        assert_eq!(results[0].url.as_deref(), Some("https://www.findmypast.com/search/"));
        assert!(results[0].is_placeholder());
    }
}
