use crate::auth::{credential, AuthDetails};
use crate::capabilities::{Field, SourceConfigSchema};
use crate::error::AdapterError;
use crate::search::{NormalizedQuery, SearchResult};
use crate::sources::common::{build_client, placeholder, send_json, PAGE_SIZE};
use crate::SourceAdapter;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

pub const ID: &str = "familysearch";

const SITE_URL: &str = "https://www.familysearch.org";
const DEFAULT_API_BASE: &str = "https://api.familysearch.org";
const MISSING_AUTH_NOTE: &str = "FamilySearch API requires OAuth authentication";

/// FamilySearch reports match confidence on a 1-5 scale.
const MAX_CONFIDENCE: f64 = 5.0;

pub struct FamilySearchAdapter {
    client: Client,
    username: Option<String>,
    access_token: Option<String>,
    api_base: String,
}

impl FamilySearchAdapter {
    pub fn new(auth: &AuthDetails) -> Result<Self, AdapterError> {
        Ok(Self {
            client: build_client()?,
            username: credential(auth, "username"),
            access_token: credential(auth, "access_token"),
            api_base: credential(auth, "api_base").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
        })
    }

    /// Structured `q` parameter for the tree search endpoint.
    ///
    /// Terms follow a fixed order; quoted values have embedded quotes removed.
    pub fn build_search_query(&self, query: &NormalizedQuery) -> String {
        fn quoted(value: &str) -> String {
            format!("\"{}\"", value.replace('"', ""))
        }

        let mut parts = Vec::new();
        if let Some(v) = &query.first_name {
            parts.push(format!("givenName:{}", quoted(v)));
        }
        if let Some(v) = &query.last_name {
            parts.push(format!("surname:{}", quoted(v)));
        }
        if let Some(v) = query.birth_year {
            parts.push(format!("birthLikeDate:{}", v));
        }
        if let Some(v) = &query.birth_place {
            parts.push(format!("birthLikePlace:{}", quoted(v)));
        }
        if let Some(v) = query.death_year {
            parts.push(format!("deathLikeDate:{}", v));
        }
        if let Some(v) = &query.death_place {
            parts.push(format!("deathLikePlace:{}", quoted(v)));
        }
        parts.join(" ")
    }

    async fn api_search(&self, token: &str, q: &str) -> Result<Vec<SearchResult>, AdapterError> {
        let url = format!(
            "{}/platform/tree/search?q={}&count={}",
            self.api_base.trim_end_matches('/'),
            urlencoding::encode(q),
            PAGE_SIZE
        );
        debug!(source = ID, url = %url, "Executing FamilySearch search");

        let request = self
            .client
            .get(&url)
            .bearer_auth(token)
            .header("Accept", "application/x-fs-v1+json");
        Ok(send_json(ID, request)
            .await?
            .map(|raw| parse_entries(&raw))
            .unwrap_or_default())
    }
}

/// Parse the GEDCOM X atom feed returned by tree search.
fn parse_entries(raw: &Value) -> Vec<SearchResult> {
    let Some(entries) = raw.get("entries").and_then(|v| v.as_array()) else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| {
            let entry_id = entry.get("id").and_then(|v| v.as_str());
            let persons = entry
                .pointer("/content/gedcomx/persons")
                .and_then(|v| v.as_array())?;
            let person = persons
                .iter()
                .find(|p| p.get("id").and_then(|v| v.as_str()) == entry_id)
                .or_else(|| persons.first())?;
            let display = person.get("display")?;
            let name = display.get("name").and_then(|v| v.as_str())?;
            let text = |key: &str| {
                display
                    .get(key)
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string())
            };

            let person_id = person.get("id").and_then(|v| v.as_str()).unwrap_or_default();
            let mut result = SearchResult::new(ID, name)
                .with_birth(text("birthDate"), text("birthPlace"))
                .with_death(text("deathDate"), text("deathPlace"))
                .with_additional_info(json!({
                    "person_id": person_id,
                    "gender": text("gender"),
                    "lifespan": text("lifespan"),
                }));
            if !person_id.is_empty() {
                result = result.with_url(format!("{}/tree/person/details/{}", SITE_URL, person_id));
            }
            if let Some(confidence) = entry.get("confidence").and_then(|v| v.as_f64()) {
                if confidence > 0.0 {
                    result = result.with_confidence(confidence / MAX_CONFIDENCE);
                }
            }
            Some(result)
        })
        .collect()
}

#[async_trait]
impl SourceAdapter for FamilySearchAdapter {
    fn id(&self) -> &str {
        ID
    }

    fn display_name(&self) -> &str {
        "FamilySearch"
    }

    fn is_configured(&self) -> bool {
        self.access_token.is_some()
    }

    fn config_schema(&self) -> SourceConfigSchema {
        SourceConfigSchema {
            fields: vec![
                Field::text("username", "FamilySearch Username", "FAMILYSEARCH_USERNAME"),
                Field::secret(
                    "access_token",
                    "OAuth Access Token",
                    "FAMILYSEARCH_ACCESS_TOKEN",
                ),
            ],
        }
    }

    async fn search(&self, query: &NormalizedQuery) -> Result<Vec<SearchResult>, AdapterError> {
        let q = self.build_search_query(query);
        info!(source = ID, query = %q, "FamilySearch query");

        let Some(token) = self.access_token.as_deref() else {
            if self.username.is_some() {
                warn!(
                    source = ID,
                    "username set but FamilySearch needs an OAuth access token"
                );
            }
            return Ok(vec![placeholder(
                ID,
                query,
                MISSING_AUTH_NOTE,
                &format!("{}/search/", SITE_URL),
                &q,
            )]);
        };

        if q.is_empty() {
            return Ok(Vec::new());
        }

        self.api_search(token, &q).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> FamilySearchAdapter {
        FamilySearchAdapter::new(&AuthDetails::new()).unwrap()
    }

    #[test]
    fn test_search_query_fixed_order() {
        let query = NormalizedQuery::new()
            .with_death_place("Galway")
            .with_birth_place("Cork \"City\"")
            .with_birth_year(1850)
            .with_last_name("Murphy")
            .with_first_name("Mary")
            .with_death_year(1920);
        assert_eq!(
            adapter().build_search_query(&query),
            "givenName:\"Mary\" surname:\"Murphy\" birthLikeDate:1850 \
             birthLikePlace:\"Cork City\" deathLikeDate:1920 deathLikePlace:\"Galway\""
        );
    }

    #[test]
    fn test_search_query_is_deterministic() {
        let query = NormalizedQuery::new().with_first_name("Jane").with_last_name("Doe");
        let fs = adapter();
        assert_eq!(fs.build_search_query(&query), fs.build_search_query(&query));
    }

    #[tokio::test]
    async fn test_placeholder_without_token() {
        let mut auth = AuthDetails::new();
        auth.insert("username".into(), "jdoe".into());
        let fs = FamilySearchAdapter::new(&auth).unwrap();
        assert!(!fs.is_configured());

        let query = NormalizedQuery::new().with_first_name("Jane").with_last_name("Doe");
        let results = fs.search(&query).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].source, "familysearch");
        assert!(results[0].is_placeholder());
        assert_eq!(results[0].url.as_deref(), Some("https://www.familysearch.org/search/"));
    }

    #[test]
    fn test_schema_lists_only_read_credentials() {
        let names: Vec<_> = adapter()
            .config_schema()
            .fields
            .into_iter()
            .map(|f| f.name)
            .collect();
        assert_eq!(names, vec!["username", "access_token"]);
    }

    #[test]
    fn test_parse_entries() {
        let raw = json!({
            "entries": [
                {
                    "id": "KWQS-BBQ",
                    "confidence": 4,
                    "content": {"gedcomx": {"persons": [{
                        "id": "KWQS-BBQ",
                        "display": {
                            "name": "Jane Doe",
                            "gender": "Female",
                            "lifespan": "1900-1970",
                            "birthDate": "1900",
                            "birthPlace": "Boston, Massachusetts",
                            "deathDate": "1970"
                        }
                    }]}}
                },
                {"id": "EMPTY", "content": {"gedcomx": {"persons": []}}}
            ]
        });

        let results = parse_entries(&raw);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "Jane Doe");
        assert_eq!(results[0].confidence_score, Some(0.8));
        assert_eq!(
            results[0].url.as_deref(),
            Some("https://www.familysearch.org/tree/person/details/KWQS-BBQ")
        );
        assert_eq!(results[0].additional_info["lifespan"], "1900-1970");
        assert!(parse_entries(&json!({})).is_empty());
    }
}
