//! MyHeritage has no public record-search API, so this adapter always
//! answers with a pointer to the research page carrying the translated
//! request.

use crate::auth::{credential, AuthDetails};
use crate::capabilities::{Field, SourceConfigSchema};
use crate::error::AdapterError;
use crate::search::{NormalizedQuery, SearchResult};
use crate::sources::common::{encode_params, placeholder, rename_fields};
use crate::SourceAdapter;
use async_trait::async_trait;
use tracing::debug;

pub const ID: &str = "myheritage";

const SITE_URL: &str = "https://www.myheritage.com";
const NOTE: &str = "MyHeritage requires subscription or API access";

const FIELD_MAP: &[(&str, &str)] = &[
    ("first_name", "qname_first"),
    ("last_name", "qname_last"),
    ("birth_year", "qevents-event1_year"),
    ("birth_place", "qevents-event1_place"),
    ("death_year", "qevents-death_year"),
    ("death_place", "qevents-death_place"),
];

pub struct MyHeritageAdapter {
    api_key: Option<String>,
}

impl MyHeritageAdapter {
    pub fn new(auth: &AuthDetails) -> Result<Self, AdapterError> {
        Ok(Self {
            api_key: credential(auth, "api_key"),
        })
    }

    pub fn build_search_params(&self, query: &NormalizedQuery) -> String {
        encode_params(&rename_fields(query, FIELD_MAP))
    }
}

#[async_trait]
impl SourceAdapter for MyHeritageAdapter {
    fn id(&self) -> &str {
        ID
    }

    fn display_name(&self) -> &str {
        "MyHeritage"
    }

    fn api_available(&self) -> bool {
        false
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn config_schema(&self) -> SourceConfigSchema {
        SourceConfigSchema {
            fields: vec![Field::secret(
                "api_key",
                "MyHeritage API Key",
                "MYHERITAGE_API_KEY",
            )],
        }
    }

    async fn search(&self, query: &NormalizedQuery) -> Result<Vec<SearchResult>, AdapterError> {
        let params = self.build_search_params(query);
        debug!(source = ID, request = %params, "MyHeritage research link");

        let url = if params.is_empty() {
            format!("{}/research/", SITE_URL)
        } else {
            format!("{}/research/?{}", SITE_URL, params)
        };
        Ok(vec![placeholder(ID, query, NOTE, &url, &params)])
    }
}
