//! Helpers shared by the provider adapters: HTTP plumbing and
//! record normalization.

use crate::error::AdapterError;
use crate::search::{NormalizedQuery, SearchResult};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::{json, Map, Value};
use std::time::Duration;

pub const USER_AGENT: &str = concat!("kindred/", env!("CARGO_PKG_VERSION"));

/// Records requested per provider call
pub const PAGE_SIZE: u32 = 20;

/// Whole-request limit for provider calls made outside the orchestrator
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(20);

pub fn build_client() -> Result<Client, AdapterError> {
    build_client_with_timeout(HTTP_TIMEOUT)
}

pub fn build_client_with_timeout(timeout: Duration) -> Result<Client, AdapterError> {
    Client::builder()
        .connect_timeout(Duration::from_secs(5))
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| AdapterError::Other(format!("failed to build http client: {}", e)))
}

/// `k=v&k=v` with values percent-encoded, in the given order.
pub fn encode_params(params: &[(&str, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Map query fields to provider parameter names, skipping unmapped fields.
pub fn rename_fields(
    query: &NormalizedQuery,
    mapping: &[(&str, &'static str)],
) -> Vec<(&'static str, String)> {
    query
        .fields()
        .into_iter()
        .filter_map(|(field, value)| {
            mapping
                .iter()
                .find(|(from, _)| *from == field)
                .map(|(_, to)| (*to, value))
        })
        .collect()
}

/// Placeholder with the translated request attached for transparency.
pub fn placeholder(
    source: &str,
    query: &NormalizedQuery,
    note: &str,
    url: &str,
    request: &str,
) -> SearchResult {
    SearchResult::placeholder(source, query, note, url)
        .with_additional_info(json!({ "request": request }))
}

/// Send a request and decode a JSON body.
///
/// `Ok(None)` for 204 No Content. Auth rejections and non-2xx statuses
/// become typed errors; a body that isn't JSON is a parse error.
pub async fn send_json(source: &str, request: RequestBuilder) -> Result<Option<Value>, AdapterError> {
    let response = request.send().await?;
    let status = response.status();

    if status == StatusCode::NO_CONTENT {
        return Ok(None);
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(AdapterError::Authentication(format!(
            "{} rejected the configured credentials ({})",
            source, status
        )));
    }

    let body = response.text().await?;
    if !status.is_success() {
        return Err(AdapterError::Upstream {
            status: status.as_u16(),
            body: body.chars().take(500).collect(),
        });
    }
    if body.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(&body)?))
}

/// Normalize a provider payload into results.
pub fn normalize_records(source: &str, raw: &Value) -> Vec<SearchResult> {
    find_records_array(raw)
        .into_iter()
        .filter_map(|item| normalize_single_record(source, item))
        .collect()
}

/// Find the record array in the common response shapes.
fn find_records_array(raw: &Value) -> Vec<&Value> {
    for field in &["results", "records", "persons", "items", "matches"] {
        if let Some(arr) = raw.get(*field).and_then(|v| v.as_array()) {
            return arr.iter().collect();
        }
    }

    if let Some(arr) = raw.as_array() {
        return arr.iter().collect();
    }

    Vec::new()
}

fn normalize_single_record(source: &str, item: &Value) -> Option<SearchResult> {
    let name = extract_name(item)?;

    let mut result = SearchResult::new(source, name)
        .with_birth(
            first_string(item, &["birth_date", "birthDate", "born"]),
            first_string(item, &["birth_place", "birthPlace"]),
        )
        .with_death(
            first_string(item, &["death_date", "deathDate", "died"]),
            first_string(item, &["death_place", "deathPlace"]),
        );

    if let Some(url) = first_string(item, &["url", "record_url", "link", "href"]) {
        result = result.with_url(url);
    }

    // Providers that report 0 mean "unscored"; 0.0 is reserved for placeholders.
    if let Some(score) = extract_confidence(item) {
        result = result.with_confidence(score);
    }

    Some(result.with_additional_info(extract_additional_info(item)))
}

fn extract_name(item: &Value) -> Option<String> {
    if let Some(name) = first_string(item, &["name", "full_name", "display_name"]) {
        return Some(name);
    }
    let given = first_string(item, &["first_name", "given_name", "givenName", "firstname"]);
    let surname = first_string(item, &["last_name", "surname", "lastname"]);
    let joined = [given, surname]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");
    if joined.is_empty() {
        None
    } else {
        Some(joined)
    }
}

fn extract_confidence(item: &Value) -> Option<f64> {
    let raw = ["confidence_score", "confidence", "score", "match_score"]
        .iter()
        .find_map(|k| item.get(*k).and_then(|v| v.as_f64()))?;
    // Percent-style scores
    let score = if raw > 1.0 && raw <= 100.0 { raw / 100.0 } else { raw };
    if score > 0.0 {
        Some(score)
    } else {
        None
    }
}

fn extract_additional_info(item: &Value) -> Value {
    let mut info = Map::new();
    for key in &["id", "record_type", "collection", "gender", "residence", "spouse", "parents"] {
        if let Some(v) = item.get(*key).filter(|v| !v.is_null()) {
            info.insert((*key).to_string(), v.clone());
        }
    }
    if info.is_empty() {
        Value::Null
    } else {
        Value::Object(info)
    }
}

fn first_string(item: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| {
        item.get(*k).and_then(|v| match v {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_client_gives_up_on_silent_server() {
        // Connections land in the backlog but nothing ever answers.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/search", listener.local_addr().unwrap());

        let client = build_client_with_timeout(Duration::from_millis(100)).unwrap();
        let err = send_json("ancestry", client.get(url)).await.unwrap_err();
        assert!(err.is_timeout(), "unexpected error: {err}");
    }

    #[test]
    fn test_encode_params_keeps_order() {
        let params = vec![
            ("surname", "O'Brien".to_string()),
            ("place", "County Cork, Ireland".to_string()),
        ];
        assert_eq!(
            encode_params(&params),
            "surname=O%27Brien&place=County%20Cork%2C%20Ireland"
        );
    }

    #[test]
    fn test_rename_fields_skips_unmapped() {
        let query = NormalizedQuery::new()
            .with_first_name("Jane")
            .with_death_year(1970)
            .with_birth_year(1900);
        let params = rename_fields(&query, &[("first_name", "fn"), ("birth_year", "by")]);
        assert_eq!(
            params,
            vec![("fn", "Jane".to_string()), ("by", "1900".to_string())]
        );
    }

    #[test]
    fn test_normalize_records() {
        let raw = json!({
            "records": [
                {
                    "given_name": "Jane",
                    "surname": "Doe",
                    "birthDate": "3 May 1900",
                    "birth_place": "Boston, Massachusetts",
                    "url": "https://example.org/r/1",
                    "score": 87,
                    "record_type": "census"
                },
                {"name": "John Doe", "confidence": 0.0},
                {"id": "no-name"}
            ]
        });

        let results = normalize_records("ancestry", &raw);
        assert_eq!(results.len(), 2);

        let jane = &results[0];
        assert_eq!(jane.name, "Jane Doe");
        assert_eq!(jane.birth_date.as_deref(), Some("3 May 1900"));
        assert_eq!(jane.birth_place.as_deref(), Some("Boston, Massachusetts"));
        assert_eq!(jane.confidence_score, Some(0.87));
        assert_eq!(jane.additional_info["record_type"], json!("census"));

        let john = &results[1];
        assert_eq!(john.confidence_score, None);
        assert!(!john.is_placeholder());
        assert!(john.additional_info.is_null());
    }

    #[test]
    fn test_find_records_array_shapes() {
        assert_eq!(find_records_array(&json!({"results": [{}, {}]})).len(), 2);
        assert_eq!(find_records_array(&json!([{}, {}, {}])).len(), 3);
        assert!(find_records_array(&json!({"unexpected": true})).is_empty());
    }
}
