//! Best-effort extraction of structured data from free-form model output.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

static FENCED_JSON: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```(?:json|JSON)?\s*(\{.*?\})\s*```").expect("valid fenced json regex")
});

/// First JSON object found in `text`: a fenced block, then the outermost
/// braces, then the whole text.
pub fn extract_json_object(text: &str) -> Option<Map<String, Value>> {
    if let Some(obj) = FENCED_JSON
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .find_map(|m| parse_object(m.as_str()))
    {
        return Some(obj);
    }

    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if start < end {
            if let Some(obj) = parse_object(&text[start..=end]) {
                return Some(obj);
            }
        }
    }

    parse_object(text.trim())
}

fn parse_object(candidate: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Strings under the first of `keys` present in `obj`.
///
/// Accepts an array of strings, an array of objects (their `name`,
/// `source`, `value` or `text` field, else the compact JSON), or a single
/// string.
pub fn string_list(obj: &Map<String, Value>, keys: &[&str]) -> Vec<String> {
    let Some(value) = keys.iter().find_map(|k| obj.get(*k)) else {
        return Vec::new();
    };
    match value {
        Value::Array(items) => items.iter().filter_map(item_text).collect(),
        Value::String(s) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}

fn item_text(item: &Value) -> Option<String> {
    match item {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(map) => ["name", "source", "value", "text"]
            .iter()
            .find_map(|k| map.get(*k).and_then(|v| v.as_str()))
            .map(|s| s.trim().to_string())
            .or_else(|| Some(item.to_string())),
        _ => None,
    }
}

/// A 0..=1 score from a number or numeric string; percentages are scaled.
pub fn score(value: &Value) -> Option<f64> {
    let raw = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse().ok()?,
        _ => return None,
    };
    if !raw.is_finite() || raw < 0.0 {
        return None;
    }
    let scaled = if raw > 1.0 && raw <= 100.0 {
        raw / 100.0
    } else {
        raw
    };
    Some(scaled.min(1.0))
}

/// At most `max` characters of `text`.
pub fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_fenced_block() {
        let text = "Here you go:\n```json\n{\"suggested_sources\": [\"familysearch\"]}\n```\nGood luck!";
        let obj = extract_json_object(text).unwrap();
        assert_eq!(obj["suggested_sources"], json!(["familysearch"]));
    }

    #[test]
    fn test_extract_bare_object_with_prose() {
        let text = "Sure. {\"a\": 1, \"b\": {\"c\": 2}} Hope that helps.";
        let obj = extract_json_object(text).unwrap();
        assert_eq!(obj["b"]["c"], json!(2));
    }

    #[test]
    fn test_garbled_output_is_none() {
        assert!(extract_json_object("no structure here").is_none());
        assert!(extract_json_object("{ broken: ").is_none());
        assert!(extract_json_object("[1, 2, 3]").is_none());
    }

    #[test]
    fn test_string_list_shapes() {
        let obj = json!({
            "names": ["Jon", " ", {"name": "Johann"}, {"other": 1}],
            "single": "Smyth",
        });
        let obj = obj.as_object().unwrap();
        assert_eq!(
            string_list(obj, &["missing", "names"]),
            vec!["Jon", "Johann", "{\"other\":1}"]
        );
        assert_eq!(string_list(obj, &["single"]), vec!["Smyth"]);
        assert!(string_list(obj, &["nothing"]).is_empty());
    }

    #[test]
    fn test_score_normalization() {
        assert_eq!(score(&json!(0.9)), Some(0.9));
        assert_eq!(score(&json!(85)), Some(0.85));
        assert_eq!(score(&json!("70%")), Some(0.7));
        assert_eq!(score(&json!(-1)), None);
        assert_eq!(score(&json!("high")), None);
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("Müller", 2), "Mü");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }
}
