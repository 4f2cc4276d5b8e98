use std::collections::HashMap;

/// Credential bundle for a single source or AI backend (`api_key`,
/// `username`, `access_token`, ...).
pub type AuthDetails = HashMap<String, String>;

/// Values shipped in sample `.env` files that must not count as credentials.
const PLACEHOLDER_VALUES: &[&str] = &[
    "your-openai-key-here",
    "your-anthropic-key-here",
    "your-api-key-here",
    "changeme",
];

/// Return the trimmed value if it is a usable secret.
pub fn usable_secret(value: Option<&str>) -> Option<String> {
    let value = value?.trim();
    if value.is_empty() || PLACEHOLDER_VALUES.contains(&value) {
        None
    } else {
        Some(value.to_string())
    }
}

/// Look up a usable credential field in `auth`.
pub fn credential(auth: &AuthDetails, key: &str) -> Option<String> {
    usable_secret(auth.get(key).map(String::as_str))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders_are_not_secrets() {
        assert_eq!(usable_secret(Some("your-openai-key-here")), None);
        assert_eq!(usable_secret(Some("   ")), None);
        assert_eq!(usable_secret(None), None);
        assert_eq!(usable_secret(Some(" sk-123 ")), Some("sk-123".to_string()));
    }

    #[test]
    fn test_credential_lookup() {
        let mut auth = AuthDetails::new();
        auth.insert("api_key".into(), "key-1".into());
        auth.insert("username".into(), "".into());
        assert_eq!(credential(&auth, "api_key"), Some("key-1".to_string()));
        assert_eq!(credential(&auth, "username"), None);
        assert_eq!(credential(&auth, "password"), None);
    }
}
