//! Defensive decoders for the loosely typed JSON columns on catalog rows.
//!
//! Image, gallery and badge columns have been written in several shapes over
//! time: a JSON array of bare strings, a JSON array of `{ "url": .. }` or
//! `{ "label": .. }` objects, a text column holding either of those encoded as
//! a string, or a single bare URL. Anything else decodes to an empty list.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Decodes an images or gallery column into a list of URLs.
pub fn decode_url_list(raw: Option<&Value>) -> Vec<String> {
    decode_list(raw, "url", true)
}

/// Decodes a badges column into a list of labels.
pub fn decode_badges(raw: Option<&Value>) -> Vec<String> {
    decode_list(raw, "label", false)
}

fn decode_list(raw: Option<&Value>, key: &str, allow_bare_url: bool) -> Vec<String> {
    match raw {
        Some(Value::Array(items)) => collect_items(items, key),
        Some(Value::String(text)) => decode_text(text, key, allow_bare_url),
        _ => Vec::new(),
    }
}

fn decode_text(text: &str, key: &str, allow_bare_url: bool) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Array(items)) => collect_items(&items, key),
        Ok(_) => Vec::new(),
        Err(_) if allow_bare_url && looks_like_url(text) => vec![text.to_string()],
        Err(err) => {
            tracing::debug!(error = %err, "ignoring undecodable list column");
            Vec::new()
        }
    }
}

fn collect_items(items: &[Value], key: &str) -> Vec<String> {
    items
        .iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s.as_str()),
            Value::Object(map) => map.get(key).and_then(Value::as_str),
            _ => None,
        })
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

fn looks_like_url(text: &str) -> bool {
    (text.starts_with("http://") || text.starts_with("https://") || text.starts_with('/'))
        && !text.contains(char::is_whitespace)
}

/// Accepts text or numeric identifiers.
pub(crate) fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("expected string or number id, got {other}"))),
    }
}

pub(crate) fn opt_string_or_number<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!("expected string or number id, got {other}"))),
    }
}

/// Treats an explicit `null` column like a missing one.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_array_of_strings_and_objects() {
        let raw = json!(["https://cdn/a.jpg", {"url": "https://cdn/b.jpg"}, {"alt": "x"}, 7, " "]);
        assert_eq!(decode_url_list(Some(&raw)), vec!["https://cdn/a.jpg", "https://cdn/b.jpg"]);
    }

    #[test]
    fn decodes_json_encoded_text_columns() {
        let raw = json!("[{\"url\":\"https://cdn/a.jpg\"}]");
        assert_eq!(decode_url_list(Some(&raw)), vec!["https://cdn/a.jpg"]);

        let badges = json!("[\"Ново\", {\"label\": \"Хит\"}]");
        assert_eq!(decode_badges(Some(&badges)), vec!["Ново", "Хит"]);
    }

    #[test]
    fn accepts_a_single_bare_url() {
        let raw = json!("https://cdn/cover.jpg");
        assert_eq!(decode_url_list(Some(&raw)), vec!["https://cdn/cover.jpg"]);
        assert!(decode_badges(Some(&json!("not json"))).is_empty());
    }

    #[test]
    fn tolerates_null_and_garbage() {
        assert!(decode_url_list(None).is_empty());
        assert!(decode_url_list(Some(&Value::Null)).is_empty());
        assert!(decode_url_list(Some(&json!("[broken"))).is_empty());
        assert!(decode_url_list(Some(&json!({"url": "https://cdn/a.jpg"}))).is_empty());
        assert!(decode_badges(Some(&json!(42))).is_empty());
    }
}
