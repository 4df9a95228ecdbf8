//! Helpers for pulling JSON objects out of model output.

use regex::Regex;
use serde::de::DeserializeOwned;
use std::sync::LazyLock;

static JSON_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```json[ \t]*\r?\n(.*?)\r?\n[ \t]*```").expect("valid regex"));

static ANY_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```[a-zA-Z]*[ \t]*\r?\n(.*?)\r?\n[ \t]*```").expect("valid regex"));

/// Remove every control character in U+0000..=U+001F.
pub fn clean_json(text: &str) -> String {
    text.chars().filter(|c| !('\u{0}'..='\u{1f}').contains(c)).collect()
}

/// Take the contents of the first fenced code block (preferring ```json)
/// or the whole text if there is none, then strip control characters.
pub fn extract_json(text: &str) -> String {
    let fenced = JSON_FENCE
        .captures(text)
        .or_else(|| ANY_FENCE.captures(text))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim());

    clean_json(fenced.unwrap_or(text))
}

/// [`extract_json`] followed by `serde_json` deserialization.
pub fn parse_model_json<T: DeserializeOwned>(text: &str) -> Result<T, serde_json::Error> {
    serde_json::from_str(&extract_json(text))
}

/// Render a JSON value as a plain string: strings verbatim, everything else
/// in its compact JSON form.
pub fn value_to_string(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    }
}
