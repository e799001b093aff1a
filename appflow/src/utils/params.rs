//! Helpers for reading function parameters from configuration strings.

use std::collections::BTreeMap;

/// Trims each entry and removes the empty ones.
#[must_use]
pub fn delete_empty_and_trim<S: AsRef<str>>(values: &[S]) -> Vec<String> {
    values
        .iter()
        .map(|value| value.as_ref().trim())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .collect()
}

/// Splits a comma separated list, trimming entries and dropping empty ones.
#[must_use]
pub fn split_list(value: &str) -> Vec<String> {
    let parts: Vec<&str> = value.split(',').collect();
    delete_empty_and_trim(&parts)
}

/// Parses a boolean parameter. Accepts `true`/`false`, `1`/`0`, `yes`/`no`.
#[must_use]
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "t" => Some(true),
        "false" | "0" | "no" | "f" => Some(false),
        _ => None,
    }
}

/// Parses `key1:value1,key2:value2` into an ordered map.
///
/// Returns the first malformed entry as the error.
pub fn parse_key_values(value: &str) -> Result<BTreeMap<String, String>, String> {
    let mut map = BTreeMap::new();
    for entry in split_list(value) {
        let Some((key, val)) = entry.split_once(':') else {
            return Err(entry);
        };
        let key = key.trim();
        let val = val.trim();
        if key.is_empty() || val.is_empty() {
            return Err(entry);
        }
        map.insert(key.to_string(), val.to_string());
    }
    Ok(map)
}
