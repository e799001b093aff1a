//! Context values and placeholder substitution.

use crate::errors::{AppflowError, Result};
use std::collections::HashMap;

/// Device name of the decoded event.
pub const KEY_DEVICE_NAME: &str = "devicename";
/// Profile name of the decoded event.
pub const KEY_PROFILE_NAME: &str = "profilename";
/// Source name of the decoded event.
pub const KEY_SOURCE_NAME: &str = "sourcename";
/// Topic the message was received on.
pub const KEY_RECEIVED_TOPIC: &str = "receivedtopic";
/// Id of the pipeline processing the message.
pub const KEY_PIPELINE_ID: &str = "pipelineid";

/// A case-insensitive string map of per-run values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextValues {
    values: HashMap<String, String>,
}

impl ContextValues {
    /// Creates an empty value map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a value. Keys are stored lowercased.
    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(key.to_lowercase(), value.into());
    }

    /// Returns the value for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(&key.to_lowercase()).map(String::as_str)
    }

    /// Removes the value for `key`.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.values.remove(&key.to_lowercase())
    }

    /// Returns a copy of all values.
    #[must_use]
    pub fn to_map(&self) -> HashMap<String, String> {
        self.values.clone()
    }

    /// Replaces every `{key}` placeholder in `template`.
    ///
    /// Fails if any placeholder has no value.
    pub fn apply(&self, template: &str) -> Result<String> {
        let mut replaced = String::with_capacity(template.len());
        let mut missing = false;
        let mut rest = template;

        while let Some(open) = rest.find('{') {
            let Some(close) = rest[open..].find('}').map(|i| open + i) else {
                break;
            };
            let key = &rest[open + 1..close];
            replaced.push_str(&rest[..open]);
            if let Some(value) = self.get(key) {
                replaced.push_str(value);
            } else {
                missing = true;
                replaced.push_str(&rest[open..=close]);
            }
            rest = &rest[close + 1..];
        }
        replaced.push_str(rest);

        if missing {
            Err(AppflowError::validation(format!(
                "failed to replace all context placeholders in input ('{replaced}' after replacements)"
            )))
        } else {
            Ok(replaced)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values() -> ContextValues {
        let mut values = ContextValues::new();
        values.insert(KEY_DEVICE_NAME, "dev-1");
        values.insert("ProfileName", "prof");
        values
    }

    #[test]
    fn test_keys_are_case_insensitive() {
        let values = values();
        assert_eq!(values.get("DeviceName"), Some("dev-1"));
        assert_eq!(values.get(KEY_PROFILE_NAME), Some("prof"));
    }

    #[test]
    fn test_apply_replaces_placeholders() {
        let out = values().apply("events/{devicename}/{ProfileName}").unwrap();
        assert_eq!(out, "events/dev-1/prof");
    }

    #[test]
    fn test_apply_without_placeholders() {
        assert_eq!(values().apply("plain/topic").unwrap(), "plain/topic");
    }

    #[test]
    fn test_apply_missing_placeholder_fails() {
        let err = values().apply("events/{unknown}").unwrap_err();
        assert!(err.to_string().contains("events/{unknown}"));
    }
}
