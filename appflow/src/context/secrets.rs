//! Secret lookup used by functions that need keys or credentials.

use crate::errors::{AppflowError, Result};
use dashmap::DashMap;
use std::collections::HashMap;

/// Source of named secrets.
pub trait SecretProvider: Send + Sync {
    /// Returns the requested keys of the secret stored under `name`.
    ///
    /// Keys that are not present are omitted from the result.
    fn get_secrets(&self, name: &str, keys: &[&str]) -> Result<HashMap<String, String>>;
}

/// A secret provider backed by an in-process map.
#[derive(Debug, Default)]
pub struct InMemorySecretProvider {
    secrets: DashMap<String, HashMap<String, String>>,
}

impl InMemorySecretProvider {
    /// Creates an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores or replaces the secret under `name`.
    pub fn store(&self, name: impl Into<String>, values: HashMap<String, String>) {
        self.secrets.insert(name.into(), values);
    }
}

impl SecretProvider for InMemorySecretProvider {
    fn get_secrets(&self, name: &str, keys: &[&str]) -> Result<HashMap<String, String>> {
        let secret = self
            .secrets
            .get(name)
            .ok_or_else(|| AppflowError::validation(format!("no secret stored under '{name}'")))?;
        Ok(keys
            .iter()
            .filter_map(|key| secret.get(*key).map(|v| ((*key).to_string(), v.clone())))
            .collect())
    }
}
