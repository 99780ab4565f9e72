use crate::error::{GridError, Result};

use dashmap::DashMap;
use serde_json::Value;
use std::collections::HashMap;

pub struct UserContextStore {
    entries: DashMap<String, Value>,
}

impl UserContextStore {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Copies every entry of `template` into a fresh store.
    ///
    /// Values are cloned, so later changes to either side are never shared.
    pub fn from_template(template: &HashMap<String, Value>) -> Self {
        let entries = DashMap::with_capacity(template.len());
        for (key, value) in template {
            entries.insert(key.clone(), value.clone());
        }

        tracing::debug!("User context seeded with {} entries", entries.len());

        Self { entries }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    /// Stores `value` under `key` and returns the previous value, if any.
    pub fn put(&self, key: &str, value: Value) -> Result<Option<Value>> {
        if key.is_empty() {
            return Err(GridError::InvalidArgument(
                "user context key must not be empty".to_string(),
            ));
        }

        Ok(self.entries.insert(key.to_string(), value))
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.entries.remove(key).map(|(_, value)| value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Point-in-time copy of the whole context.
    pub fn snapshot(&self) -> HashMap<String, Value> {
        self.entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }
}

impl Default for UserContextStore {
    fn default() -> Self {
        Self::new()
    }
}
