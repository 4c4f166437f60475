//! Injected key/value store for process-lifetime state.
//!
//! Call sites only see [`KeyValueStore`]; the in-memory map can be replaced
//! by a TTL cache or an external store without touching them.

use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value;

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;

    fn put(&self, key: &str, value: Value);

    /// Remove `key`, returning the previous value.
    fn delete(&self, key: &str) -> Option<Value>;

    /// Keys starting with `prefix`, sorted.
    fn keys(&self, prefix: &str) -> Vec<String>;
}

/// Process-wide map, no eviction.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: RwLock<HashMap<String, Value>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for InMemoryStore {
    fn get(&self, key: &str) -> Option<Value> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(key).cloned()
    }

    fn put(&self, key: &str, value: Value) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), value);
    }

    fn delete(&self, key: &str) -> Option<Value> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.remove(key)
    }

    fn keys(&self, prefix: &str) -> Vec<String> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let mut keys: Vec<String> = entries
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        keys
    }
}
