//! Memoized machine translations, keyed by language code

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::Value;
use tracing::debug;

/// Translated message trees for unbundled languages
///
/// Shared by wrapping in an `Arc`. Entries stay until `evict` or `clear`.
#[derive(Debug, Default)]
pub struct TranslationCache {
    entries: RwLock<HashMap<String, Value>>,
}

impl TranslationCache {
    pub fn new() -> Self {
        Self::default()
    }

    // Every write replaces whole entries, so a poisoned map is still usable
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Value>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Value>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, lang: &str) -> Option<Value> {
        self.read().get(lang).cloned()
    }

    pub fn insert(&self, lang: &str, messages: Value) {
        self.write().insert(lang.to_string(), messages);
    }

    pub fn contains(&self, lang: &str) -> bool {
        self.read().contains_key(lang)
    }

    /// Remove one language; returns whether it was cached
    pub fn evict(&self, lang: &str) -> bool {
        let removed = self.write().remove(lang).is_some();
        if removed {
            debug!(lang, "Evicted cached translation");
        }
        removed
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    /// Cached language codes, sorted
    pub fn languages(&self) -> Vec<String> {
        let mut langs: Vec<String> = self.read().keys().cloned().collect();
        langs.sort();
        langs
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
