use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use super::model::Quality;

/// Qualities each loaded source adapter declares it can serve.
///
/// Written by the host when adapters are (re)loaded; the resolver only reads it.
#[derive(Debug, Default)]
pub struct CapabilityTable {
    sources: RwLock<HashMap<String, Vec<Quality>>>,
}

impl CapabilityTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, Vec<Quality>)>,
        S: Into<String>,
    {
        let table = Self::new();
        for (source, qualities) in entries {
            table.set_source(source, qualities);
        }
        table
    }

    pub fn set_source(&self, source: impl Into<String>, qualities: Vec<Quality>) {
        let mut g = self.sources.write().unwrap_or_else(PoisonError::into_inner);
        g.insert(source.into(), qualities);
    }

    pub fn remove_source(&self, source: &str) {
        let mut g = self.sources.write().unwrap_or_else(PoisonError::into_inner);
        g.remove(source);
    }

    pub fn qualities(&self, source: &str) -> Option<Vec<Quality>> {
        let g = self.sources.read().unwrap_or_else(PoisonError::into_inner);
        g.get(source).cloned()
    }

    /// Whether an adapter for `source` is currently loaded.
    pub fn is_supported(&self, source: &str) -> bool {
        let g = self.sources.read().unwrap_or_else(PoisonError::into_inner);
        g.contains_key(source)
    }

    pub fn supports(&self, source: &str, quality: Quality) -> bool {
        let g = self.sources.read().unwrap_or_else(PoisonError::into_inner);
        g.get(source).is_some_and(|list| list.contains(&quality))
    }

    pub fn clear(&self) {
        let mut g = self.sources.write().unwrap_or_else(PoisonError::into_inner);
        g.clear();
    }
}
