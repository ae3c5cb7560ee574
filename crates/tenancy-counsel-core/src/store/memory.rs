//! In-memory [`KnowledgeStore`] implementation for testing and WASM targets.
//!
//! Sources are kept in insertion order in a `Vec` behind
//! `std::sync::RwLock`, so listing is stable across calls.

use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{KnowledgeSource, SourceKind};

use super::KnowledgeStore;

/// In-memory store for testing and WASM environments.
#[derive(Default)]
pub struct InMemoryStore {
    sources: RwLock<Vec<KnowledgeSource>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-populated with `sources`.
    pub fn with_sources(sources: Vec<KnowledgeSource>) -> Self {
        Self {
            sources: RwLock::new(sources),
        }
    }
}

#[async_trait]
impl KnowledgeStore for InMemoryStore {
    async fn list_active(&self, kind: SourceKind) -> Result<Vec<KnowledgeSource>> {
        let sources = self.sources.read().unwrap_or_else(|e| e.into_inner());
        Ok(sources
            .iter()
            .filter(|s| s.active && s.kind() == kind)
            .map(|s| {
                let mut s = s.clone();
                s.chunks.sort_by_key(|c| c.position);
                s
            })
            .collect())
    }

    async fn upsert_source(&self, source: &KnowledgeSource) -> Result<String> {
        let mut sources = self.sources.write().unwrap_or_else(|e| e.into_inner());
        match sources.iter_mut().find(|s| s.id == source.id) {
            Some(existing) => *existing = source.clone(),
            None => sources.push(source.clone()),
        }
        Ok(source.id.clone())
    }

    async fn set_active(&self, source_id: &str, active: bool) -> Result<bool> {
        let mut sources = self.sources.write().unwrap_or_else(|e| e.into_inner());
        match sources.iter_mut().find(|s| s.id == source_id) {
            Some(s) => {
                s.active = active;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::chunk_text;
    use crate::models::SourceDetails;
    use futures::executor::block_on;

    fn web(id: &str, text: &str) -> KnowledgeSource {
        KnowledgeSource {
            id: id.to_string(),
            name: format!("https://example.com/{}", id),
            active: true,
            content: Some(text.to_string()),
            chunks: chunk_text(text, 1000),
            details: SourceDetails::Web {
                url: format!("https://example.com/{}", id),
            },
        }
    }

    #[test]
    fn test_list_active_filters_kind_and_flag() {
        let store = InMemoryStore::with_sources(vec![web("a", "alpha"), web("b", "beta")]);
        block_on(store.set_active("b", false)).unwrap();

        let web_sources = block_on(store.list_active(SourceKind::Web)).unwrap();
        assert_eq!(web_sources.len(), 1);
        assert_eq!(web_sources[0].id, "a");
        assert!(block_on(store.list_active(SourceKind::Pdf)).unwrap().is_empty());
    }

    #[test]
    fn test_upsert_replaces_in_place() {
        let store = InMemoryStore::new();
        block_on(store.upsert_source(&web("a", "first"))).unwrap();
        block_on(store.upsert_source(&web("b", "second"))).unwrap();
        block_on(store.upsert_source(&web("a", "updated"))).unwrap();

        let listed = block_on(store.list_active(SourceKind::Web)).unwrap();
        let ids: Vec<&str> = listed.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(listed[0].chunks[0].text, "updated");
    }

    #[test]
    fn test_set_active_missing_source() {
        let store = InMemoryStore::new();
        assert!(!block_on(store.set_active("nope", false)).unwrap());
    }
}
