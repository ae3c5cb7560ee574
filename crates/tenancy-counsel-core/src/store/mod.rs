//! Storage abstraction for the knowledge corpus.
//!
//! The [`KnowledgeStore`] trait is the only way the retriever reaches
//! stored sources, enabling pluggable backends (SQLite in the app crate,
//! in-memory here).
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{KnowledgeSource, SourceKind};

/// Abstract storage backend for knowledge sources.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`list_active`](KnowledgeStore::list_active) | Active sources of one kind, chunks in order |
/// | [`upsert_source`](KnowledgeStore::upsert_source) | Insert or replace a source and its chunks |
/// | [`set_active`](KnowledgeStore::set_active) | Soft-delete or restore a source |
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// List every active source of `kind`, each with its chunks ordered by
    /// position. Sources are returned in a stable order.
    async fn list_active(&self, kind: SourceKind) -> Result<Vec<KnowledgeSource>>;

    /// Insert or replace a source, including its full chunk sequence.
    ///
    /// Returns the source id.
    async fn upsert_source(&self, source: &KnowledgeSource) -> Result<String>;

    /// Set the active flag. Returns `false` if no such source exists.
    async fn set_active(&self, source_id: &str, active: bool) -> Result<bool>;
}
