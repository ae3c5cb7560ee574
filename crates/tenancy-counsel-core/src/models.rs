//! Core data models used throughout Tenancy Counsel.
//!
//! These types represent the knowledge sources, chunks, and citations that
//! flow through the ingestion and retrieval pipeline.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::scoring::ScoreBreakdown;

/// Tag identifying which knowledge collection a source belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// A scraped web page.
    #[default]
    Web,
    /// An uploaded PDF whose text was extracted at ingestion time.
    Pdf,
    /// A community forum post (e.g. a subreddit thread).
    Forum,
    /// Hand-authored legislation excerpts, one chunk per section.
    Legislation,
}

impl SourceKind {
    /// Enumeration order used when flattening the corpus.
    pub const ALL: [SourceKind; 4] = [
        SourceKind::Web,
        SourceKind::Pdf,
        SourceKind::Forum,
        SourceKind::Legislation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Web => "web",
            SourceKind::Pdf => "pdf",
            SourceKind::Forum => "forum",
            SourceKind::Legislation => "legislation",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "web" | "url" => Ok(SourceKind::Web),
            "pdf" => Ok(SourceKind::Pdf),
            "forum" | "reddit" => Ok(SourceKind::Forum),
            "legislation" => Ok(SourceKind::Legislation),
            other => anyhow::bail!(
                "Unknown source kind: '{}'. Use web, pdf, forum, or legislation.",
                other
            ),
        }
    }
}

/// Variant-specific attributes of a [`KnowledgeSource`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceDetails {
    Web {
        url: String,
    },
    Pdf {
        file_path: Option<String>,
    },
    Forum {
        url: Option<String>,
        /// Community identifier (subreddit name).
        community: String,
        /// Post timestamp as stored; may be malformed.
        posted_at: Option<String>,
    },
    Legislation,
}

impl SourceDetails {
    pub fn kind(&self) -> SourceKind {
        match self {
            SourceDetails::Web { .. } => SourceKind::Web,
            SourceDetails::Pdf { .. } => SourceKind::Pdf,
            SourceDetails::Forum { .. } => SourceKind::Forum,
            SourceDetails::Legislation => SourceKind::Legislation,
        }
    }
}

/// A distinct knowledge item contributing chunks to the corpus.
///
/// Inactive sources are soft-deleted: they stay in storage but are never
/// returned by [`KnowledgeStore::list_active`](crate::store::KnowledgeStore::list_active).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeSource {
    /// Stable, unique source id.
    pub id: String,
    /// Display name: title, filename, or URL.
    pub name: String,
    pub active: bool,
    /// Full normalized text, `None` until processed.
    pub content: Option<String>,
    /// Ordered chunk sequence.
    pub chunks: Vec<Chunk>,
    pub details: SourceDetails,
}

impl KnowledgeSource {
    pub fn kind(&self) -> SourceKind {
        self.details.kind()
    }

    /// The scoring-relevant projection of this source.
    pub fn provenance(&self) -> Provenance {
        match &self.details {
            SourceDetails::Forum {
                community,
                posted_at,
                ..
            } => Provenance {
                kind: SourceKind::Forum,
                community: Some(community.clone()),
                posted_at: posted_at.clone(),
            },
            other => Provenance {
                kind: other.kind(),
                community: None,
                posted_at: None,
            },
        }
    }
}

/// A bounded contiguous slice of a source's normalized text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Zero-based sequence index within the parent source.
    pub position: i64,
    pub text: String,
    /// Section identifier, set only for legislation excerpts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    /// SHA-256 of `text`.
    pub hash: String,
}

/// Where a chunk came from, as seen by the scorer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Provenance {
    pub kind: SourceKind,
    pub community: Option<String>,
    pub posted_at: Option<String>,
}

/// A chunk annotated with its source and a relevance score.
///
/// Built fresh for each retrieval call and discarded after selection.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub source_id: String,
    pub kind: SourceKind,
    pub source_name: String,
    pub community: Option<String>,
    pub section: Option<String>,
    pub text: String,
    pub score: f64,
    pub breakdown: ScoreBreakdown,
}

/// A query-local, rank-ordered reference back to a source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Citation {
    /// 1-based rank within this response.
    pub id: usize,
    pub source_id: String,
    pub source_type: SourceKind,
    pub source_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub community: Option<String>,
    /// Scoring breakdown (populated when explain is requested).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explain: Option<ScoreBreakdown>,
}
