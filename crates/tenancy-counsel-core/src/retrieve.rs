//! Context assembly: retrieve, rank, and cite knowledge chunks.
//!
//! The retriever operates entirely through the [`KnowledgeStore`] trait.
//! The calling application supplies the vocabulary, weights, and tuning
//! parameters in a [`RetrievalRequest`].
//!
//! # Algorithm
//!
//! 1. Read active web, PDF, forum, and legislation sources concurrently,
//!    then append the built-in legislation source if enabled.
//! 2. Flatten every chunk into one candidate list in enumeration order.
//! 3. Re-normalize each candidate; an undecodable chunk becomes a
//!    placeholder but is still scored on provenance.
//! 4. Tokenize the query once and derive the importance vocabulary from
//!    the concatenated corpus (memoized by [`TermCache`]).
//! 5. Score every candidate, drop scores `<= 0`, stable-sort descending.
//! 6. Keep the top N and render `[rank] prefix text` blocks plus citations.
//!
//! An empty corpus or a query with no matches yields an empty context and
//! no citations. A failed store read fails the whole call.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::legislation::builtin_legislation;
use crate::models::{Citation, KnowledgeSource, Provenance, ScoredChunk, SourceKind};
use crate::normalize::try_normalize;
use crate::scoring::{tokenize, Scorer, ScoringWeights};
use crate::store::KnowledgeStore;
use crate::terms::{importance_vocabulary, TermCache, DEFAULT_FREQUENCY_THRESHOLD};
use crate::vocabulary::Vocabulary;

/// Default number of chunks placed in the context.
pub const DEFAULT_TOP_N: usize = 5;

/// Text substituted for a chunk that could not be normalized.
pub const UNPROCESSABLE_PLACEHOLDER: &str = "content could not be processed";

/// Retrieval tuning parameters, decoupled from application config.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalParams {
    /// Maximum chunks selected.
    pub top_n: usize,
    /// Minimum corpus frequency for an extracted important term.
    pub frequency_threshold: usize,
    /// Copy each selected chunk's text into its citation.
    pub include_citation_content: bool,
    /// Append the built-in legislation excerpts to the corpus.
    pub include_builtin_legislation: bool,
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self {
            top_n: DEFAULT_TOP_N,
            frequency_threshold: DEFAULT_FREQUENCY_THRESHOLD,
            include_citation_content: true,
            include_builtin_legislation: true,
        }
    }
}

/// Bundles all inputs for a single retrieval.
#[derive(Clone)]
pub struct RetrievalRequest<'a> {
    pub query: &'a str,
    pub params: RetrievalParams,
    pub vocabulary: &'a Vocabulary,
    pub weights: &'a ScoringWeights,
    /// Memo for the importance vocabulary; `None` recomputes every call.
    pub term_cache: Option<&'a TermCache>,
    /// If true, attach a score breakdown to each citation.
    pub explain: bool,
    /// Reference time for recency boosts.
    pub now: DateTime<Utc>,
}

/// Prompt-ready context plus its citation list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievedContext {
    pub context: String,
    pub citations: Vec<Citation>,
}

impl RetrievedContext {
    pub fn is_empty(&self) -> bool {
        self.citations.is_empty()
    }
}

/// A chunk awaiting scoring, tagged with its source.
struct Candidate<'s> {
    source: &'s KnowledgeSource,
    provenance: Provenance,
    section: Option<String>,
    text: String,
}

/// Retrieve the top-N chunks for `req.query` and assemble the context.
pub async fn retrieve<S>(store: &S, req: &RetrievalRequest<'_>) -> Result<RetrievedContext>
where
    S: KnowledgeStore + ?Sized,
{
    if req.query.trim().is_empty() {
        return Ok(RetrievedContext::default());
    }

    let (web, pdf, forum, legislation) = futures::try_join!(
        store.list_active(SourceKind::Web),
        store.list_active(SourceKind::Pdf),
        store.list_active(SourceKind::Forum),
        store.list_active(SourceKind::Legislation),
    )?;

    let mut sources: Vec<KnowledgeSource> = web;
    sources.extend(pdf);
    sources.extend(forum);
    sources.extend(legislation);
    if req.params.include_builtin_legislation {
        sources.push(builtin_legislation());
    }

    let candidates = collect_candidates(&sources);
    tracing::debug!(
        sources = sources.len(),
        candidates = candidates.len(),
        "loaded knowledge corpus"
    );
    if candidates.is_empty() {
        return Ok(RetrievedContext::default());
    }

    let corpus = candidates
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    let threshold = req.params.frequency_threshold;
    let important: Arc<HashSet<String>> = match req.term_cache {
        Some(cache) => cache.get_or_compute(&corpus, req.vocabulary, threshold),
        None => Arc::new(importance_vocabulary(&corpus, req.vocabulary, threshold)),
    };

    let scorer = Scorer::new(req.vocabulary, req.weights, &important, req.now);
    let query_tokens = tokenize(req.query);

    let mut scored: Vec<ScoredChunk> = candidates
        .into_iter()
        .filter_map(|c| {
            let breakdown = scorer.explain(&tokenize(&c.text), &query_tokens, &c.provenance);
            if breakdown.total <= 0.0 {
                return None;
            }
            Some(ScoredChunk {
                source_id: c.source.id.clone(),
                kind: c.provenance.kind,
                source_name: c.source.name.clone(),
                community: c.provenance.community,
                section: c.section,
                text: c.text,
                score: breakdown.total,
                breakdown,
            })
        })
        .collect();

    // Stable: equal scores keep enumeration order.
    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(req.params.top_n);

    tracing::debug!(selected = scored.len(), "ranked knowledge chunks");

    Ok(RetrievedContext {
        context: render_context(&scored),
        citations: build_citations(&scored, req.params.include_citation_content, req.explain),
    })
}

fn collect_candidates(sources: &[KnowledgeSource]) -> Vec<Candidate<'_>> {
    let mut candidates = Vec::new();
    for source in sources {
        let provenance = source.provenance();
        for chunk in &source.chunks {
            let text = match try_normalize(&chunk.text) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(
                        source_id = %source.id,
                        position = chunk.position,
                        error = %e,
                        "chunk could not be processed; using placeholder"
                    );
                    UNPROCESSABLE_PLACEHOLDER.to_string()
                }
            };
            candidates.push(Candidate {
                source,
                provenance: provenance.clone(),
                section: chunk.section.clone(),
                text,
            });
        }
    }
    candidates
}

/// Provenance prefix placed before a chunk's text in the context.
fn provenance_prefix(chunk: &ScoredChunk) -> String {
    match (chunk.kind, &chunk.community, &chunk.section) {
        (SourceKind::Forum, Some(community), _) => format!("(From community/{}): ", community),
        (SourceKind::Legislation, _, Some(section)) => format!("(Section {}): ", section),
        _ => String::new(),
    }
}

/// Render ranked chunks as `[rank] prefix text`, separated by blank lines.
pub fn render_context(chunks: &[ScoredChunk]) -> String {
    chunks
        .iter()
        .enumerate()
        .map(|(i, c)| format!("[{}] {}{}", i + 1, provenance_prefix(c), c.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Build citations `1..=N` in rank order.
pub fn build_citations(chunks: &[ScoredChunk], include_content: bool, explain: bool) -> Vec<Citation> {
    chunks
        .iter()
        .enumerate()
        .map(|(i, c)| Citation {
            id: i + 1,
            source_id: c.source_id.clone(),
            source_type: c.kind,
            source_name: c.source_name.clone(),
            content: include_content.then(|| c.text.clone()),
            section: c.section.clone(),
            community: c.community.clone(),
            explain: explain.then_some(c.breakdown),
        })
        .collect()
}
