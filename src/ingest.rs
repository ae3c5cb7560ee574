//! Ingestion pipeline: extract → normalize → chunk → store.
//!
//! Content and chunks are written together in one upsert, so an active
//! source with content always has at least one chunk. A document whose
//! normalized text is empty is rejected.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use walkdir::WalkDir;

use tenancy_counsel_core::chunk::chunk_text;
use tenancy_counsel_core::models::{KnowledgeSource, SourceDetails, SourceKind};
use tenancy_counsel_core::normalize::normalize;
use tenancy_counsel_core::scoring::parse_post_date;
use tenancy_counsel_core::store::KnowledgeStore;

use crate::config::Config;
use crate::db;
use crate::extract::{content_type_for_path, extract_text};
use crate::sqlite_store::SqliteStore;

/// A document ready to be processed into a source.
#[derive(Debug, Clone)]
pub struct IngestRequest {
    /// Reuse an id to replace an existing source; `None` assigns a UUID.
    pub id: Option<String>,
    pub name: String,
    pub details: SourceDetails,
    /// Extracted, not yet normalized, text.
    pub text: String,
    /// Section identifier stamped on every chunk (legislation only).
    pub section: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IngestOutcome {
    pub id: String,
    pub chunks: usize,
}

/// Body stored for a forum post.
pub fn forum_body(title: &str, content: &str) -> String {
    format!("Title: {}\n\nContent: {}", title, content)
}

pub async fn ingest_document<S>(
    store: &S,
    req: IngestRequest,
    max_chars: usize,
) -> Result<IngestOutcome>
where
    S: KnowledgeStore + ?Sized,
{
    let content = normalize(&req.text);
    if content.is_empty() {
        bail!("'{}' has no text after normalization", req.name);
    }

    let section = match req.details {
        SourceDetails::Legislation => req.section,
        _ => None,
    };
    let mut chunks = chunk_text(&content, max_chars);
    for chunk in &mut chunks {
        chunk.section = section.clone();
    }

    let source = KnowledgeSource {
        id: req
            .id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        name: req.name,
        active: true,
        content: Some(content),
        chunks,
        details: req.details,
    };

    let id = store.upsert_source(&source).await?;
    tracing::info!(
        source_id = %id,
        kind = %source.kind(),
        chunks = source.chunks.len(),
        "ingested source"
    );

    Ok(IngestOutcome {
        id,
        chunks: source.chunks.len(),
    })
}

/// Soft-delete a source. Fails if it does not exist.
pub async fn deactivate<S>(store: &S, source_id: &str) -> Result<()>
where
    S: KnowledgeStore + ?Sized,
{
    if !store.set_active(source_id, false).await? {
        bail!("No source with id '{}'", source_id);
    }
    tracing::info!(source_id, "deactivated source");
    Ok(())
}

/// Options for `counsel ingest`.
#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    pub kind: SourceKind,
    pub id: Option<String>,
    pub name: Option<String>,
    pub url: Option<String>,
    pub community: Option<String>,
    pub posted_at: Option<String>,
    pub section: Option<String>,
}

impl IngestOptions {
    fn validate(&self) -> Result<()> {
        if self.kind == SourceKind::Forum && self.community.is_none() {
            bail!("--community is required for forum sources");
        }
        if let Some(ref posted_at) = self.posted_at {
            if parse_post_date(posted_at).is_none() {
                bail!(
                    "Invalid --posted-at '{}'. Use RFC 3339, YYYY-MM-DD, or Unix seconds.",
                    posted_at
                );
            }
        }
        Ok(())
    }
}

/// Collect ingestible files: the path itself, or every supported file
/// under a directory in sorted order.
pub fn collect_files(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        bail!("Path does not exist: {}", path.display());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(path).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file() && content_type_for_path(entry.path()).is_some() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn request_for_file(file: &Path, opts: &IngestOptions, single: bool) -> Result<IngestRequest> {
    let content_type = content_type_for_path(file)
        .with_context(|| format!("Unsupported file type: {}", file.display()))?;
    let bytes =
        std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let extracted = extract_text(&bytes, content_type)
        .with_context(|| format!("Failed to extract {}", file.display()))?;

    let stem = file
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let file_name = file
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let name = match (&opts.name, single) {
        (Some(name), true) => name.clone(),
        _ => file_name,
    };

    let (details, text) = match opts.kind {
        SourceKind::Web => (
            SourceDetails::Web {
                url: match (&opts.url, single) {
                    (Some(url), true) => url.clone(),
                    _ => file.display().to_string(),
                },
            },
            extracted,
        ),
        SourceKind::Pdf => (
            SourceDetails::Pdf {
                file_path: Some(file.display().to_string()),
            },
            extracted,
        ),
        SourceKind::Forum => (
            SourceDetails::Forum {
                url: opts.url.clone(),
                community: opts.community.clone().unwrap_or_default(),
                posted_at: opts.posted_at.clone(),
            },
            forum_body(&name, &extracted),
        ),
        SourceKind::Legislation => (SourceDetails::Legislation, extracted),
    };

    let section = if opts.kind == SourceKind::Legislation {
        match (&opts.section, single) {
            (Some(section), true) => Some(section.clone()),
            _ => Some(stem),
        }
    } else {
        None
    };

    Ok(IngestRequest {
        id: if single { opts.id.clone() } else { None },
        name,
        details,
        text,
        section,
    })
}

/// Entry point for `counsel ingest`.
pub async fn run_ingest(config: &Config, path: &Path, opts: &IngestOptions) -> Result<()> {
    opts.validate()?;
    let files = collect_files(path)?;
    if files.is_empty() {
        println!("No supported files under {}", path.display());
        return Ok(());
    }

    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool);
    let single = files.len() == 1;

    let mut ingested = 0usize;
    let mut chunks_written = 0usize;
    let mut failed = 0usize;
    for file in &files {
        let outcome = match request_for_file(file, opts, single) {
            Ok(req) => ingest_document(&store, req, config.chunking.max_chars).await,
            Err(e) => Err(e),
        };
        match outcome {
            Ok(outcome) => {
                println!("  {} → {} ({} chunks)", file.display(), outcome.id, outcome.chunks);
                ingested += 1;
                chunks_written += outcome.chunks;
            }
            Err(e) => {
                tracing::warn!(file = %file.display(), error = %format!("{:#}", e), "skipped file");
                failed += 1;
            }
        }
    }

    println!("ingest {}", opts.kind);
    println!("  sources: {}", ingested);
    println!("  chunks written: {}", chunks_written);
    if failed > 0 {
        println!("  skipped: {}", failed);
    }

    store.pool().close().await;
    if ingested == 0 {
        bail!("No files were ingested");
    }
    Ok(())
}

/// Entry point for `counsel deactivate`.
pub async fn run_deactivate(config: &Config, source_id: &str) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool);
    deactivate(&store, source_id).await?;
    println!("Deactivated {}", source_id);
    store.pool().close().await;
    Ok(())
}
