//! SQLite-backed store implementations.
//!
//! [`SqliteStore`] implements three traits over one pool:
//! [`KnowledgeStore`] (sources and chunks), [`QuotaStore`] (question
//! credits) and [`TranscriptStore`] (recorded exchanges).

use std::collections::HashMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use tenancy_counsel_core::models::{Chunk, KnowledgeSource, SourceDetails, SourceKind};
use tenancy_counsel_core::store::KnowledgeStore;

use crate::quota::{Quota, QuotaStore};
use crate::transcript::{Exchange, TranscriptStore};

/// SQLite implementation of the storage traits.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Nullable variant columns of `knowledge_sources`.
struct DetailColumns<'a> {
    url: Option<&'a str>,
    file_path: Option<&'a str>,
    community: Option<&'a str>,
    posted_at: Option<&'a str>,
}

fn detail_columns(details: &SourceDetails) -> DetailColumns<'_> {
    match details {
        SourceDetails::Web { url } => DetailColumns {
            url: Some(url),
            file_path: None,
            community: None,
            posted_at: None,
        },
        SourceDetails::Pdf { file_path } => DetailColumns {
            url: None,
            file_path: file_path.as_deref(),
            community: None,
            posted_at: None,
        },
        SourceDetails::Forum {
            url,
            community,
            posted_at,
        } => DetailColumns {
            url: url.as_deref(),
            file_path: None,
            community: Some(community),
            posted_at: posted_at.as_deref(),
        },
        SourceDetails::Legislation => DetailColumns {
            url: None,
            file_path: None,
            community: None,
            posted_at: None,
        },
    }
}

fn details_from_row(kind: SourceKind, row: &sqlx::sqlite::SqliteRow) -> SourceDetails {
    let url: Option<String> = row.get("url");
    match kind {
        SourceKind::Web => SourceDetails::Web {
            url: url.unwrap_or_default(),
        },
        SourceKind::Pdf => SourceDetails::Pdf {
            file_path: row.get("file_path"),
        },
        SourceKind::Forum => SourceDetails::Forum {
            url,
            community: row
                .get::<Option<String>, _>("community")
                .unwrap_or_default(),
            posted_at: row.get("posted_at"),
        },
        SourceKind::Legislation => SourceDetails::Legislation,
    }
}

#[async_trait]
impl KnowledgeStore for SqliteStore {
    async fn list_active(&self, kind: SourceKind) -> Result<Vec<KnowledgeSource>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, url, file_path, community, posted_at, content
            FROM knowledge_sources
            WHERE kind = ? AND is_active = 1
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("Failed to list active {} sources", kind))?;

        let chunk_rows = sqlx::query(
            r#"
            SELECT c.source_id, c.position, c.text, c.section, c.hash
            FROM knowledge_chunks c
            JOIN knowledge_sources s ON s.id = c.source_id
            WHERE s.kind = ? AND s.is_active = 1
            ORDER BY c.source_id, c.position ASC
            "#,
        )
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("Failed to load chunks for {} sources", kind))?;

        let mut chunks_by_source: HashMap<String, Vec<Chunk>> = HashMap::new();
        for row in chunk_rows {
            let source_id: String = row.get("source_id");
            chunks_by_source.entry(source_id).or_default().push(Chunk {
                position: row.get("position"),
                text: row.get("text"),
                section: row.get("section"),
                hash: row.get("hash"),
            });
        }

        Ok(rows
            .iter()
            .map(|row| {
                let id: String = row.get("id");
                KnowledgeSource {
                    chunks: chunks_by_source.remove(&id).unwrap_or_default(),
                    name: row.get("name"),
                    active: true,
                    content: row.get("content"),
                    details: details_from_row(kind, row),
                    id,
                }
            })
            .collect())
    }

    async fn upsert_source(&self, source: &KnowledgeSource) -> Result<String> {
        let now = Utc::now().timestamp();
        let cols = detail_columns(&source.details);
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO knowledge_sources (id, kind, name, url, file_path, community,
                                           posted_at, content, is_active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                kind = excluded.kind,
                name = excluded.name,
                url = excluded.url,
                file_path = excluded.file_path,
                community = excluded.community,
                posted_at = excluded.posted_at,
                content = excluded.content,
                is_active = excluded.is_active,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&source.id)
        .bind(source.kind().as_str())
        .bind(&source.name)
        .bind(cols.url)
        .bind(cols.file_path)
        .bind(cols.community)
        .bind(cols.posted_at)
        .bind(&source.content)
        .bind(source.active)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM knowledge_chunks WHERE source_id = ?")
            .bind(&source.id)
            .execute(&mut *tx)
            .await?;

        for chunk in &source.chunks {
            sqlx::query(
                "INSERT INTO knowledge_chunks (source_id, position, text, section, hash) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&source.id)
            .bind(chunk.position)
            .bind(&chunk.text)
            .bind(&chunk.section)
            .bind(&chunk.hash)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(source.id.clone())
    }

    async fn set_active(&self, source_id: &str, active: bool) -> Result<bool> {
        let result =
            sqlx::query("UPDATE knowledge_sources SET is_active = ?, updated_at = ? WHERE id = ?")
                .bind(active)
                .bind(Utc::now().timestamp())
                .bind(source_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn ts_to_datetime(ts: Option<i64>) -> Option<DateTime<Utc>> {
    ts.and_then(|t| DateTime::from_timestamp(t, 0))
}

#[async_trait]
impl QuotaStore for SqliteStore {
    async fn get_quota(&self, user_id: &str) -> Result<Option<Quota>> {
        let row = sqlx::query(
            "SELECT remaining_questions, expiry_date FROM question_credits WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| Quota {
            remaining: r.get("remaining_questions"),
            expiry: ts_to_datetime(r.get("expiry_date")),
        }))
    }

    async fn decrement_quota(&self, user_id: &str) -> Result<bool> {
        // Single conditional statement; concurrent requests cannot overdraw.
        let result = sqlx::query(
            r#"
            UPDATE question_credits
            SET remaining_questions = remaining_questions - 1, updated_at = ?
            WHERE user_id = ? AND remaining_questions > 0
            "#,
        )
        .bind(Utc::now().timestamp())
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn grant_quota(
        &self,
        user_id: &str,
        questions: i64,
        expiry: Option<DateTime<Utc>>,
    ) -> Result<Quota> {
        sqlx::query(
            r#"
            INSERT INTO question_credits (user_id, remaining_questions, expiry_date, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                remaining_questions = question_credits.remaining_questions + excluded.remaining_questions,
                expiry_date = COALESCE(excluded.expiry_date, question_credits.expiry_date),
                updated_at = excluded.updated_at
            "#,
        )
        .bind(user_id)
        .bind(questions)
        .bind(expiry.map(|e| e.timestamp()))
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        self.get_quota(user_id)
            .await?
            .with_context(|| format!("quota for {} missing after grant", user_id))
    }
}

#[async_trait]
impl TranscriptStore for SqliteStore {
    async fn record_exchange(&self, exchange: &Exchange) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let citations_json = serde_json::to_string(&exchange.citations)?;

        sqlx::query(
            r#"
            INSERT INTO messages (id, user_id, role, question, answer, citations_json, partial, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&exchange.user_id)
        .bind(exchange.role.as_str())
        .bind(&exchange.question)
        .bind(&exchange.answer)
        .bind(&citations_json)
        .bind(exchange.partial)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        Ok(id)
    }
}

