//! CLI handlers for `retrieve`, `credits`, and `chat`.

use std::io::Write;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};

use tenancy_counsel_core::models::Citation;

use crate::chat::{ChatRequest, ChatService, StreamEvent};
use crate::config::Config;
use crate::db;
use crate::prompts::Role;
use crate::quota::{Quota, QuotaStore};
use crate::sqlite_store::SqliteStore;

pub async fn run_retrieve(config: &Config, query: &str, explain: bool, json: bool) -> Result<()> {
    let service = ChatService::from_config(config).await?;
    let retrieved = service.retrieve(query, explain).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&retrieved)?);
        return Ok(());
    }

    if retrieved.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for citation in &retrieved.citations {
        println!(
            "{}. {} / {}",
            citation.id, citation.source_type, citation.source_name
        );
        if let Some(ref section) = citation.section {
            println!("    section: {}", section);
        }
        if let Some(ref community) = citation.community {
            println!("    community: {}", community);
        }
        println!("    source: {}", citation.source_id);
        if let Some(ref content) = citation.content {
            println!("    excerpt: \"{}\"", excerpt(content, 240));
        }
        if let Some(b) = citation.explain {
            println!(
                "    score: {:.2} (provenance {:.2}, phrase {:.2}, overlap {:.2}, related {:.2}, recency {:.2})",
                b.total, b.provenance, b.phrase, b.overlap, b.related_pairs, b.recency
            );
        }
        println!();
    }
    Ok(())
}

fn excerpt(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}...", cut.trim_end())
}

/// Parse `YYYY-MM-DD` as the last second of that day, UTC.
pub fn parse_expiry(raw: &str) -> Result<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}'. Use YYYY-MM-DD.", raw))?;
    date.and_hms_opt(23, 59, 59)
        .map(|dt| dt.and_utc())
        .with_context(|| format!("Invalid date '{}'", raw))
}

fn print_quota(user_id: &str, quota: &Quota) {
    println!("user:      {}", user_id);
    println!("remaining: {}", quota.remaining);
    match quota.expiry {
        Some(e) => println!("expires:   {}", e.format("%Y-%m-%d")),
        None => println!("expires:   never"),
    }
}

pub async fn run_credits_grant(
    config: &Config,
    user_id: &str,
    questions: i64,
    expires: Option<&str>,
) -> Result<()> {
    if questions < 1 {
        bail!("Number of questions must be >= 1");
    }
    let expiry = expires.map(parse_expiry).transpose()?;

    let store = SqliteStore::new(db::connect(config).await?);
    let quota = store.grant_quota(user_id, questions, expiry).await?;
    println!("Granted {} questions.", questions);
    print_quota(user_id, &quota);
    store.pool().close().await;
    Ok(())
}

pub async fn run_credits_show(config: &Config, user_id: &str) -> Result<()> {
    let store = SqliteStore::new(db::connect(config).await?);
    match store.get_quota(user_id).await? {
        Some(quota) => print_quota(user_id, &quota),
        None => println!("No credit record for {}.", user_id),
    }
    store.pool().close().await;
    Ok(())
}

fn print_citations(citations: &[Citation]) {
    if citations.is_empty() {
        return;
    }
    println!();
    println!("Sources:");
    for c in citations {
        let detail = match (&c.section, &c.community) {
            (Some(section), _) => format!(" (section {})", section),
            (None, Some(community)) => format!(" (community/{})", community),
            _ => String::new(),
        };
        println!("  [{}] {}{}", c.id, c.source_name, detail);
    }
}

pub async fn run_chat(
    config: &Config,
    question: &str,
    user_id: &str,
    role: Role,
    stream: bool,
) -> Result<()> {
    let service = ChatService::from_config(config).await?;
    let request = ChatRequest {
        user_id: user_id.to_string(),
        role,
        message: question.to_string(),
        explain: false,
    };

    let (citations, deducted) = if stream {
        let mut chat_stream = service.answer_stream(request).await?;
        let mut stdout = std::io::stdout();
        let mut deducted = false;
        while let Some(event) = chat_stream.events.recv().await {
            match event {
                StreamEvent::Delta(text) => {
                    print!("{}", text);
                    stdout.flush()?;
                }
                StreamEvent::Done { deducted: d } => deducted = d,
                StreamEvent::Error(message) => {
                    println!();
                    bail!(message);
                }
            }
        }
        println!();
        (chat_stream.citations, deducted)
    } else {
        let response = service.answer(request).await?;
        println!("{}", response.response);
        (response.citations, response.deducted)
    };

    print_citations(&citations);
    if !deducted {
        eprintln!("Warning: the question could not be deducted from your credits.");
    }
    Ok(())
}
