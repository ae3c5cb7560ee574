//! Persistence of answered questions.

use anyhow::Result;
use async_trait::async_trait;

use tenancy_counsel_core::models::Citation;

use crate::prompts::Role;

/// One question and the answer delivered for it.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub user_id: String,
    pub role: Role,
    pub question: String,
    pub answer: String,
    pub citations: Vec<Citation>,
    /// The completion stream failed after some text was delivered.
    pub partial: bool,
}

#[async_trait]
pub trait TranscriptStore: Send + Sync {
    /// Store an exchange and return its id.
    async fn record_exchange(&self, exchange: &Exchange) -> Result<String>;
}
