//! Per-user question quota.
//!
//! The orchestrator reads a [`Quota`] before doing any work and decrements
//! it only after a successful completion. Decrement must be a single
//! conditional operation at the storage layer so concurrent requests from
//! one user cannot lose updates.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// A user's remaining question allowance.
#[derive(Debug, Clone, PartialEq)]
pub struct Quota {
    pub remaining: i64,
    /// `None` never expires.
    pub expiry: Option<DateTime<Utc>>,
}

impl Quota {
    /// Why this quota cannot be spent at `now`, if it cannot.
    pub fn unavailable_reason(&self, now: DateTime<Utc>) -> Option<&'static str> {
        if self.remaining <= 0 {
            Some("No remaining credits")
        } else if self.expiry.is_some_and(|e| e < now) {
            Some("Credits expired")
        } else {
            None
        }
    }
}

#[async_trait]
pub trait QuotaStore: Send + Sync {
    /// The user's quota record, or `None` if there is none.
    async fn get_quota(&self, user_id: &str) -> Result<Option<Quota>>;

    /// Atomically decrement a positive allowance by one.
    ///
    /// Returns `false` when there was nothing to decrement.
    async fn decrement_quota(&self, user_id: &str) -> Result<bool>;

    /// Add `questions` to the user's allowance, creating the record if
    /// needed. A given `expiry` replaces the stored one.
    async fn grant_quota(
        &self,
        user_id: &str,
        questions: i64,
        expiry: Option<DateTime<Utc>>,
    ) -> Result<Quota>;
}

/// Quota store held in process memory.
#[derive(Default)]
pub struct InMemoryQuotaStore {
    quotas: Mutex<HashMap<String, Quota>>,
}

impl InMemoryQuotaStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QuotaStore for InMemoryQuotaStore {
    async fn get_quota(&self, user_id: &str) -> Result<Option<Quota>> {
        let quotas = self.quotas.lock().unwrap_or_else(|e| e.into_inner());
        Ok(quotas.get(user_id).cloned())
    }

    async fn decrement_quota(&self, user_id: &str) -> Result<bool> {
        let mut quotas = self.quotas.lock().unwrap_or_else(|e| e.into_inner());
        match quotas.get_mut(user_id) {
            Some(q) if q.remaining > 0 => {
                q.remaining -= 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn grant_quota(
        &self,
        user_id: &str,
        questions: i64,
        expiry: Option<DateTime<Utc>>,
    ) -> Result<Quota> {
        let mut quotas = self.quotas.lock().unwrap_or_else(|e| e.into_inner());
        let entry = quotas.entry(user_id.to_string()).or_insert(Quota {
            remaining: 0,
            expiry: None,
        });
        entry.remaining += questions;
        if expiry.is_some() {
            entry.expiry = expiry;
        }
        Ok(entry.clone())
    }
}
