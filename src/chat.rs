//! Chat orchestrator.
//!
//! Each question runs `CheckQuota → Retrieve → BuildPrompt →
//! CallCompletion → PersistAndDeduct → Respond`:
//!
//! - A missing, empty, or expired quota fails with
//!   [`ChatError::QuotaExhausted`] before retrieval is attempted.
//! - Quota is deducted only after the completion finished cleanly. A failed
//!   deduction is logged and reported as `deducted: false`; the answer is
//!   still returned.
//! - The streaming variant runs quota and retrieval up front, so their
//!   failures are ordinary errors. Once the stream is open, the producer
//!   sends exactly one terminal event ([`StreamEvent::Done`] or
//!   [`StreamEvent::Error`]) and then closes the channel. If the caller
//!   drops the receiver, the upstream is abandoned and nothing is recorded
//!   or deducted.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use tenancy_counsel_core::models::Citation;
use tenancy_counsel_core::retrieve::{retrieve, RetrievalParams, RetrievalRequest, RetrievedContext};
use tenancy_counsel_core::scoring::ScoringWeights;
use tenancy_counsel_core::store::KnowledgeStore;
use tenancy_counsel_core::terms::TermCache;
use tenancy_counsel_core::vocabulary::Vocabulary;

use crate::completion::{CompletionClient, CompletionRequest, OpenAiCompletion, StreamOutcome};
use crate::config::Config;
use crate::db;
use crate::error::ChatError;
use crate::prompts::{build_system_prompt, Role};
use crate::quota::QuotaStore;
use crate::sqlite_store::SqliteStore;
use crate::transcript::{Exchange, TranscriptStore};

/// Buffered deltas between the upstream reader and the caller.
const STREAM_BUFFER: usize = 32;

/// Retrieval configuration shared by every request.
#[derive(Debug, Clone, Default)]
pub struct RetrievalSettings {
    pub params: RetrievalParams,
    pub vocabulary: Vocabulary,
    pub weights: ScoringWeights,
    pub cache_terms: bool,
}

impl RetrievalSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            params: config.retrieval.params(),
            vocabulary: config.vocabulary.clone(),
            weights: config.scoring.clone(),
            cache_terms: config.retrieval.cache_terms,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub user_id: String,
    #[serde(default)]
    pub role: Role,
    pub message: String,
    #[serde(default)]
    pub explain: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub response: String,
    pub citations: Vec<Citation>,
    /// False when the quota decrement failed after answering.
    pub deducted: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Delta(String),
    Done { deducted: bool },
    Error(String),
}

/// An open answer stream. Citations are known before the first delta.
pub struct ChatStream {
    pub citations: Vec<Citation>,
    pub events: mpsc::Receiver<StreamEvent>,
}

/// Everything prepared before the completion call.
struct Prepared {
    request: ChatRequest,
    retrieved: RetrievedContext,
    completion: CompletionRequest,
}

/// Request-scoped orchestration over injected stores and completion client.
#[derive(Clone)]
pub struct ChatService {
    knowledge: Arc<dyn KnowledgeStore>,
    quota: Arc<dyn QuotaStore>,
    transcript: Arc<dyn TranscriptStore>,
    completion: Arc<dyn CompletionClient>,
    settings: Arc<RetrievalSettings>,
    term_cache: Arc<TermCache>,
}

impl ChatService {
    pub fn new(
        knowledge: Arc<dyn KnowledgeStore>,
        quota: Arc<dyn QuotaStore>,
        transcript: Arc<dyn TranscriptStore>,
        completion: Arc<dyn CompletionClient>,
        settings: RetrievalSettings,
    ) -> Self {
        Self {
            knowledge,
            quota,
            transcript,
            completion,
            settings: Arc::new(settings),
            term_cache: Arc::new(TermCache::new()),
        }
    }

    /// Service over the configured SQLite database and completion endpoint.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let pool = db::connect(config).await?;
        let store = Arc::new(SqliteStore::new(pool));
        let completion = Arc::new(OpenAiCompletion::from_config(&config.completion)?);
        Ok(Self::new(
            store.clone(),
            store.clone(),
            store,
            completion,
            RetrievalSettings::from_config(config),
        ))
    }

    /// Rank the corpus for `query` without touching quota.
    pub async fn retrieve(&self, query: &str, explain: bool) -> anyhow::Result<RetrievedContext> {
        let settings = &self.settings;
        let req = RetrievalRequest {
            query,
            params: settings.params.clone(),
            vocabulary: &settings.vocabulary,
            weights: &settings.weights,
            term_cache: settings.cache_terms.then_some(self.term_cache.as_ref()),
            explain,
            now: Utc::now(),
        };
        retrieve(self.knowledge.as_ref(), &req).await
    }

    /// Answer a question with the whole response at once.
    pub async fn answer(&self, request: ChatRequest) -> Result<ChatResponse, ChatError> {
        let prepared = self.prepare(request).await?;

        let response = self
            .completion
            .complete(&prepared.completion)
            .await
            .map_err(ChatError::Completion)?;

        let deducted = self
            .finish(&prepared.request, &response, &prepared.retrieved.citations, false)
            .await;

        Ok(ChatResponse {
            response,
            citations: prepared.retrieved.citations,
            deducted,
        })
    }

    /// Answer a question, forwarding the response incrementally.
    pub async fn answer_stream(&self, request: ChatRequest) -> Result<ChatStream, ChatError> {
        let prepared = self.prepare(request).await?;
        let citations = prepared.retrieved.citations.clone();

        let (event_tx, event_rx) = mpsc::channel(STREAM_BUFFER);
        let service = self.clone();
        tokio::spawn(async move {
            service.produce(prepared, event_tx).await;
        });

        Ok(ChatStream {
            citations,
            events: event_rx,
        })
    }

    async fn prepare(&self, request: ChatRequest) -> Result<Prepared, ChatError> {
        if request.user_id.trim().is_empty() {
            return Err(ChatError::InvalidRequest("userId must not be empty".into()));
        }
        if request.message.trim().is_empty() {
            return Err(ChatError::InvalidRequest("message must not be empty".into()));
        }

        self.check_quota(&request.user_id).await?;

        let retrieved = self
            .retrieve(&request.message, request.explain)
            .await
            .map_err(ChatError::Retrieval)?;
        tracing::debug!(
            user_id = %request.user_id,
            citations = retrieved.citations.len(),
            "assembled context"
        );

        let completion = CompletionRequest {
            system_prompt: build_system_prompt(request.role, &retrieved.context),
            user_message: request.message.clone(),
        };

        Ok(Prepared {
            request,
            retrieved,
            completion,
        })
    }

    async fn check_quota(&self, user_id: &str) -> Result<(), ChatError> {
        let quota = self
            .quota
            .get_quota(user_id)
            .await
            .map_err(ChatError::Quota)?;

        let reason = match quota {
            None => Some("No credit record found"),
            Some(q) => q.unavailable_reason(Utc::now()),
        };
        match reason {
            Some(reason) => {
                tracing::info!(user_id, reason, "question refused");
                Err(ChatError::QuotaExhausted {
                    reason: reason.to_string(),
                })
            }
            None => Ok(()),
        }
    }

    /// Record the exchange, then deduct unless it was partial.
    ///
    /// Returns whether a question was deducted.
    async fn finish(
        &self,
        request: &ChatRequest,
        answer: &str,
        citations: &[Citation],
        partial: bool,
    ) -> bool {
        let exchange = Exchange {
            user_id: request.user_id.clone(),
            role: request.role,
            question: request.message.clone(),
            answer: answer.to_string(),
            citations: citations.to_vec(),
            partial,
        };
        if let Err(e) = self.transcript.record_exchange(&exchange).await {
            tracing::error!(user_id = %request.user_id, error = %format!("{:#}", e), "failed to record exchange");
        }

        if partial {
            return false;
        }

        match self.quota.decrement_quota(&request.user_id).await {
            Ok(true) => true,
            Ok(false) => {
                tracing::warn!(user_id = %request.user_id, "quota already exhausted at deduction");
                false
            }
            Err(e) => {
                tracing::error!(user_id = %request.user_id, error = %format!("{:#}", e), "quota deduction failed");
                false
            }
        }
    }

    async fn produce(&self, prepared: Prepared, events: mpsc::Sender<StreamEvent>) {
        let (delta_tx, mut delta_rx) = mpsc::channel::<String>(STREAM_BUFFER);

        let upstream = self.completion.stream(&prepared.completion, delta_tx);
        let sink = &events;
        let forward = async move {
            let mut answer = String::new();
            while let Some(delta) = delta_rx.recv().await {
                answer.push_str(&delta);
                if sink.send(StreamEvent::Delta(delta)).await.is_err() {
                    // Dropping the receiver makes the upstream's next send fail.
                    return (answer, true);
                }
            }
            (answer, false)
        };

        let (outcome, (answer, caller_gone)) = tokio::join!(upstream, forward);
        let request = &prepared.request;

        if caller_gone || events.is_closed() {
            tracing::info!(user_id = %request.user_id, "caller disconnected; abandoning answer");
            return;
        }

        let terminal = match outcome {
            Ok(StreamOutcome::Finished) => {
                let deducted = self
                    .finish(request, &answer, &prepared.retrieved.citations, false)
                    .await;
                StreamEvent::Done { deducted }
            }
            Ok(StreamOutcome::Abandoned) => {
                tracing::warn!(user_id = %request.user_id, "completion stream abandoned");
                StreamEvent::Error("completion stream ended early".to_string())
            }
            Err(e) => {
                let message = ChatError::Completion(e).to_string();
                tracing::error!(user_id = %request.user_id, error = %message, "completion stream failed");
                if !answer.is_empty() {
                    self.finish(request, &answer, &prepared.retrieved.citations, true)
                        .await;
                }
                StreamEvent::Error(message)
            }
        };

        // The receiver may have gone between the check and now.
        let _ = events.send(terminal).await;
    }
}
