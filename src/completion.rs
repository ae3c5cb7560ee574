//! Chat-completion client.
//!
//! [`CompletionClient`] is the seam between the orchestrator and the
//! language model. [`OpenAiCompletion`] talks to any OpenAI-compatible
//! `chat/completions` endpoint, either returning the whole answer or
//! forwarding content deltas into a channel as server-sent events arrive.
//!
//! `timeout_secs` bounds a whole-response request end to end. A streamed
//! request is instead bounded per read: the endpoint must answer and then
//! keep sending within that window, however long the full answer takes.
//! A stream that closes before `data: [DONE]` is an error, so a truncated
//! answer is never treated as complete.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::config::CompletionConfig;

/// What the model is asked.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_message: String,
}

/// How a streamed completion ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    /// The upstream sent `data: [DONE]`.
    Finished,
    /// The receiver was dropped; consumption stopped early.
    Abandoned,
}

#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Return the full response text.
    async fn complete(&self, req: &CompletionRequest) -> Result<String>;

    /// Send content deltas to `tx` as they arrive.
    async fn stream(
        &self,
        req: &CompletionRequest,
        tx: mpsc::Sender<String>,
    ) -> Result<StreamOutcome>;
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatBody<'a> {
    model: &'a str,
    messages: [Message<'a>; 2],
    stream: bool,
}

/// OpenAI-compatible completion client.
pub struct OpenAiCompletion {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    api_key_env: String,
    timeout: Duration,
}

impl OpenAiCompletion {
    /// Build from config, reading the API key from the configured
    /// environment variable. A missing key fails at request time.
    pub fn from_config(config: &CompletionConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.is_empty());
        Self::new(config, api_key)
    }

    pub fn new(config: &CompletionConfig, api_key: Option<String>) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key,
            api_key_env: config.api_key_env.clone(),
            timeout,
        })
    }

    async fn send(&self, req: &CompletionRequest, stream: bool) -> Result<reqwest::Response> {
        let api_key = self
            .api_key
            .as_deref()
            .with_context(|| format!("{} is not set", self.api_key_env))?;

        let body = ChatBody {
            model: &self.model,
            messages: [
                Message {
                    role: "system",
                    content: &req.system_prompt,
                },
                Message {
                    role: "user",
                    content: &req.user_message,
                },
            ],
            stream,
        };

        let request = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&body);

        // Streams are bounded per read in `stream`, not end to end.
        let sent = if stream {
            match tokio::time::timeout(self.timeout, request.send()).await {
                Ok(sent) => sent,
                Err(_) => bail!(
                    "Completion endpoint did not respond within {}s",
                    self.timeout.as_secs()
                ),
            }
        } else {
            request.timeout(self.timeout).send().await
        };
        let resp = sent.with_context(|| format!("Completion request to {} failed", self.endpoint))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            bail!("Completion endpoint returned {}: {}", status, text);
        }
        Ok(resp)
    }
}

#[async_trait]
impl CompletionClient for OpenAiCompletion {
    async fn complete(&self, req: &CompletionRequest) -> Result<String> {
        let resp = self.send(req, false).await?;
        let json: serde_json::Value = resp
            .json()
            .await
            .context("Completion response was not JSON")?;
        json["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .context("Completion response had no message content")
    }

    async fn stream(
        &self,
        req: &CompletionRequest,
        tx: mpsc::Sender<String>,
    ) -> Result<StreamOutcome> {
        let resp = self.send(req, true).await?;
        let mut bytes = resp.bytes_stream();
        let mut buf: Vec<u8> = Vec::new();

        loop {
            let next = tokio::time::timeout(self.timeout, bytes.next())
                .await
                .map_err(|_| {
                    anyhow!(
                        "Completion stream stalled for {}s",
                        self.timeout.as_secs()
                    )
                })?;
            let Some(chunk) = next else {
                break;
            };
            let chunk = chunk.context("Completion stream interrupted")?;
            buf.extend_from_slice(&chunk);

            while let Some(newline) = buf.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buf.drain(..=newline).collect();
                if let Some(outcome) = forward_line(&line, &tx).await? {
                    return Ok(outcome);
                }
            }
        }

        // A final line may arrive without its newline.
        if let Some(outcome) = forward_line(&buf, &tx).await? {
            return Ok(outcome);
        }
        bail!("Completion stream ended before [DONE]")
    }
}

/// Forward one raw SSE line. Returns the outcome once the stream is over.
async fn forward_line(line: &[u8], tx: &mpsc::Sender<String>) -> Result<Option<StreamOutcome>> {
    match parse_sse_line(&String::from_utf8_lossy(line))? {
        SseLine::Delta(text) => {
            if tx.send(text).await.is_err() {
                return Ok(Some(StreamOutcome::Abandoned));
            }
            Ok(None)
        }
        SseLine::Done => Ok(Some(StreamOutcome::Finished)),
        SseLine::Skip => Ok(None),
    }
}

/// One parsed server-sent event line.
#[derive(Debug, PartialEq)]
enum SseLine {
    Delta(String),
    Done,
    Skip,
}

fn parse_sse_line(line: &str) -> Result<SseLine> {
    let line = line.trim();
    let Some(data) = line.strip_prefix("data:") else {
        return Ok(SseLine::Skip);
    };
    let data = data.trim_start();
    if data == "[DONE]" {
        return Ok(SseLine::Done);
    }
    let json: serde_json::Value =
        serde_json::from_str(data).context("Malformed completion stream event")?;
    if let Some(message) = json["error"]["message"].as_str() {
        bail!("Completion stream error: {}", message);
    }
    match json["choices"][0]["delta"]["content"].as_str() {
        Some(content) if !content.is_empty() => Ok(SseLine::Delta(content.to_string())),
        _ => Ok(SseLine::Skip),
    }
}
