//! JSON and server-sent-events HTTP API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/retrieve` | Ranked context and citations for a query |
//! | `POST` | `/chat` | Quota-gated answer with citations |
//! | `POST` | `/chat/stream` | Same, streamed as server-sent events |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "no_questions_available", "message": "No questions available: No credit record found" } }
//! ```
//!
//! Error codes: `bad_request` (400), `no_questions_available` (403),
//! `retrieval_error` (500), `internal` (500), `completion_error` (502).
//!
//! # Streaming
//!
//! `POST /chat/stream` sends one `citations` event, then `delta` events
//! carrying text, then exactly one `done` (`{"deducted": bool}`) or
//! `error` (`{"message": ..}`) event, after which the stream closes.
//! Quota and retrieval failures are returned as ordinary JSON errors
//! before the stream opens.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted for browser clients.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures::{stream, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::{Any, CorsLayer};

use tenancy_counsel_core::retrieve::RetrievedContext;

use crate::chat::{ChatRequest, ChatResponse, ChatService, StreamEvent};
use crate::config::Config;
use crate::error::ChatError;

#[derive(Clone)]
struct AppState {
    chat: Arc<ChatService>,
}

/// The API router over an existing service.
pub fn router(chat: Arc<ChatService>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/retrieve", post(handle_retrieve))
        .route("/chat", post(handle_chat))
        .route("/chat/stream", post(handle_chat_stream))
        .layer(cors)
        .with_state(AppState { chat })
}

/// Binds to `[server].bind` and serves until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let chat = Arc::new(ChatService::from_config(config).await?);
    let app = router(chat);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(bind = %config.server.bind, "server listening");
    println!("Listening on http://{}", config.server.bind);
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<ChatError> for AppError {
    fn from(err: ChatError) -> Self {
        if err.status().is_server_error() {
            tracing::error!(code = err.code(), error = %err, "request failed");
        }
        AppError {
            status: err.status(),
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /retrieve ============

#[derive(Deserialize)]
struct RetrieveBody {
    query: String,
    #[serde(default)]
    explain: bool,
}

async fn handle_retrieve(
    State(state): State<AppState>,
    Json(body): Json<RetrieveBody>,
) -> Result<Json<RetrievedContext>, AppError> {
    if body.query.trim().is_empty() {
        return Err(ChatError::InvalidRequest("query must not be empty".into()).into());
    }
    let retrieved = state
        .chat
        .retrieve(&body.query, body.explain)
        .await
        .map_err(ChatError::Retrieval)?;
    Ok(Json(retrieved))
}

// ============ POST /chat ============

async fn handle_chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    Ok(Json(state.chat.answer(request).await?))
}

// ============ POST /chat/stream ============

async fn handle_chat_stream(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let chat_stream = state.chat.answer_stream(request).await?;

    let citations = Event::default()
        .event("citations")
        .json_data(&chat_stream.citations)
        .unwrap_or_else(|_| Event::default().event("citations").data("[]"));

    let events = ReceiverStream::new(chat_stream.events).map(|event| Ok(sse_event(event)));
    let body = stream::once(async move { Ok(citations) }).chain(events);

    Ok(Sse::new(body).keep_alive(KeepAlive::default()))
}

fn sse_event(event: StreamEvent) -> Event {
    match event {
        StreamEvent::Delta(text) => Event::default().event("delta").data(text),
        StreamEvent::Done { deducted } => Event::default()
            .event("done")
            .data(serde_json::json!({ "deducted": deducted }).to_string()),
        StreamEvent::Error(message) => Event::default()
            .event("error")
            .data(serde_json::json!({ "message": message }).to_string()),
    }
}
