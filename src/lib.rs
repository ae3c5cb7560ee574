//! # Tenancy Counsel
//!
//! A BC housing-law question answering service: lexical retrieval over a
//! curated knowledge corpus, quota-gated chat completion, and citations.
//!
//! Ranking lives in the `tenancy-counsel-core` crate; this crate wires it to
//! SQLite, an OpenAI-compatible completion endpoint, an HTTP API, and the
//! `counsel` CLI.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────────┐   ┌──────────┐
//! │  Ingestion  │──▶│ normalize+chunk  │──▶│  SQLite  │
//! │ pdf/web/... │   └──────────────────┘   └────┬─────┘
//! └─────────────┘                               │
//!                     ┌─────────────────────────┤
//!                     ▼                         ▼
//!              ┌─────────────┐          ┌──────────────┐
//!              │  retrieve   │◀─────────│ ChatService  │──▶ completion
//!              │ (core)      │          │ quota+prompt │
//!              └─────────────┘          └──────┬───────┘
//!                                       ┌──────┴──────┐
//!                                       ▼             ▼
//!                                  ┌─────────┐   ┌─────────┐
//!                                  │   CLI   │   │  HTTP   │
//!                                  │(counsel)│   │ JSON/SSE│
//!                                  └─────────┘   └─────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! counsel init
//! counsel ingest ./docs/rta-guide.pdf --kind pdf
//! counsel credits grant alice 10
//! counsel chat "Can my landlord keep my deposit?" --user alice
//! counsel serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite knowledge, quota, and transcript stores |
//! | [`quota`] | Question quota trait and in-memory store |
//! | [`transcript`] | Exchange recording trait |
//! | [`extract`] | PDF, text, and HTML extraction |
//! | [`ingest`] | Ingestion pipeline |
//! | [`prompts`] | Role personas and system prompts |
//! | [`completion`] | Chat-completion client |
//! | [`chat`] | Chat orchestrator |
//! | [`error`] | Chat error taxonomy |
//! | [`server`] | HTTP server |
//! | [`commands`] | CLI handlers |

pub mod chat;
pub mod commands;
pub mod completion;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod ingest;
pub mod migrate;
pub mod prompts;
pub mod quota;
pub mod server;
pub mod sqlite_store;
pub mod transcript;
