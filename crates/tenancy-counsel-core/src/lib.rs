//! # Tenancy Counsel Core
//!
//! Shared, WASM-safe logic for Tenancy Counsel: knowledge models, text
//! normalization, chunking, important-term extraction, lexical relevance
//! scoring, and context assembly with citation bookkeeping.
//!
//! This crate contains no tokio, sqlx, filesystem I/O, or other
//! native-only dependencies. Storage is reached only through the
//! [`store::KnowledgeStore`] trait.

pub mod chunk;
pub mod legislation;
pub mod models;
pub mod normalize;
pub mod retrieve;
pub mod scoring;
pub mod store;
pub mod terms;
pub mod vocabulary;
