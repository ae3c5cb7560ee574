//! Greedy word-packing text chunker.
//!
//! Splits normalized source text into [`Chunk`]s of at most `max_chars`
//! characters. Boundaries always fall on whitespace, so a word is never
//! split; a single word longer than `max_chars` becomes its own chunk.
//!
//! Each chunk carries a SHA-256 hash of its text, persisted alongside it
//! as a content fingerprint.
//!
//! # Algorithm
//!
//! 1. Split the text on whitespace.
//! 2. Append words to a running buffer, separated by one space.
//! 3. When the next word plus its separator would exceed `max_chars`, flush
//!    the buffer as a chunk and start a new one with that word.
//! 4. Flush the remaining buffer. Empty input yields no chunks.
//!
//! # Example
//!
//! ```rust
//! use tenancy_counsel_core::chunk::chunk_text;
//!
//! let chunks = chunk_text("Notice of rent increase.", 1000);
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].position, 0);
//! ```

use sha2::{Digest, Sha256};

use crate::models::Chunk;

/// Default chunk size in characters.
pub const DEFAULT_MAX_CHARS: usize = 1000;

/// Split text into whitespace-bounded chunks of at most `max_chars` characters.
///
/// Positions are contiguous: `0, 1, 2, …, N-1`. Joining the chunk texts
/// with single spaces reproduces the whitespace-collapsed input.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        if current.is_empty() {
            current.push_str(word);
            current_len = word_len;
        } else if current_len + 1 + word_len <= max_chars {
            current.push(' ');
            current.push_str(word);
            current_len += 1 + word_len;
        } else {
            chunks.push(make_chunk(chunks.len() as i64, &current));
            current.clear();
            current.push_str(word);
            current_len = word_len;
        }
    }

    if !current.is_empty() {
        chunks.push(make_chunk(chunks.len() as i64, &current));
    }

    chunks
}

/// SHA-256 hex digest of a chunk's text.
pub fn hash_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Create a single [`Chunk`] with its content hash.
pub fn make_chunk(position: i64, text: &str) -> Chunk {
    Chunk {
        position,
        text: text.to_string(),
        section: None,
        hash: hash_text(text),
    }
}
