//! Typed errors at the chat boundary.
//!
//! Plumbing code (config, database, ingestion, CLI) returns
//! `anyhow::Result`. The chat orchestrator distinguishes the outcomes a
//! caller must tell apart, and the HTTP layer maps each one to a status and
//! a machine-readable code.
//!
//! | Variant | Status | Code |
//! |---------|--------|------|
//! | [`QuotaExhausted`](ChatError::QuotaExhausted) | 403 | `no_questions_available` |
//! | [`InvalidRequest`](ChatError::InvalidRequest) | 400 | `bad_request` |
//! | [`Retrieval`](ChatError::Retrieval) | 500 | `retrieval_error` |
//! | [`Completion`](ChatError::Completion) | 502 | `completion_error` |
//! | [`Quota`](ChatError::Quota) | 500 | `internal` |

use axum::http::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// Missing record, no remaining questions, or expired.
    #[error("No questions available: {reason}")]
    QuotaExhausted { reason: String },

    #[error("{0}")]
    InvalidRequest(String),

    #[error("retrieval failed: {0:#}")]
    Retrieval(anyhow::Error),

    #[error("completion failed: {0:#}")]
    Completion(anyhow::Error),

    /// The quota record could not be read.
    #[error("quota lookup failed: {0:#}")]
    Quota(anyhow::Error),
}

impl ChatError {
    pub fn status(&self) -> StatusCode {
        match self {
            ChatError::QuotaExhausted { .. } => StatusCode::FORBIDDEN,
            ChatError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ChatError::Retrieval(_) | ChatError::Quota(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ChatError::Completion(_) => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ChatError::QuotaExhausted { .. } => "no_questions_available",
            ChatError::InvalidRequest(_) => "bad_request",
            ChatError::Retrieval(_) => "retrieval_error",
            ChatError::Completion(_) => "completion_error",
            ChatError::Quota(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_and_code_mapping() {
        let e = ChatError::QuotaExhausted {
            reason: "No credit record found".into(),
        };
        assert_eq!(e.status(), StatusCode::FORBIDDEN);
        assert_eq!(e.code(), "no_questions_available");
        assert_eq!(e.to_string(), "No questions available: No credit record found");

        let e = ChatError::Completion(anyhow::anyhow!("upstream returned 500"));
        assert_eq!(e.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(e.code(), "completion_error");

        let e = ChatError::Retrieval(anyhow::anyhow!("db gone"));
        assert_eq!(e.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(e.to_string().contains("db gone"));
    }
}
