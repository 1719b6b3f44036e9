//! Core types and error definitions for docchat.
//!
//! This crate provides the foundational types shared across all docchat crates:
//! the error taxonomy surfaced at the session boundary, conversation turns, and
//! the document/chunk model produced by ingestion.
//!
//! # Main types
//!
//! - [`DocchatError`]: Unified error enum for the RAG pipeline.
//! - [`DocchatResult`]: Convenience alias for `Result<T, DocchatError>`.
//! - [`Role`]: Author of a conversation turn (user, assistant, system).
//! - [`ConversationTurn`]: A single question or answer in a session's history.
//! - [`Document`]: Extracted text of an uploaded file, split into segments.
//! - [`Chunk`]: A contiguous piece of a segment, the unit of retrieval.

/// Documents, segments and chunks.
pub mod document;
/// Conversation roles and turns.
pub mod message;

pub use document::{Chunk, Document, DocumentFormat, Segment};
pub use message::{ConversationTurn, Role};

use uuid::Uuid;

// --- Error types ---

/// Top-level error type for the docchat pipeline.
///
/// Every failure inside chunking, embedding, indexing or completion is
/// converted into one of these kinds before it leaves a session.
#[derive(Debug, thiserror::Error)]
pub enum DocchatError {
    /// The uploaded file type has no extractor. Recoverable by re-upload.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The embedding backend rejected the input or is unavailable.
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Vectors of different lengths were mixed in one index or query.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension the index was built with.
        expected: usize,
        /// Dimension of the offending vector.
        actual: usize,
    },

    /// The session cannot answer yet (no document indexed or no model bound).
    #[error("Session not ready: {0}")]
    NotReady(String),

    /// A backend call exceeded its deadline. Retryable by the caller.
    #[error("Timed out after {seconds}s waiting for {operation}")]
    Timeout {
        /// The operation that timed out (e.g. `embedding`, `completion`).
        operation: String,
        /// The deadline that was exceeded, in seconds.
        seconds: u64,
    },

    /// Ingestion failed; the session keeps its previous index.
    #[error("Ingestion failed: {0}")]
    Ingestion(#[source] Box<DocchatError>),

    /// A newer upload to the same session was submitted while this one was
    /// being indexed; its index was discarded.
    #[error("Superseded by a newer upload: {0}")]
    Superseded(String),

    /// The completion service returned an error.
    #[error("Completion error: {0}")]
    Completion(String),

    /// Invalid configuration or argument.
    #[error("Config error: {0}")]
    Config(String),

    /// No session is registered under this id.
    #[error("Session not found: {0}")]
    SessionNotFound(Uuid),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DocchatError {
    /// Wraps a pipeline failure as an ingestion error, without double wrapping.
    pub fn ingestion(inner: DocchatError) -> Self {
        match inner {
            DocchatError::Ingestion(_) => inner,
            other => DocchatError::Ingestion(Box::new(other)),
        }
    }

    /// Whether retrying the same call later may succeed.
    ///
    /// Only timeouts qualify; the core never retries on its own.
    pub fn is_retryable(&self) -> bool {
        match self {
            DocchatError::Timeout { .. } => true,
            DocchatError::Ingestion(inner) => inner.is_retryable(),
            _ => false,
        }
    }
}

/// A convenience `Result` alias using [`DocchatError`].
pub type DocchatResult<T> = Result<T, DocchatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingestion_is_not_double_wrapped() {
        let err = DocchatError::ingestion(DocchatError::Embedding("down".into()));
        let err = DocchatError::ingestion(err);
        match err {
            DocchatError::Ingestion(inner) => {
                assert!(matches!(*inner, DocchatError::Embedding(_)));
            }
            other => panic!("unexpected: {other}"),
        }
    }

    #[test]
    fn test_retryable_kinds() {
        let timeout = DocchatError::Timeout {
            operation: "completion".into(),
            seconds: 5,
        };
        assert!(timeout.is_retryable());
        assert!(DocchatError::ingestion(timeout).is_retryable());
        assert!(!DocchatError::NotReady("no document".into()).is_retryable());
        assert!(!DocchatError::DimensionMismatch {
            expected: 3,
            actual: 2
        }
        .is_retryable());
    }

    #[test]
    fn test_error_messages() {
        let err = DocchatError::DimensionMismatch {
            expected: 256,
            actual: 128,
        };
        assert_eq!(err.to_string(), "Dimension mismatch: expected 256, got 128");
        let err = DocchatError::Timeout {
            operation: "embedding".into(),
            seconds: 60,
        };
        assert_eq!(err.to_string(), "Timed out after 60s waiting for embedding");
        let err = DocchatError::Superseded("old.txt".into());
        assert_eq!(err.to_string(), "Superseded by a newer upload: old.txt");
        assert!(!err.is_retryable());
    }
}
