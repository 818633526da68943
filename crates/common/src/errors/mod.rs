//! Error types for the knowledge retrieval engine
//!
//! Three classes of failure matter here:
//! - Embedding failures are recovered locally (chunks persist with null
//!   embeddings, retrieval degrades to an empty bundle)
//! - Store failures are fatal to the current call and surfaced to the caller
//! - Everything else is configuration or serialization trouble

use thiserror::Error;

/// Result type alias using EngineError
pub type Result<T> = std::result::Result<T, EngineError>;

/// Engine error types
#[derive(Error, Debug)]
pub enum EngineError {
    /// Both embedding providers failed or timed out. Callers recover
    /// locally: ingestion keeps the chunk with null embeddings, retrieval
    /// returns an empty bundle.
    #[error("Embedding failed on all providers: {message}")]
    EmbeddingFailure { message: String },

    #[error("Embedding timed out after {timeout_ms}ms")]
    EmbeddingTimeout { timeout_ms: u64 },

    /// The chunk store cannot be reached. Fatal to the current call; no
    /// inline retry, the caller's own policy applies.
    #[error("Chunk store unavailable: {0}")]
    StoreUnavailable(#[from] sea_orm::DbErr),

    #[error("Store connection error: {message}")]
    StoreConnection { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl EngineError {
    /// True when the failure is recoverable by leaving embeddings null and
    /// retrying on the next sync.
    pub fn is_embedding_failure(&self) -> bool {
        matches!(
            self,
            EngineError::EmbeddingFailure { .. } | EngineError::EmbeddingTimeout { .. }
        )
    }

    /// True when the current call must fail (store-level problems).
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EngineError::StoreUnavailable(_) | EngineError::StoreConnection { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_failure_is_recoverable() {
        let err = EngineError::EmbeddingFailure {
            message: "both providers down".into(),
        };
        assert!(err.is_embedding_failure());
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_timeout_counts_as_embedding_failure() {
        let err = EngineError::EmbeddingTimeout { timeout_ms: 5000 };
        assert!(err.is_embedding_failure());
    }

    #[test]
    fn test_store_error_is_fatal() {
        let err = EngineError::StoreConnection {
            message: "pool exhausted".into(),
        };
        assert!(err.is_fatal());
        assert!(!err.is_embedding_failure());
    }
}
