//! SupportKB Common Library
//!
//! Shared code for the tenant knowledge retrieval engine:
//! - Knowledge chunk store (pgvector-backed, plus an in-memory double)
//! - Embedding service with provider fallback
//! - Error types and handling
//! - Configuration management
//! - Metrics and telemetry helpers

pub mod config;
pub mod db;
pub mod embeddings;
pub mod errors;
pub mod language;
pub mod metrics;
pub mod store;
pub mod telemetry;

// Re-export commonly used types
pub use config::AppConfig;
pub use embeddings::{Embedder, EmbeddingService};
pub use errors::{EngineError, Result};
pub use store::{ChunkFields, ChunkStore, ScoredChunk};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
