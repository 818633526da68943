//! Knowledge Chunk Store
//!
//! Persistent, per-tenant table of searchable chunks, two embedding vectors
//! each. Ground truth for retrieval; holds no business logic about which
//! sources matter.
//!
//! Two implementations:
//! - [`PgChunkStore`] — PostgreSQL + pgvector, atomic upserts
//! - [`MemoryChunkStore`] — in-memory double for tests and local development

mod memory;
mod pg;

pub use memory::MemoryChunkStore;
pub use pg::PgChunkStore;

use crate::db::models::ChunkType;
use crate::errors::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fields written on upsert. Embeddings are optional: a chunk persists
/// without them and is simply excluded from search until the next sync.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkFields {
    pub title: String,
    pub summary_text: String,
    pub full_text: String,
    pub summary_embedding: Option<Vec<f32>>,
    pub full_embedding: Option<Vec<f32>>,
    pub language: String,
    pub word_count: i32,
    pub metadata: serde_json::Value,
    pub document_group_id: Option<Uuid>,
}

/// Result row from a similarity search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk_id: Uuid,
    pub chunk_type: ChunkType,
    pub source_id: Option<Uuid>,
    pub title: String,
    /// The unit handed to generation
    pub full_text: String,
    pub word_count: i32,
    pub metadata: serde_json::Value,
    /// 1 - cosine_distance(query, summary_embedding)
    pub similarity: f64,
}

/// Store contract for knowledge chunks.
///
/// `upsert` is idempotent: a repeated call for the same
/// `(tenant, chunk_type, source_id)` replaces the prior fields and
/// embeddings instead of duplicating, which makes re-crawling and
/// re-editing safe to repeat.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Insert or replace the chunk for a source record. Returns the chunk id.
    async fn upsert(
        &self,
        tenant_id: Uuid,
        chunk_type: ChunkType,
        source_id: Option<Uuid>,
        fields: ChunkFields,
    ) -> Result<Uuid>;

    /// Delete the chunk derived from a source record. Returns true if a
    /// chunk was removed.
    async fn delete_by_source(
        &self,
        tenant_id: Uuid,
        chunk_type: ChunkType,
        source_id: Uuid,
    ) -> Result<bool>;

    /// Delete every chunk in a document group. Returns the number removed.
    async fn delete_by_document_group(&self, tenant_id: Uuid, group_id: Uuid) -> Result<u64>;

    /// Rank chunks of one type by similarity to the query vector,
    /// descending. Chunks with a null summary embedding never appear.
    async fn search(
        &self,
        tenant_id: Uuid,
        chunk_type: ChunkType,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>>;
}

/// Format a vector in pgvector text form: "[1.0,2.0,...]"
pub(crate) fn format_vector(v: &[f32]) -> String {
    format!(
        "[{}]",
        v.iter().map(|f| f.to_string()).collect::<Vec<_>>().join(",")
    )
}

/// Cosine similarity between two equal-length vectors.
/// Returns 0.0 for zero-magnitude input.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += (*x as f64) * (*y as f64);
        norm_a += (*x as f64) * (*x as f64);
        norm_b += (*y as f64) * (*y as f64);
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_vector() {
        assert_eq!(format_vector(&[0.1, 0.2, 0.3]), "[0.1,0.2,0.3]");
    }

    #[test]
    fn test_cosine_similarity_identical() {
        let v = vec![0.5, 0.5, 0.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-9);
    }

    #[test]
    fn test_cosine_similarity_zero_vector() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }
}
