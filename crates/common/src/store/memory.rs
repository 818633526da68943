//! In-memory chunk store
//!
//! Implements the same contract as the Postgres store with in-process
//! cosine ranking. Used by unit and integration tests and for local
//! development without a database.

use super::{cosine_similarity, ChunkFields, ChunkStore, ScoredChunk};
use crate::db::models::ChunkType;
use crate::errors::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct StoredChunk {
    id: Uuid,
    tenant_id: Uuid,
    chunk_type: ChunkType,
    source_id: Option<Uuid>,
    fields: ChunkFields,
}

/// In-memory chunk store with the atomic-replace upsert semantics of the
/// real table.
#[derive(Default, Clone)]
pub struct MemoryChunkStore {
    chunks: Arc<RwLock<Vec<StoredChunk>>>,
}

impl MemoryChunkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored chunks, across all tenants
    pub async fn count(&self) -> usize {
        self.chunks.read().await.len()
    }

    /// Number of chunks for one tenant and type
    pub async fn count_by_type(&self, tenant_id: Uuid, chunk_type: ChunkType) -> usize {
        self.chunks
            .read()
            .await
            .iter()
            .filter(|c| c.tenant_id == tenant_id && c.chunk_type == chunk_type)
            .count()
    }
}

#[async_trait]
impl ChunkStore for MemoryChunkStore {
    async fn upsert(
        &self,
        tenant_id: Uuid,
        chunk_type: ChunkType,
        source_id: Option<Uuid>,
        fields: ChunkFields,
    ) -> Result<Uuid> {
        let mut chunks = self.chunks.write().await;

        // Same conflict rule as the unique index: only a present source id
        // identifies an existing row to replace.
        if source_id.is_some() {
            if let Some(existing) = chunks.iter_mut().find(|c| {
                c.tenant_id == tenant_id
                    && c.chunk_type == chunk_type
                    && c.source_id == source_id
            }) {
                existing.fields = fields;
                return Ok(existing.id);
            }
        }

        let id = Uuid::new_v4();
        chunks.push(StoredChunk {
            id,
            tenant_id,
            chunk_type,
            source_id,
            fields,
        });
        Ok(id)
    }

    async fn delete_by_source(
        &self,
        tenant_id: Uuid,
        chunk_type: ChunkType,
        source_id: Uuid,
    ) -> Result<bool> {
        let mut chunks = self.chunks.write().await;
        let before = chunks.len();
        chunks.retain(|c| {
            !(c.tenant_id == tenant_id
                && c.chunk_type == chunk_type
                && c.source_id == Some(source_id))
        });
        Ok(chunks.len() < before)
    }

    async fn delete_by_document_group(&self, tenant_id: Uuid, group_id: Uuid) -> Result<u64> {
        let mut chunks = self.chunks.write().await;
        let before = chunks.len();
        chunks.retain(|c| {
            !(c.tenant_id == tenant_id && c.fields.document_group_id == Some(group_id))
        });
        Ok((before - chunks.len()) as u64)
    }

    async fn search(
        &self,
        tenant_id: Uuid,
        chunk_type: ChunkType,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        let chunks = self.chunks.read().await;

        let mut scored: Vec<ScoredChunk> = chunks
            .iter()
            .filter(|c| c.tenant_id == tenant_id && c.chunk_type == chunk_type)
            .filter_map(|c| {
                let embedding = c.fields.summary_embedding.as_ref()?;
                Some(ScoredChunk {
                    chunk_id: c.id,
                    chunk_type: c.chunk_type,
                    source_id: c.source_id,
                    title: c.fields.title.clone(),
                    full_text: c.fields.full_text.clone(),
                    word_count: c.fields.word_count,
                    metadata: c.fields.metadata.clone(),
                    similarity: cosine_similarity(query_vector, embedding),
                })
            })
            .collect();

        scored.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(top_k);

        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(summary: &str, embedding: Option<Vec<f32>>) -> ChunkFields {
        ChunkFields {
            title: "t".into(),
            summary_text: summary.into(),
            full_text: format!("full: {}", summary),
            summary_embedding: embedding,
            full_embedding: None,
            language: "en".into(),
            word_count: 10,
            metadata: serde_json::json!({}),
            document_group_id: None,
        }
    }

    #[tokio::test]
    async fn test_upsert_replaces_same_source() {
        let store = MemoryChunkStore::new();
        let tenant = Uuid::new_v4();
        let source = Uuid::new_v4();

        let id1 = store
            .upsert(tenant, ChunkType::Product, Some(source), fields("a", None))
            .await
            .unwrap();
        let id2 = store
            .upsert(tenant, ChunkType::Product, Some(source), fields("b", None))
            .await
            .unwrap();

        assert_eq!(id1, id2);
        assert_eq!(store.count().await, 1);
    }

    #[tokio::test]
    async fn test_null_source_ids_never_conflict() {
        let store = MemoryChunkStore::new();
        let tenant = Uuid::new_v4();

        store
            .upsert(tenant, ChunkType::Manual, None, fields("a", None))
            .await
            .unwrap();
        store
            .upsert(tenant, ChunkType::Manual, None, fields("b", None))
            .await
            .unwrap();

        assert_eq!(store.count().await, 2);
    }

    #[tokio::test]
    async fn test_search_excludes_null_embeddings() {
        let store = MemoryChunkStore::new();
        let tenant = Uuid::new_v4();

        store
            .upsert(
                tenant,
                ChunkType::Faq,
                Some(Uuid::new_v4()),
                fields("embedded", Some(vec![1.0, 0.0])),
            )
            .await
            .unwrap();
        store
            .upsert(
                tenant,
                ChunkType::Faq,
                Some(Uuid::new_v4()),
                fields("not embedded", None),
            )
            .await
            .unwrap();

        let results = store
            .search(tenant, ChunkType::Faq, &[1.0, 0.0], 10)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].full_text, "full: embedded");
    }

    #[tokio::test]
    async fn test_search_is_tenant_scoped() {
        let store = MemoryChunkStore::new();
        let tenant_a = Uuid::new_v4();
        let tenant_b = Uuid::new_v4();

        store
            .upsert(
                tenant_a,
                ChunkType::Page,
                Some(Uuid::new_v4()),
                fields("a", Some(vec![1.0, 0.0])),
            )
            .await
            .unwrap();

        let results = store
            .search(tenant_b, ChunkType::Page, &[1.0, 0.0], 10)
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_search_ranks_by_similarity() {
        let store = MemoryChunkStore::new();
        let tenant = Uuid::new_v4();

        store
            .upsert(
                tenant,
                ChunkType::Product,
                Some(Uuid::new_v4()),
                fields("far", Some(vec![0.0, 1.0])),
            )
            .await
            .unwrap();
        store
            .upsert(
                tenant,
                ChunkType::Product,
                Some(Uuid::new_v4()),
                fields("near", Some(vec![0.9, 0.1])),
            )
            .await
            .unwrap();

        let results = store
            .search(tenant, ChunkType::Product, &[1.0, 0.0], 10)
            .await
            .unwrap();
        assert_eq!(results[0].full_text, "full: near");
        assert!(results[0].similarity > results[1].similarity);
    }

    #[tokio::test]
    async fn test_delete_by_document_group() {
        let store = MemoryChunkStore::new();
        let tenant = Uuid::new_v4();
        let group = Uuid::new_v4();

        let mut f = fields("grouped", None);
        f.document_group_id = Some(group);
        store
            .upsert(tenant, ChunkType::Page, Some(Uuid::new_v4()), f.clone())
            .await
            .unwrap();
        store
            .upsert(tenant, ChunkType::Page, Some(Uuid::new_v4()), f)
            .await
            .unwrap();
        store
            .upsert(
                tenant,
                ChunkType::Page,
                Some(Uuid::new_v4()),
                fields("ungrouped", None),
            )
            .await
            .unwrap();

        let removed = store.delete_by_document_group(tenant, group).await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.count().await, 1);
    }
}
