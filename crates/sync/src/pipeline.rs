//! Sync pipeline: source record in, knowledge chunk out
//!
//! The wrapper logic shared by every source type. Lifecycle hooks on
//! source records call `sync_source` on create/update/reactivate and
//! `remove_source` on delete/deactivate; removal runs inline, never
//! deferred, so a deleted source stops being searchable immediately.

use crate::errors::Result;
use supportkb_common::language::{detect_language, word_count};
use crate::sources::SourceRecord;
use std::sync::Arc;
use std::time::Instant;
use supportkb_common::db::models::ChunkType;
use supportkb_common::embeddings::EmbeddingService;
use supportkb_common::metrics::{record_removal, record_sync};
use supportkb_common::store::{ChunkFields, ChunkStore};
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Result of syncing one source record
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub chunk_id: Uuid,
    /// False when every embedding provider failed; the chunk was stored
    /// with null embeddings and will be retried on the next sync.
    pub embedded: bool,
}

/// Shared sync pipeline over a chunk store and embedding service
pub struct SyncPipeline {
    store: Arc<dyn ChunkStore>,
    embeddings: Arc<EmbeddingService>,
}

impl SyncPipeline {
    pub fn new(store: Arc<dyn ChunkStore>, embeddings: Arc<EmbeddingService>) -> Self {
        Self { store, embeddings }
    }

    /// Sync one source record: compose, embed both views, upsert.
    ///
    /// Embedding failure is not fatal — the chunk persists with null
    /// embeddings and stays out of search until a later sync succeeds.
    /// Idempotent via the store's uniqueness: re-syncing replaces the
    /// prior chunk in place.
    #[instrument(skip(self, record), fields(tenant_id = %tenant_id, chunk_type = %record.chunk_type()))]
    pub async fn sync_source(
        &self,
        tenant_id: Uuid,
        record: &SourceRecord,
    ) -> Result<SyncOutcome> {
        let started = Instant::now();
        let chunk_type = record.chunk_type();
        let composed = record.compose()?;

        let summary_embedding = self.embed_best_effort(&composed.summary_text).await;
        let full_embedding = if summary_embedding.is_some() {
            self.embed_best_effort(&composed.full_text).await
        } else {
            // Both vectors come from the same provider pass; if the summary
            // already failed there is no point burning retries on the full
            // text.
            None
        };
        let embedded = summary_embedding.is_some();

        let fields = ChunkFields {
            language: detect_language(&composed.full_text).to_string(),
            word_count: word_count(&composed.full_text),
            title: composed.title,
            summary_text: composed.summary_text,
            full_text: composed.full_text,
            summary_embedding,
            full_embedding,
            metadata: composed.metadata,
            document_group_id: None,
        };

        let chunk_id = self
            .store
            .upsert(tenant_id, chunk_type, Some(record.source_id()), fields)
            .await?;

        record_sync(started.elapsed().as_secs_f64(), chunk_type.as_str(), embedded);
        info!(%chunk_id, embedded, "Source synced");

        Ok(SyncOutcome { chunk_id, embedded })
    }

    /// Remove the chunk derived from a deleted or deactivated source.
    /// Returns true if a chunk existed.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, chunk_type = %chunk_type))]
    pub async fn remove_source(
        &self,
        tenant_id: Uuid,
        chunk_type: ChunkType,
        source_id: Uuid,
    ) -> Result<bool> {
        let removed = self
            .store
            .delete_by_source(tenant_id, chunk_type, source_id)
            .await?;

        if removed {
            record_removal(chunk_type.as_str());
            info!(%source_id, "Source chunk removed");
        }

        Ok(removed)
    }

    /// Remove every chunk split from one logical document
    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    pub async fn remove_document_group(&self, tenant_id: Uuid, group_id: Uuid) -> Result<u64> {
        let removed = self
            .store
            .delete_by_document_group(tenant_id, group_id)
            .await?;

        if removed > 0 {
            info!(%group_id, removed, "Document group removed");
        }

        Ok(removed)
    }

    async fn embed_best_effort(&self, text: &str) -> Option<Vec<f32>> {
        match self.embeddings.embed(text).await {
            Ok(vector) => Some(vector),
            Err(e) => {
                warn!(error = %e, "Embedding unavailable, storing chunk without vector");
                None
            }
        }
    }
}
