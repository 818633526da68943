//! Context retrieval engine
//!
//! Executes a routing decision: embed the query once, search every planned
//! source concurrently, then trim each ranked list under its token budget.
//! Failures degrade per source — a timed-out or failed search contributes
//! an empty list rather than failing the whole retrieval, and an
//! embedding-provider outage yields an empty bundle the caller treats as
//! "no grounding available".

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use supportkb_common::config::RetrievalConfig;
use supportkb_common::db::models::ChunkType;
use supportkb_common::embeddings::EmbeddingService;
use supportkb_common::metrics::record_retrieval;
use supportkb_common::store::{ChunkStore, ScoredChunk};
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::router::RoutingDecision;

/// Maximum per-source searches per call: one primary plus two secondary
const MAX_CONCURRENT_SEARCHES: usize = 3;

/// Token-budgeted, multi-source context for the generation step
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextBundle {
    pub primary: Vec<ScoredChunk>,
    pub secondary: Vec<ScoredChunk>,
    /// Mean similarity over every accepted chunk; a quality signal the
    /// caller uses to decide between a grounded and a generic answer.
    pub avg_similarity: f64,
}

impl ContextBundle {
    /// True when no source produced any accepted chunk
    pub fn is_empty(&self) -> bool {
        self.primary.is_empty() && self.secondary.is_empty()
    }
}

/// Retrieval engine over a chunk store and embedding service
pub struct ContextRetriever {
    store: Arc<dyn ChunkStore>,
    embeddings: Arc<EmbeddingService>,
    config: RetrievalConfig,
}

struct SourcePlan {
    order: usize,
    chunk_type: ChunkType,
    budget_tokens: u32,
    is_primary: bool,
}

impl ContextRetriever {
    pub fn new(
        store: Arc<dyn ChunkStore>,
        embeddings: Arc<EmbeddingService>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            store,
            embeddings,
            config,
        }
    }

    /// Assemble the context bundle for one query under a routing decision
    #[instrument(skip(self, query_text, decision), fields(tenant_id = %tenant_id, intent = %decision.intent))]
    pub async fn retrieve(
        &self,
        tenant_id: Uuid,
        query_text: &str,
        decision: &RoutingDecision,
    ) -> ContextBundle {
        let started = Instant::now();

        // One query embedding shared across all per-source searches.
        let query_vector = match self.embeddings.embed(query_text).await {
            Ok(vector) => vector,
            Err(e) => {
                warn!(error = %e, "Query embedding failed, returning empty context");
                record_retrieval(started.elapsed().as_secs_f64(), &decision.intent, 0);
                return ContextBundle::default();
            }
        };

        let mut plan = vec![SourcePlan {
            order: 0,
            chunk_type: decision.primary_source,
            budget_tokens: decision.primary_budget_tokens,
            is_primary: true,
        }];
        for (i, chunk_type) in decision.secondary_sources.iter().take(2).enumerate() {
            plan.push(SourcePlan {
                order: i + 1,
                chunk_type: *chunk_type,
                budget_tokens: decision.secondary_budget_tokens,
                is_primary: false,
            });
        }

        let top_k = self.config.per_source_limit * self.config.overfetch_factor;
        let timeout = Duration::from_millis(self.config.search_timeout_ms);
        let query_vector = &query_vector;

        let mut results: Vec<(SourcePlan, Vec<ScoredChunk>)> = stream::iter(plan)
            .map(|source| {
                let store = self.store.clone();
                async move {
                    let candidates = match tokio::time::timeout(
                        timeout,
                        store.search(tenant_id, source.chunk_type, query_vector, top_k),
                    )
                    .await
                    {
                        Ok(Ok(candidates)) => candidates,
                        Ok(Err(e)) => {
                            warn!(
                                chunk_type = %source.chunk_type,
                                error = %e,
                                "Source search failed, degrading to empty"
                            );
                            Vec::new()
                        }
                        Err(_) => {
                            warn!(
                                chunk_type = %source.chunk_type,
                                timeout_ms = timeout.as_millis() as u64,
                                "Source search timed out, degrading to empty"
                            );
                            Vec::new()
                        }
                    };
                    (source, candidates)
                }
            })
            .buffer_unordered(MAX_CONCURRENT_SEARCHES)
            .collect()
            .await;

        // Completion order is nondeterministic; restore plan order.
        results.sort_by_key(|(source, _)| source.order);

        let mut bundle = ContextBundle::default();
        let mut similarity_sum = 0.0;
        let mut accepted = 0usize;

        for (source, candidates) in results {
            let trimmed = self.trim_to_budget(candidates, source.budget_tokens);
            similarity_sum += trimmed.iter().map(|c| c.similarity).sum::<f64>();
            accepted += trimmed.len();
            if source.is_primary {
                bundle.primary = trimmed;
            } else {
                bundle.secondary.extend(trimmed);
            }
        }

        if accepted > 0 {
            bundle.avg_similarity = similarity_sum / accepted as f64;
        }

        record_retrieval(started.elapsed().as_secs_f64(), &decision.intent, accepted);
        bundle
    }

    /// Drop sub-floor candidates, then greedily accept in rank order until
    /// the next chunk would exceed the token budget.
    fn trim_to_budget(&self, candidates: Vec<ScoredChunk>, budget_tokens: u32) -> Vec<ScoredChunk> {
        let mut accepted = Vec::new();
        let mut spent = 0.0f64;

        for chunk in candidates {
            if chunk.similarity < self.config.min_similarity {
                continue;
            }
            let cost = chunk.word_count.max(0) as f64 * self.config.tokens_per_word;
            if spent + cost > budget_tokens as f64 {
                break;
            }
            spent += cost;
            accepted.push(chunk);
        }

        accepted
    }
}
