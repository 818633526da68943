//! End-to-end lifecycle tests: sync a product, route a query, retrieve
//! context, delete, and degrade through a provider outage.

use std::sync::Arc;
use std::time::Duration;
use supportkb_common::config::{RetrievalConfig, RoutingConfig};
use supportkb_common::db::models::ChunkType;
use supportkb_common::embeddings::{EmbeddingService, FailingEmbedder, MockEmbedder};
use supportkb_common::store::MemoryChunkStore;
use supportkb_retrieval::{ContextRetriever, IntentRouter, RoutingDecision};
use supportkb_sync::{SourceRecord, SyncPipeline};
use uuid::Uuid;

const DIMENSION: usize = 512;

fn embedding_service(provider_up: bool) -> Arc<EmbeddingService> {
    let primary: Arc<dyn supportkb_common::Embedder> = if provider_up {
        Arc::new(MockEmbedder::new(DIMENSION))
    } else {
        Arc::new(FailingEmbedder)
    };
    Arc::new(EmbeddingService::new(
        primary,
        None,
        DIMENSION,
        10_000,
        Duration::from_secs(1),
    ))
}

fn retriever(store: Arc<MemoryChunkStore>) -> ContextRetriever {
    ContextRetriever::new(
        store,
        embedding_service(true),
        // A permissive floor: the mock embedder's bag-of-words vectors
        // score real matches lower than a production model would.
        RetrievalConfig {
            min_similarity: 0.1,
            overfetch_factor: 2,
            tokens_per_word: 1.3,
            per_source_limit: 8,
            search_timeout_ms: 2_000,
        },
    )
}

fn router() -> IntentRouter {
    IntentRouter::new(RoutingConfig {
        score_threshold: 1.0,
        cache_ttl_secs: 60,
        general_primary_budget_tokens: 1_200,
        general_secondary_budget_tokens: 400,
    })
}

fn nano_press(product_id: Uuid, price: f64) -> SourceRecord {
    SourceRecord::Product {
        product_id,
        title: "Nano Press".to_string(),
        price,
        currency: "IDR".to_string(),
        brand: Some("BrewLab".to_string()),
        features: vec!["portable".to_string(), "manual pump".to_string()],
        description: "Compact manual espresso maker for travel.".to_string(),
    }
}

#[tokio::test]
async fn product_lifecycle_sync_query_update_delete() {
    let store = Arc::new(MemoryChunkStore::new());
    let pipeline = SyncPipeline::new(store.clone(), embedding_service(true));
    let tenant = Uuid::new_v4();
    let product_id = Uuid::new_v4();

    // First sync creates exactly one embedded product chunk.
    let outcome = pipeline
        .sync_source(tenant, &nano_press(product_id, 8_249_000.0))
        .await
        .unwrap();
    assert!(outcome.embedded);
    assert_eq!(store.count_by_type(tenant, ChunkType::Product).await, 1);

    // A price edit re-syncs into the same row.
    let resynced = pipeline
        .sync_source(tenant, &nano_press(product_id, 7_999_000.0))
        .await
        .unwrap();
    assert_eq!(resynced.chunk_id, outcome.chunk_id);
    assert_eq!(store.count_by_type(tenant, ChunkType::Product).await, 1);

    // The pricing query routes to the product source and finds the chunk
    // above the similarity floor, current price included.
    let decision = router()
        .route(tenant, "what's the price of the Nano Press")
        .await;
    assert_eq!(decision.primary_source, ChunkType::Product);

    let bundle = retriever(store.clone())
        .retrieve(tenant, "what's the price of the Nano Press", &decision)
        .await;
    assert_eq!(bundle.primary[0].source_id, Some(product_id));
    assert!(bundle.primary[0].similarity > 0.1);
    assert!(bundle.primary[0].full_text.contains("7999000"));
    assert!(bundle.avg_similarity > 0.0);

    // Deleting the product removes its chunk from search immediately.
    pipeline
        .remove_source(tenant, ChunkType::Product, product_id)
        .await
        .unwrap();
    let bundle = retriever(store)
        .retrieve(tenant, "what's the price of the Nano Press", &decision)
        .await;
    assert!(bundle.is_empty());
}

#[tokio::test]
async fn provider_outage_degrades_then_recovers() {
    let store = Arc::new(MemoryChunkStore::new());
    let tenant = Uuid::new_v4();
    let product_id = Uuid::new_v4();

    // Outage during sync: the chunk lands without vectors and retrieval
    // quietly returns nothing for it.
    let outcome = SyncPipeline::new(store.clone(), embedding_service(false))
        .sync_source(tenant, &nano_press(product_id, 8_249_000.0))
        .await
        .unwrap();
    assert!(!outcome.embedded);
    assert_eq!(store.count().await, 1);

    let decision = router()
        .route(tenant, "how much is the nano press")
        .await;
    let bundle = retriever(store.clone())
        .retrieve(tenant, "how much is the nano press", &decision)
        .await;
    assert!(bundle.is_empty());

    // Providers recover, sync reruns, the same chunk becomes searchable.
    SyncPipeline::new(store.clone(), embedding_service(true))
        .sync_source(tenant, &nano_press(product_id, 8_249_000.0))
        .await
        .unwrap();
    assert_eq!(store.count().await, 1);

    let bundle = retriever(store)
        .retrieve(tenant, "how much is the nano press", &decision)
        .await;
    assert_eq!(bundle.primary.len(), 1);
    assert_eq!(bundle.primary[0].source_id, Some(product_id));
}

#[tokio::test]
async fn unmatched_query_uses_general_route() {
    let store = Arc::new(MemoryChunkStore::new());
    let pipeline = SyncPipeline::new(store.clone(), embedding_service(true));
    let tenant = Uuid::new_v4();

    pipeline
        .sync_source(
            tenant,
            &SourceRecord::Qa {
                qa_id: Uuid::new_v4(),
                question: "Where is your workshop located?".to_string(),
                answer: "Our workshop is in Bandung, open weekdays.".to_string(),
            },
        )
        .await
        .unwrap();

    let decision: RoutingDecision = router()
        .route(tenant, "where is your workshop located")
        .await;
    assert_eq!(decision.intent, "general");
    assert_eq!(decision.primary_source, ChunkType::Faq);

    let bundle = retriever(store)
        .retrieve(tenant, "where is your workshop located", &decision)
        .await;
    assert_eq!(bundle.primary.len(), 1);
    assert!(bundle.primary[0].full_text.contains("Bandung"));
}

#[tokio::test]
async fn retrieval_is_tenant_isolated() {
    let store = Arc::new(MemoryChunkStore::new());
    let pipeline = SyncPipeline::new(store.clone(), embedding_service(true));
    let tenant_a = Uuid::new_v4();
    let tenant_b = Uuid::new_v4();

    pipeline
        .sync_source(tenant_a, &nano_press(Uuid::new_v4(), 8_249_000.0))
        .await
        .unwrap();

    let decision = router().route(tenant_b, "nano press price").await;
    let bundle = retriever(store)
        .retrieve(tenant_b, "nano press price", &decision)
        .await;
    assert!(bundle.is_empty());
}
