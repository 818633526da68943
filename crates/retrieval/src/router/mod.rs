//! Intent router
//!
//! Weighted keyword scoring, not a learned classifier: each intent's score
//! is the summed weight of its keywords appearing as substrings of the
//! normalized query, per detected language. Tenant-configured rules win
//! over global ones; a built-in set covers tenants that have configured
//! nothing. The winning intent maps statically to one primary source type,
//! up to two secondary types, and fixed token budgets.
//!
//! Routing is side-effect free, so decisions are cached per
//! `(tenant, normalized query)` for a short TTL.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use supportkb_common::config::RoutingConfig;
use supportkb_common::db::models::ChunkType;
use supportkb_common::language::detect_language;
use supportkb_common::metrics::record_routing_cache;
use tokio::sync::RwLock;
use tracing::{debug, instrument};
use uuid::Uuid;

/// The catch-all intent: tie-break and below-threshold default
pub const GENERAL_INTENT: &str = "general";

/// One weighted keyword rule. `tenant_id = None` marks a global rule that
/// applies to every tenant.
#[derive(Debug, Clone)]
pub struct KeywordRule {
    pub tenant_id: Option<Uuid>,
    pub intent: String,
    pub language: String,
    pub keyword: String,
    pub weight: f32,
}

/// Static mapping from an intent to its retrieval plan
#[derive(Debug, Clone)]
pub struct IntentRoute {
    pub intent: String,
    pub primary_source: ChunkType,
    /// At most two
    pub secondary_sources: Vec<ChunkType>,
    pub primary_budget_tokens: u32,
    pub secondary_budget_tokens: u32,
}

/// The plan handed to the context retrieval engine
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingDecision {
    pub intent: String,
    pub primary_source: ChunkType,
    pub secondary_sources: Vec<ChunkType>,
    pub primary_budget_tokens: u32,
    pub secondary_budget_tokens: u32,
}

#[derive(Debug, Clone)]
struct WeightedKeyword {
    intent: String,
    keyword: String,
    weight: f32,
}

struct CachedDecision {
    decision: RoutingDecision,
    expires_at: Instant,
}

/// Keyword-scoring intent router with a TTL decision cache
pub struct IntentRouter {
    config: RoutingConfig,
    routes: RwLock<HashMap<String, IntentRoute>>,
    /// Keyed by (tenant, language)
    tenant_rules: RwLock<HashMap<(Uuid, String), Vec<WeightedKeyword>>>,
    /// Keyed by language
    global_rules: RwLock<HashMap<String, Vec<WeightedKeyword>>>,
    cache: RwLock<HashMap<(Uuid, String), CachedDecision>>,
}

impl IntentRouter {
    pub fn new(config: RoutingConfig) -> Self {
        let routes = default_routes(&config)
            .into_iter()
            .map(|r| (r.intent.clone(), r))
            .collect();

        Self {
            config,
            routes: RwLock::new(routes),
            tenant_rules: RwLock::new(HashMap::new()),
            global_rules: RwLock::new(HashMap::new()),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Replace the full rule set (tenant and global). Loaded from the rule
    /// table at startup and on edit; clears the decision cache.
    pub async fn set_rules(&self, rules: Vec<KeywordRule>) {
        let mut tenant_rules: HashMap<(Uuid, String), Vec<WeightedKeyword>> = HashMap::new();
        let mut global_rules: HashMap<String, Vec<WeightedKeyword>> = HashMap::new();

        for rule in rules {
            let weighted = WeightedKeyword {
                intent: rule.intent,
                keyword: rule.keyword.to_lowercase(),
                weight: rule.weight,
            };
            match rule.tenant_id {
                Some(tenant) => tenant_rules
                    .entry((tenant, rule.language))
                    .or_default()
                    .push(weighted),
                None => global_rules.entry(rule.language).or_default().push(weighted),
            }
        }

        *self.tenant_rules.write().await = tenant_rules;
        *self.global_rules.write().await = global_rules;
        self.cache.write().await.clear();
    }

    /// Replace the intent-to-source mapping
    pub async fn set_routes(&self, routes: Vec<IntentRoute>) {
        let mut map = self.routes.write().await;
        for route in routes {
            map.insert(route.intent.clone(), route);
        }
        self.cache.write().await.clear();
    }

    /// Drop one tenant's rules and cached decisions, called when the
    /// tenant edits its rule table.
    pub async fn invalidate_tenant(&self, tenant_id: Uuid) {
        self.tenant_rules
            .write()
            .await
            .retain(|(tenant, _), _| *tenant != tenant_id);
        self.cache
            .write()
            .await
            .retain(|(tenant, _), _| *tenant != tenant_id);
    }

    /// Classify a query and return its retrieval plan. Never fails: an
    /// unmatched or ambiguous query routes to the general intent.
    #[instrument(skip(self, query_text), fields(tenant_id = %tenant_id))]
    pub async fn route(&self, tenant_id: Uuid, query_text: &str) -> RoutingDecision {
        let normalized = normalize(query_text);
        let cache_key = (tenant_id, hash_query(&normalized));

        if let Some(cached) = self.cache.read().await.get(&cache_key) {
            if cached.expires_at > Instant::now() {
                record_routing_cache(true);
                return cached.decision.clone();
            }
        }
        record_routing_cache(false);

        let language = detect_language(&normalized);
        let intent = self.classify(tenant_id, &normalized, language).await;
        let decision = self.decision_for(&intent).await;

        debug!(intent = %decision.intent, language, "Query routed");

        // Sweep lapsed entries on every miss so the cache stays bounded by
        // live traffic rather than growing with every query ever seen.
        let now = Instant::now();
        let mut cache = self.cache.write().await;
        cache.retain(|_, cached| cached.expires_at > now);
        cache.insert(
            cache_key,
            CachedDecision {
                decision: decision.clone(),
                expires_at: now + Duration::from_secs(self.config.cache_ttl_secs),
            },
        );

        decision
    }

    async fn classify(&self, tenant_id: Uuid, normalized: &str, language: &str) -> String {
        let tenant_rules = self.tenant_rules.read().await;
        let global_rules = self.global_rules.read().await;

        let configured_tenant = tenant_rules.get(&(tenant_id, language.to_string()));
        let configured_global = global_rules.get(language);

        let builtin;
        let candidates: Vec<&WeightedKeyword> = match (configured_tenant, configured_global) {
            (None, None) => {
                builtin = builtin_rules(language);
                builtin.iter().collect()
            }
            (tenant, global) => tenant
                .into_iter()
                .flatten()
                .chain(global.into_iter().flatten())
                .collect(),
        };

        let mut scores: HashMap<String, f32> = HashMap::new();
        for rule in candidates {
            if normalized.contains(&rule.keyword) {
                *scores.entry(rule.intent.clone()).or_default() += rule.weight;
            }
        }

        let Some((best_intent, best_score)) = scores
            .iter()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
        else {
            return GENERAL_INTENT.to_string();
        };

        let tied = scores
            .iter()
            .filter(|(intent, score)| *score == best_score && intent.as_str() != best_intent.as_str())
            .count()
            > 0;

        if tied || *best_score < self.config.score_threshold {
            GENERAL_INTENT.to_string()
        } else {
            best_intent.clone()
        }
    }

    async fn decision_for(&self, intent: &str) -> RoutingDecision {
        let routes = self.routes.read().await;
        let route = routes
            .get(intent)
            .or_else(|| routes.get(GENERAL_INTENT))
            .cloned()
            .unwrap_or_else(|| general_route(&self.config));

        RoutingDecision {
            intent: route.intent,
            primary_source: route.primary_source,
            secondary_sources: route.secondary_sources.into_iter().take(2).collect(),
            primary_budget_tokens: route.primary_budget_tokens,
            secondary_budget_tokens: route.secondary_budget_tokens,
        }
    }
}

/// Lowercase and collapse runs of whitespace
fn normalize(query: &str) -> String {
    query
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn hash_query(normalized: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hex::encode(hasher.finalize())
}

fn general_route(config: &RoutingConfig) -> IntentRoute {
    IntentRoute {
        intent: GENERAL_INTENT.to_string(),
        primary_source: ChunkType::Faq,
        secondary_sources: vec![ChunkType::Page, ChunkType::Product],
        primary_budget_tokens: config.general_primary_budget_tokens,
        secondary_budget_tokens: config.general_secondary_budget_tokens,
    }
}

fn default_routes(config: &RoutingConfig) -> Vec<IntentRoute> {
    vec![
        IntentRoute {
            intent: "pricing".to_string(),
            primary_source: ChunkType::Product,
            secondary_sources: vec![ChunkType::Faq],
            primary_budget_tokens: 600,
            secondary_budget_tokens: 300,
        },
        IntentRoute {
            intent: "product".to_string(),
            primary_source: ChunkType::Product,
            secondary_sources: vec![ChunkType::Page, ChunkType::Faq],
            primary_budget_tokens: 800,
            secondary_budget_tokens: 300,
        },
        IntentRoute {
            intent: "shipping".to_string(),
            primary_source: ChunkType::Faq,
            secondary_sources: vec![ChunkType::Page],
            primary_budget_tokens: 600,
            secondary_budget_tokens: 300,
        },
        IntentRoute {
            intent: "returns".to_string(),
            primary_source: ChunkType::Faq,
            secondary_sources: vec![ChunkType::Page],
            primary_budget_tokens: 600,
            secondary_budget_tokens: 300,
        },
        general_route(config),
    ]
}

/// Minimal fallback keyword set, used only when a tenant has configured no
/// rules at all.
fn builtin_rules(language: &str) -> Vec<WeightedKeyword> {
    let pairs: &[(&str, &str)] = match language {
        "id" => &[
            ("pricing", "harga"),
            ("pricing", "berapa"),
            ("pricing", "biaya"),
            ("pricing", "diskon"),
            ("product", "produk"),
            ("product", "beli"),
            ("product", "pesan"),
            ("product", "stok"),
            ("product", "tersedia"),
            ("shipping", "pengiriman"),
            ("shipping", "ongkir"),
            ("shipping", "kirim"),
            ("shipping", "lacak"),
            ("returns", "retur"),
            ("returns", "pengembalian"),
            ("returns", "garansi"),
            ("returns", "tukar"),
        ],
        _ => &[
            ("pricing", "price"),
            ("pricing", "cost"),
            ("pricing", "how much"),
            ("pricing", "discount"),
            ("product", "product"),
            ("product", "buy"),
            ("product", "order"),
            ("product", "in stock"),
            ("product", "available"),
            ("shipping", "shipping"),
            ("shipping", "delivery"),
            ("shipping", "ship"),
            ("shipping", "track"),
            ("returns", "return"),
            ("returns", "refund"),
            ("returns", "exchange"),
            ("returns", "warranty"),
        ],
    };

    pairs
        .iter()
        .map(|(intent, keyword)| WeightedKeyword {
            intent: intent.to_string(),
            keyword: keyword.to_string(),
            weight: 1.0,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router() -> IntentRouter {
        IntentRouter::new(RoutingConfig {
            score_threshold: 1.0,
            cache_ttl_secs: 60,
            general_primary_budget_tokens: 1_200,
            general_secondary_budget_tokens: 400,
        })
    }

    #[tokio::test]
    async fn test_builtin_pricing_keywords() {
        let r = router();
        let decision = r
            .route(Uuid::new_v4(), "What's the price of the Nano Press?")
            .await;
        assert_eq!(decision.intent, "pricing");
        assert_eq!(decision.primary_source, ChunkType::Product);
        assert_eq!(decision.secondary_sources, vec![ChunkType::Faq]);
    }

    #[tokio::test]
    async fn test_indonesian_query_uses_indonesian_rules() {
        let r = router();
        let decision = r
            .route(Uuid::new_v4(), "Berapa harga untuk produk ini ya?")
            .await;
        // "harga" and "berapa" both score for pricing; "produk" scores 1
        // for product, below the pricing total.
        assert_eq!(decision.intent, "pricing");
    }

    #[tokio::test]
    async fn test_unmatched_query_falls_back_to_general() {
        let r = router();
        let decision = r.route(Uuid::new_v4(), "tell me a story").await;
        assert_eq!(decision.intent, GENERAL_INTENT);
        assert_eq!(decision.primary_source, ChunkType::Faq);
        assert_eq!(decision.primary_budget_tokens, 1_200);
    }

    #[tokio::test]
    async fn test_tenant_rules_override_builtins() {
        let r = router();
        let tenant = Uuid::new_v4();
        r.set_rules(vec![KeywordRule {
            tenant_id: Some(tenant),
            intent: "returns".to_string(),
            language: "en".to_string(),
            keyword: "price".to_string(),
            weight: 5.0,
        }])
        .await;

        // The configured tenant maps "price" to returns; the builtin set
        // no longer applies to it.
        let decision = r.route(tenant, "what is the price").await;
        assert_eq!(decision.intent, "returns");

        // Other tenants still use the builtins.
        let decision = r.route(Uuid::new_v4(), "what is the price").await;
        assert_eq!(decision.intent, "pricing");
    }

    #[tokio::test]
    async fn test_below_threshold_is_general() {
        let r = IntentRouter::new(RoutingConfig {
            score_threshold: 3.0,
            cache_ttl_secs: 60,
            general_primary_budget_tokens: 1_200,
            general_secondary_budget_tokens: 400,
        });

        // "price" scores 1.0, below the threshold of 3.0.
        let decision = r.route(Uuid::new_v4(), "what is the price").await;
        assert_eq!(decision.intent, GENERAL_INTENT);
    }

    #[tokio::test]
    async fn test_tie_falls_back_to_general() {
        let r = router();
        // One pricing keyword and one returns keyword, equal weight.
        let decision = r.route(Uuid::new_v4(), "the cost and the refund").await;
        assert_eq!(decision.intent, GENERAL_INTENT);
    }

    #[tokio::test]
    async fn test_decisions_are_cached_per_normalized_query() {
        let r = router();
        let tenant = Uuid::new_v4();

        let first = r.route(tenant, "How much IS  the nano press?").await;
        // Rule edits without invalidation do not affect the cached entry
        // for the same normalized query.
        {
            let mut cache = r.cache.write().await;
            assert_eq!(cache.len(), 1);
            for cached in cache.values_mut() {
                cached.decision.intent = "sentinel".to_string();
            }
        }
        let second = r.route(tenant, "how much is the nano press?").await;
        assert_eq!(second.intent, "sentinel");
        assert_eq!(first.primary_source, second.primary_source);
    }

    #[tokio::test]
    async fn test_expired_decisions_are_swept_on_insert() {
        let r = IntentRouter::new(RoutingConfig {
            score_threshold: 1.0,
            cache_ttl_secs: 0,
            general_primary_budget_tokens: 1_200,
            general_secondary_budget_tokens: 400,
        });
        let tenant = Uuid::new_v4();

        r.route(tenant, "what is the price").await;
        assert_eq!(r.cache.read().await.len(), 1);

        // A zero TTL lapses immediately; the next miss sweeps the stale
        // entry instead of accumulating one per distinct query.
        tokio::time::sleep(Duration::from_millis(5)).await;
        r.route(tenant, "track my delivery").await;
        let cache = r.cache.read().await;
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_invalidate_tenant_clears_rules_and_cache() {
        let r = router();
        let tenant = Uuid::new_v4();
        r.set_rules(vec![KeywordRule {
            tenant_id: Some(tenant),
            intent: "shipping".to_string(),
            language: "en".to_string(),
            keyword: "price".to_string(),
            weight: 5.0,
        }])
        .await;

        assert_eq!(r.route(tenant, "price?").await.intent, "shipping");
        r.invalidate_tenant(tenant).await;
        assert_eq!(r.route(tenant, "price?").await.intent, "pricing");
    }

    #[tokio::test]
    async fn test_secondary_sources_capped_at_two() {
        let r = router();
        r.set_routes(vec![IntentRoute {
            intent: "pricing".to_string(),
            primary_source: ChunkType::Product,
            secondary_sources: vec![ChunkType::Faq, ChunkType::Page, ChunkType::Manual],
            primary_budget_tokens: 500,
            secondary_budget_tokens: 200,
        }])
        .await;

        let decision = r.route(Uuid::new_v4(), "how much is it").await;
        assert_eq!(decision.secondary_sources.len(), 2);
    }
}
