//! Configuration management for the knowledge retrieval engine
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default.toml, config/<env>.toml)
//! - Default values
//!
//! The similarity floor and per-intent budgets are deliberately knobs here
//! rather than constants: the source system never justified its values
//! beyond "works well enough".

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Database configuration
    pub database: DatabaseConfig,

    /// Embedding service configuration
    pub embedding: EmbeddingConfig,

    /// Retrieval engine configuration
    pub retrieval: RetrievalConfig,

    /// Intent routing configuration
    pub routing: RoutingConfig,

    /// Observability configuration
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Primary database URL (for writes)
    pub url: String,

    /// Read replica URL (optional, falls back to primary)
    pub read_url: Option<String>,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Idle timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    /// Primary embedding provider: openai-compatible endpoint
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    /// API key for the primary provider
    pub api_key: Option<String>,

    /// API base URL (for custom endpoints)
    pub api_base: Option<String>,

    /// Model to use on the primary provider
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Fallback provider (optional; same contract as the primary)
    pub fallback_provider: Option<String>,

    /// API key for the fallback provider
    pub fallback_api_key: Option<String>,

    /// Fallback API base URL
    pub fallback_api_base: Option<String>,

    /// Model to use on the fallback provider
    pub fallback_model: Option<String>,

    /// Tenant-wide embedding dimension. The primary provider is
    /// authoritative; fallback vectors are padded/truncated to this.
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Request timeout in seconds
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,

    /// Maximum retries per provider
    #[serde(default = "default_embedding_retries")]
    pub max_retries: u32,

    /// Conservative input truncation limit in characters. Token counts are
    /// unknown without a tokenizer, so this sits well below the provider
    /// ceiling.
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrievalConfig {
    /// Minimum similarity for a chunk to enter a context bundle. Cuts
    /// near-zero-relevance noise, not a strict relevance guarantee.
    #[serde(default = "default_min_similarity")]
    pub min_similarity: f64,

    /// Over-fetch multiplier applied to per-source search limits, leaving
    /// room for budget trimming.
    #[serde(default = "default_overfetch_factor")]
    pub overfetch_factor: usize,

    /// Approximate tokens per word, used to price chunks against budgets.
    #[serde(default = "default_tokens_per_word")]
    pub tokens_per_word: f64,

    /// Base number of chunks fetched per source before over-fetching.
    #[serde(default = "default_per_source_limit")]
    pub per_source_limit: usize,

    /// Timeout for a single per-source search in milliseconds. A timed-out
    /// source degrades to an empty result.
    #[serde(default = "default_search_timeout_ms")]
    pub search_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RoutingConfig {
    /// Minimum summed keyword weight for an intent to win. Below this the
    /// router falls back to the general intent.
    #[serde(default = "default_score_threshold")]
    pub score_threshold: f32,

    /// TTL for cached routing decisions in seconds.
    #[serde(default = "default_routing_cache_ttl")]
    pub cache_ttl_secs: u64,

    /// Token budget for the primary source of the general intent.
    #[serde(default = "default_general_primary_budget")]
    pub general_primary_budget_tokens: u32,

    /// Token budget for each secondary source of the general intent.
    #[serde(default = "default_general_secondary_budget")]
    pub general_secondary_budget_tokens: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

// Default value functions
fn default_max_connections() -> u32 { 50 }
fn default_min_connections() -> u32 { 5 }
fn default_connect_timeout() -> u64 { 10 }
fn default_idle_timeout() -> u64 { 300 }
fn default_embedding_provider() -> String { "openai".to_string() }
fn default_embedding_model() -> String { "text-embedding-3-small".to_string() }
fn default_embedding_dimension() -> usize { 768 }
fn default_embedding_timeout() -> u64 { 15 }
fn default_embedding_retries() -> u32 { 2 }
fn default_max_input_chars() -> usize { 12_000 }
fn default_min_similarity() -> f64 { 0.35 }
fn default_overfetch_factor() -> usize { 2 }
fn default_tokens_per_word() -> f64 { 1.3 }
fn default_per_source_limit() -> usize { 8 }
fn default_search_timeout_ms() -> u64 { 2_000 }
fn default_score_threshold() -> f32 { 1.0 }
fn default_routing_cache_ttl() -> u64 { 60 }
fn default_general_primary_budget() -> u32 { 1_200 }
fn default_general_secondary_budget() -> u32 { 400 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_service_name() -> String { "supportkb".to_string() }

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        // Pull in a .env file when present, before reading APP_ENV.
        dotenvy::dotenv().ok();

        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))
            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            // Load local overrides
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables with APP__ prefix
            // e.g., APP__RETRIEVAL__MIN_SIMILARITY=0.4
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Get embedding request timeout as Duration
    pub fn embedding_timeout(&self) -> Duration {
        Duration::from_secs(self.embedding.timeout_secs)
    }

    /// Get per-source search timeout as Duration
    pub fn search_timeout(&self) -> Duration {
        Duration::from_millis(self.retrieval.search_timeout_ms)
    }

    /// Get the read database URL (falls back to primary)
    pub fn read_database_url(&self) -> &str {
        self.database.read_url.as_deref().unwrap_or(&self.database.url)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "postgres://localhost/supportkb".to_string(),
                read_url: None,
                max_connections: default_max_connections(),
                min_connections: default_min_connections(),
                connect_timeout_secs: default_connect_timeout(),
                idle_timeout_secs: default_idle_timeout(),
            },
            embedding: EmbeddingConfig {
                provider: default_embedding_provider(),
                api_key: None,
                api_base: None,
                model: default_embedding_model(),
                fallback_provider: None,
                fallback_api_key: None,
                fallback_api_base: None,
                fallback_model: None,
                dimension: default_embedding_dimension(),
                timeout_secs: default_embedding_timeout(),
                max_retries: default_embedding_retries(),
                max_input_chars: default_max_input_chars(),
            },
            retrieval: RetrievalConfig {
                min_similarity: default_min_similarity(),
                overfetch_factor: default_overfetch_factor(),
                tokens_per_word: default_tokens_per_word(),
                per_source_limit: default_per_source_limit(),
                search_timeout_ms: default_search_timeout_ms(),
            },
            routing: RoutingConfig {
                score_threshold: default_score_threshold(),
                cache_ttl_secs: default_routing_cache_ttl(),
                general_primary_budget_tokens: default_general_primary_budget(),
                general_secondary_budget_tokens: default_general_secondary_budget(),
            },
            observability: ObservabilityConfig {
                log_level: default_log_level(),
                json_logging: default_json_logging(),
                service_name: default_service_name(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.embedding.dimension, 768);
        assert_eq!(config.retrieval.overfetch_factor, 2);
        assert!(config.retrieval.min_similarity > 0.0);
    }

    #[test]
    fn test_read_database_fallback() {
        let config = AppConfig::default();
        assert_eq!(config.read_database_url(), "postgres://localhost/supportkb");
    }

    #[test]
    fn test_timeout_helpers() {
        let config = AppConfig::default();
        assert_eq!(config.search_timeout(), Duration::from_millis(2_000));
        assert_eq!(config.embedding_timeout(), Duration::from_secs(15));
    }
}
