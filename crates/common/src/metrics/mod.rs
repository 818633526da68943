//! Metrics and observability utilities
//!
//! Provides metric registration and small record helpers with
//! standardized naming. The exporter is installed by the host service.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};

/// Metrics prefix for all SupportKB metrics
pub const METRICS_PREFIX: &str = "supportkb";

/// Register all metric descriptions
pub fn register_metrics() {
    // Sync pipeline metrics
    describe_counter!(
        format!("{}_sources_synced_total", METRICS_PREFIX),
        Unit::Count,
        "Total source records synced into the chunk store"
    );

    describe_counter!(
        format!("{}_sources_removed_total", METRICS_PREFIX),
        Unit::Count,
        "Total source records removed from the chunk store"
    );

    describe_histogram!(
        format!("{}_sync_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Source sync latency in seconds"
    );

    // Retrieval metrics
    describe_counter!(
        format!("{}_retrievals_total", METRICS_PREFIX),
        Unit::Count,
        "Total context retrieval calls"
    );

    describe_histogram!(
        format!("{}_retrieval_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Context retrieval latency in seconds"
    );

    // Embedding metrics
    describe_counter!(
        format!("{}_embedding_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total embedding provider requests"
    );

    describe_counter!(
        format!("{}_embedding_errors_total", METRICS_PREFIX),
        Unit::Count,
        "Total embedding provider errors"
    );

    describe_histogram!(
        format!("{}_embedding_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Embedding generation latency in seconds"
    );

    // Routing cache metrics
    describe_counter!(
        format!("{}_routing_cache_hits_total", METRICS_PREFIX),
        Unit::Count,
        "Routing decision cache hits"
    );

    describe_counter!(
        format!("{}_routing_cache_misses_total", METRICS_PREFIX),
        Unit::Count,
        "Routing decision cache misses"
    );

    tracing::info!("Metrics registered");
}

/// Record a completed source sync
pub fn record_sync(duration_secs: f64, chunk_type: &str, embedded: bool) {
    counter!(
        format!("{}_sources_synced_total", METRICS_PREFIX),
        "chunk_type" => chunk_type.to_string(),
        "embedded" => embedded.to_string()
    )
    .increment(1);

    histogram!(
        format!("{}_sync_duration_seconds", METRICS_PREFIX),
        "chunk_type" => chunk_type.to_string()
    )
    .record(duration_secs);
}

/// Record a source removal
pub fn record_removal(chunk_type: &str) {
    counter!(
        format!("{}_sources_removed_total", METRICS_PREFIX),
        "chunk_type" => chunk_type.to_string()
    )
    .increment(1);
}

/// Record a context retrieval call
pub fn record_retrieval(duration_secs: f64, intent: &str, accepted: usize) {
    counter!(
        format!("{}_retrievals_total", METRICS_PREFIX),
        "intent" => intent.to_string(),
        "grounded" => (accepted > 0).to_string()
    )
    .increment(1);

    histogram!(
        format!("{}_retrieval_duration_seconds", METRICS_PREFIX),
        "intent" => intent.to_string()
    )
    .record(duration_secs);
}

/// Record an embedding provider request
pub fn record_embedding(duration_secs: f64, model: &str, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_embedding_requests_total", METRICS_PREFIX),
        "model" => model.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    if success {
        histogram!(
            format!("{}_embedding_duration_seconds", METRICS_PREFIX),
            "model" => model.to_string()
        )
        .record(duration_secs);
    } else {
        counter!(
            format!("{}_embedding_errors_total", METRICS_PREFIX),
            "model" => model.to_string()
        )
        .increment(1);
    }
}

/// Record a routing cache lookup
pub fn record_routing_cache(hit: bool) {
    if hit {
        counter!(format!("{}_routing_cache_hits_total", METRICS_PREFIX)).increment(1);
    } else {
        counter!(format!("{}_routing_cache_misses_total", METRICS_PREFIX)).increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_helpers_run() {
        record_sync(0.02, "product", true);
        record_removal("page");
        record_retrieval(0.05, "pricing", 3);
        record_embedding(0.4, "text-embedding-3-small", true);
        record_routing_cache(true);
        // Just verify they run without panic when no recorder is installed
    }
}
