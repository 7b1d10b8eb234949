//! Prometheus metrics

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use metrics::{describe_counter, describe_histogram, Unit};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

use crate::state::AppState;

/// Latency buckets in seconds; LLM calls dominate, so the tail is long
const LATENCY_BUCKETS: &[f64] = &[
    0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 5.0, 10.0, 20.0, 30.0, 60.0,
];

/// Install the global Prometheus recorder
///
/// Returns `None` when a recorder is already installed.
pub fn init_metrics() -> Option<PrometheusHandle> {
    let builder = match PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Suffix("_seconds".to_string()), LATENCY_BUCKETS)
    {
        Ok(builder) => builder,
        Err(e) => {
            tracing::warn!(error = %e, "Invalid histogram buckets, metrics disabled");
            return None;
        },
    };

    match builder.install_recorder() {
        Ok(handle) => {
            describe_metrics();
            Some(handle)
        },
        Err(e) => {
            tracing::warn!(error = %e, "Failed to install metrics recorder");
            None
        },
    }
}

fn describe_metrics() {
    describe_counter!(
        "askdocs_queries_total",
        Unit::Count,
        "Query requests by outcome"
    );
    describe_counter!(
        "askdocs_route_decisions_total",
        Unit::Count,
        "Routing decisions by branch"
    );
    describe_counter!(
        "askdocs_route_fallbacks_total",
        Unit::Count,
        "Routing calls that failed and defaulted to retrieval"
    );
    describe_counter!(
        "askdocs_expansion_fallbacks_total",
        Unit::Count,
        "Expansions that failed and fell back to the question"
    );
    describe_counter!(
        "askdocs_search_failures_total",
        Unit::Count,
        "Individual hybrid searches that failed"
    );
    describe_counter!(
        "askdocs_answer_cache_hits_total",
        Unit::Count,
        "Answers served from cache"
    );
    describe_counter!(
        "askdocs_documents_indexed_total",
        Unit::Count,
        "Documents written to the index"
    );
    describe_histogram!(
        "askdocs_retrieval_latency_seconds",
        Unit::Seconds,
        "Search, dedup and rerank latency"
    );
    describe_histogram!(
        "askdocs_pipeline_latency_seconds",
        Unit::Seconds,
        "End-to-end answering latency by branch"
    );
}

pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (StatusCode::NOT_FOUND, "metrics disabled".to_string()),
    }
}
