//! HTTP Endpoints
//!
//! REST API for question answering and ingestion.

use std::time::{Duration, Instant};

use axum::{
    extract::{Json, Path, State},
    http::{HeaderValue, Method, StatusCode},
    routing::{delete, get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use unicode_segmentation::UnicodeSegmentation;

use askdocs_agent::AnswerOutput;
use askdocs_core::RoutingDecision;
use askdocs_rag::IndexDocument;

use crate::metrics::metrics_handler;
use crate::state::AppState;
use crate::ServerError;

/// Source previews are cut to this many graphemes
pub const SOURCE_PREVIEW_GRAPHEMES: usize = 500;

const DEFAULT_CORS_ORIGIN: &str = "http://localhost:3000";

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let cors_layer = build_cors_layer(&state.config.server.cors_origins);
    let timeout = Duration::from_secs(state.config.server.request_timeout_secs);

    Router::new()
        .route("/api/v1/query", post(query))
        .route("/api/v1/documents", post(index_documents))
        .route("/api/v1/documents/:source", delete(delete_documents))
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics_handler))
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
}

/// Build CORS layer from configured origins
///
/// - No origins configured: localhost:3000 only
/// - `"*"`: any origin
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    if origins.iter().any(|o| o == "*") {
        tracing::warn!("CORS allows any origin");
        return base.allow_origin(Any);
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            origin.parse::<HeaderValue>().ok().or_else(|| {
                tracing::warn!("Invalid CORS origin: {}", origin);
                None
            })
        })
        .collect();

    if parsed.is_empty() {
        tracing::info!("No usable CORS origins configured, defaulting to {}", DEFAULT_CORS_ORIGIN);
        return base.allow_origin(HeaderValue::from_static(DEFAULT_CORS_ORIGIN));
    }

    tracing::info!("CORS configured with {} origins", parsed.len());
    base.allow_origin(parsed)
}

/// Query request
#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub question: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SourceView {
    pub rank: usize,
    pub content: String,
    pub score: f32,
}

/// Query response
#[derive(Debug, Serialize, Deserialize)]
pub struct QueryResponse {
    pub answer: String,
    pub sources: Vec<SourceView>,
    pub routing: RoutingDecision,
    pub cached: bool,
    pub processing_time_ms: u64,
}

impl QueryResponse {
    fn from_output(output: AnswerOutput, elapsed: Duration) -> Self {
        let sources = output
            .sources
            .iter()
            .map(|s| SourceView {
                rank: s.rank,
                content: preview(s.content(), SOURCE_PREVIEW_GRAPHEMES),
                score: s.score,
            })
            .collect();

        Self {
            answer: output.final_answer,
            sources,
            routing: output.routing,
            cached: output.cached,
            processing_time_ms: elapsed.as_millis() as u64,
        }
    }
}

/// First `max` graphemes of `text`, with `...` when cut
pub fn preview(text: &str, max: usize) -> String {
    match text.grapheme_indices(true).nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Answer a question
async fn query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ServerError> {
    let start = Instant::now();

    match state.pipeline.answer(&request.question).await {
        Ok(output) => {
            metrics::counter!("askdocs_queries_total", "status" => "ok").increment(1);
            Ok(Json(QueryResponse::from_output(output, start.elapsed())))
        },
        Err(e) => {
            let err = ServerError::from(e);
            metrics::counter!("askdocs_queries_total", "status" => err.label()).increment(1);
            tracing::warn!(error = %err, "Query failed");
            Err(err)
        },
    }
}

/// Ingestion request
#[derive(Debug, Deserialize)]
pub struct IndexRequest {
    pub documents: Vec<IndexDocument>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IndexResponse {
    pub indexed: usize,
}

/// Index documents
async fn index_documents(
    State(state): State<AppState>,
    Json(request): Json<IndexRequest>,
) -> Result<Json<IndexResponse>, ServerError> {
    if request.documents.is_empty() {
        return Err(ServerError::InvalidRequest(
            "No documents provided".to_string(),
        ));
    }

    let submitted = request.documents.len();
    let indexed = state.indexer.index_documents(request.documents).await?;

    if indexed > 0 {
        state.pipeline.invalidate_cache();
    }

    metrics::counter!("askdocs_documents_indexed_total").increment(indexed as u64);
    tracing::info!(submitted, indexed, "Indexed documents");

    Ok(Json(IndexResponse { indexed }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub source: String,
    pub deleted: u64,
}

/// Remove every point indexed from one source document
async fn delete_documents(
    State(state): State<AppState>,
    Path(source): Path<String>,
) -> Result<Json<DeleteResponse>, ServerError> {
    if source.trim().is_empty() {
        return Err(ServerError::InvalidRequest("Source is empty".to_string()));
    }

    let deleted = state.index.delete_by_source(&source).await?;

    if deleted > 0 {
        state.pipeline.invalidate_cache();
    }

    tracing::info!(source = %source, deleted, "Deleted documents");

    Ok(Json(DeleteResponse { source, deleted }))
}

/// Liveness
async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Readiness: index reachable, LLM backend probed
async fn readiness_check(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let probe_timeout = Duration::from_secs(2);

    let index_ready = state.index.ready().await;
    let points = if index_ready {
        state.index.count().await.ok()
    } else {
        None
    };

    let llm_status = match tokio::time::timeout(probe_timeout, state.llm.is_available()).await {
        Ok(true) => "ok",
        Ok(false) => "unreachable",
        Err(_) => "timeout",
    };

    let status = if index_ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(serde_json::json!({
            "ready": index_ready,
            "checks": {
                "index": {
                    "status": if index_ready { "ok" } else { "unavailable" },
                    "backend": state.index.name(),
                    "points": points,
                },
                "llm": {
                    "status": llm_status,
                    "model": state.llm.model_name(),
                },
            },
        })),
    )
}
