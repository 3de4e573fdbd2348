use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use mdsearch_core::{AddOutcome, ChunkParams, Error, IndexStats, KnowledgeBase, SearchHit, UpdateMode, DEFAULT_TOP_K};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

const MAX_K: usize = 100;

type ApiError = (StatusCode, String);

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_k")]
    pub k: usize,
}
fn default_k() -> usize { DEFAULT_TOP_K }

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<SearchHit>,
}

#[derive(Deserialize)]
pub struct AddRequest {
    pub source: String,
    pub text: String,
    #[serde(default)]
    pub mode: UpdateMode,
    pub chunk_size: Option<i64>,
    pub overlap: Option<i64>,
}

#[derive(Deserialize)]
pub struct RemoveParams {
    pub source: String,
}

#[derive(Serialize, Deserialize)]
pub struct RemoveResponse {
    pub removed: usize,
}

#[derive(Clone)]
pub struct AppState {
    pub kb: Arc<KnowledgeBase>,
    pub admin_token: Option<String>,
}

pub fn build_app(kb: Arc<KnowledgeBase>) -> Router {
    let admin_token = std::env::var("ADMIN_TOKEN").ok().filter(|t| !t.is_empty());
    with_state(AppState { kb, admin_token })
}

/// Router over an explicit state, bypassing the environment lookup of `ADMIN_TOKEN`.
pub fn with_state(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/stats", get(stats_handler))
        .route("/documents", axum::routing::post(add_handler).delete(remove_handler))
        .with_state(state)
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
}

// CORS_ALLOW_ORIGIN is comma separated; unset or unparsable falls back to any origin
fn cors_layer() -> CorsLayer {
    let origins: Vec<_> = std::env::var("CORS_ALLOW_ORIGIN")
        .map(|val| val.split(',').filter_map(|s| s.trim().parse().ok()).collect())
        .unwrap_or_default();
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(AllowOrigin::list(origins))
    }
}

pub async fn search_handler(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Json<SearchResponse> {
    let start = std::time::Instant::now();
    let k = params.k.clamp(1, MAX_K);
    let mut results = state.kb.search(&params.q, usize::MAX);
    let total_hits = results.len();
    results.truncate(k);
    let took_s = start.elapsed().as_secs_f64();
    tracing::debug!(query = %params.q, total_hits, took_s, "search");
    Json(SearchResponse { query: params.q, took_s, total_hits, results })
}

pub async fn stats_handler(State(state): State<AppState>) -> Json<IndexStats> {
    Json(state.kb.stats())
}

async fn add_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<AddRequest>,
) -> Result<Json<AddOutcome>, ApiError> {
    authorize(&state, &headers)?;
    let defaults = ChunkParams::default();
    let params = ChunkParams::new(
        req.chunk_size.unwrap_or(defaults.chunk_size),
        req.overlap.unwrap_or(defaults.overlap),
    );
    let kb = state.kb.clone();
    let outcome = tokio::task::spawn_blocking(move || kb.add_document(&req.source, &req.text, &params, req.mode))
        .await
        .map_err(internal)?
        .map_err(core_error)?;
    Ok(Json(outcome))
}

async fn remove_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<RemoveParams>,
) -> Result<Json<RemoveResponse>, ApiError> {
    authorize(&state, &headers)?;
    let kb = state.kb.clone();
    let removed = tokio::task::spawn_blocking(move || kb.remove_source(&params.source))
        .await
        .map_err(internal)?
        .map_err(core_error)?;
    Ok(Json(RemoveResponse { removed }))
}

fn core_error(err: Error) -> ApiError {
    match err {
        Error::InvalidParameter(msg) => (StatusCode::BAD_REQUEST, msg),
        other => {
            tracing::error!(error = %other, "knowledge base update failed");
            (StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
        }
    }
}

fn internal(err: tokio::task::JoinError) -> ApiError {
    tracing::error!(error = %err, "blocking task failed");
    (StatusCode::INTERNAL_SERVER_ERROR, "internal error".into())
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(required) = &state.admin_token else { return Ok(()) };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, "invalid admin token".into()))
    }
}
