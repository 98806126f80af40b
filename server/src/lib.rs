use axum::{extract::{Query, State}, http::{HeaderMap, StatusCode}, routing::{get, post}, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use textdex_core::{DocId, Hit, IndexState, SearchIndex};
use tower_http::cors::{Any, CorsLayer, AllowOrigin};
use tower_http::trace::TraceLayer;

pub const MAX_TOP_K: usize = 20;

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_k")]
    pub k: usize,
}
fn default_k() -> usize { 5 }

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<Hit>,
}

/// One incoming review. Fields beyond id/text (location, rating, date) are
/// owned by the record store and ignored here.
#[derive(Deserialize)]
pub struct IngestItem {
    pub id: DocId,
    pub text: String,
}

#[derive(Serialize)]
pub struct IngestResponse {
    pub ingested: usize,
    pub skipped: usize,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub documents: usize,
    pub state: IndexState,
}

#[derive(Clone)]
pub struct AppState {
    pub index: Arc<SearchIndex>,
    pub api_key: Option<Arc<str>>,
}

type ApiError = (StatusCode, String);

pub fn build_app(index: Arc<SearchIndex>, api_key: Option<String>) -> Router {
    let app_state = AppState { index, api_key: api_key.map(Arc::from) };

    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    Router::new()
        .route("/health", get(health_handler))
        .route("/ingest", post(ingest_handler))
        .route("/search", get(search_handler))
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let snapshot = state.index.snapshot();
    Json(HealthResponse { status: "ok", documents: snapshot.corpus().len(), state: snapshot.state() })
}

pub async fn ingest_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(items): Json<Vec<IngestItem>>,
) -> Result<Json<IngestResponse>, ApiError> {
    authorize(&state, &headers)?;
    if items.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "empty payload".into()));
    }
    let index = Arc::clone(&state.index);
    // rebuild and persist are blocking and proportional to corpus size
    let result = tokio::task::spawn_blocking(move || {
        index.add_bulk(items.into_iter().map(|it| (it.id, it.text)))
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("ingestion task failed: {e}")))?;

    match result {
        Ok(report) => {
            tracing::info!(ingested = report.accepted, skipped = report.skipped, "ingest");
            Ok(Json(IngestResponse { ingested: report.accepted, skipped: report.skipped }))
        }
        Err(e) => {
            tracing::error!(error = %e, "ingest failed");
            Err((StatusCode::INTERNAL_SERVER_ERROR, "failed to persist index".into()))
        }
    }
}

pub async fn search_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    authorize(&state, &headers)?;
    if params.q.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "q must not be empty".into()));
    }
    if !(1..=MAX_TOP_K).contains(&params.k) {
        return Err((StatusCode::BAD_REQUEST, format!("k must be between 1 and {MAX_TOP_K}")));
    }
    let start = std::time::Instant::now();
    let results = state.index.query(&params.q, params.k);
    let elapsed = start.elapsed();
    Ok(Json(SearchResponse { query: params.q, took_s: elapsed.as_secs_f64(), total_hits: results.len(), results }))
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let required = match &state.api_key {
        Some(t) => t,
        None => return Err((StatusCode::UNAUTHORIZED, "API_KEY not set".into())),
    };
    let provided = headers.get("X-API-KEY").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == &**required {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, "invalid or missing API key".into()))
    }
}
