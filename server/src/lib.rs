use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use webindex_core::tokenizer::Analyzer;
use webindex_core::{Error, Index, Store, TermCounter};

pub type SharedIndex = Arc<Index<Box<dyn Store>>>;

#[derive(Clone)]
pub struct AppState {
    pub index: SharedIndex,
    pub analyzer: Analyzer,
    pub admin_token: Option<String>,
}

#[derive(Deserialize)]
pub struct TermParams {
    /// Look the term up exactly as given.
    #[serde(default)]
    pub raw: bool,
}

#[derive(Deserialize)]
pub struct CountParams {
    pub url: String,
    pub term: String,
    #[serde(default)]
    pub raw: bool,
}

#[derive(Deserialize)]
pub struct UrlParams {
    pub url: String,
}

#[derive(Deserialize)]
pub struct PageUpload {
    pub url: String,
    pub text: String,
}

#[derive(Serialize)]
pub struct UrlsResponse {
    pub term: String,
    pub urls: Vec<String>,
}

#[derive(Serialize)]
pub struct CountsResponse {
    pub term: String,
    pub counts: BTreeMap<String, u64>,
}

#[derive(Serialize)]
pub struct CountResponse {
    pub url: String,
    pub term: String,
    pub count: u64,
}

#[derive(Serialize)]
pub struct IndexedResponse {
    pub url: String,
    pub indexed: bool,
}

#[derive(Serialize)]
pub struct PageIndexed {
    pub url: String,
    pub terms: usize,
}

/// Errors a handler can answer with.
#[derive(Debug)]
pub enum ApiError {
    Index(Error),
    BadRequest(String),
    Unauthorized(&'static str),
    Internal(String),
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError::Index(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Index(e) => {
                let status = match &e {
                    Error::TermNotFound { .. } => StatusCode::NOT_FOUND,
                    Error::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                    Error::MalformedRecord { .. } | Error::InvalidConfig(_) | Error::Io(_) => {
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                if status.is_server_error() {
                    tracing::error!(error = %e, "index request failed");
                }
                (status, e.to_string())
            }
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, m.to_string()),
            ApiError::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, m),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

pub fn build_app(index: SharedIndex, admin_token: Option<String>) -> Router {
    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val.split(',').filter_map(|s| s.trim().parse().ok()).collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    let state = AppState { index, analyzer: Analyzer::default(), admin_token };
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/indexed", get(indexed_handler))
        .route("/count", get(count_handler))
        .route("/terms/:term/urls", get(urls_handler))
        .route("/terms/:term/counts", get(counts_handler))
        .route("/pages", post(index_page_handler))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Run a store call off the async workers; every index call blocks on the store.
async fn blocking<T, F>(index: &SharedIndex, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&Index<Box<dyn Store>>) -> webindex_core::Result<T> + Send + 'static,
{
    let index = index.clone();
    tokio::task::spawn_blocking(move || f(&index))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(ApiError::from)
}

fn query_term(state: &AppState, term: &str, raw: bool) -> Result<String, ApiError> {
    if raw {
        return Ok(term.to_string());
    }
    state
        .analyzer
        .normalize(term)
        .ok_or_else(|| ApiError::BadRequest(format!("{term:?} is not an indexable term")))
}

pub async fn indexed_handler(
    State(state): State<AppState>,
    Query(params): Query<UrlParams>,
) -> Result<Json<IndexedResponse>, ApiError> {
    let url = params.url;
    let probe = url.clone();
    let indexed = blocking(&state.index, move |idx| idx.is_indexed(&probe)).await?;
    Ok(Json(IndexedResponse { url, indexed }))
}

pub async fn urls_handler(
    State(state): State<AppState>,
    Path(term): Path<String>,
    Query(params): Query<TermParams>,
) -> Result<Json<UrlsResponse>, ApiError> {
    let term = query_term(&state, &term, params.raw)?;
    let lookup = term.clone();
    let urls = blocking(&state.index, move |idx| idx.urls_for_term(&lookup)).await?;
    Ok(Json(UrlsResponse { term, urls: urls.into_iter().collect() }))
}

pub async fn counts_handler(
    State(state): State<AppState>,
    Path(term): Path<String>,
    Query(params): Query<TermParams>,
) -> Result<Json<CountsResponse>, ApiError> {
    let term = query_term(&state, &term, params.raw)?;
    let lookup = term.clone();
    let counts = blocking(&state.index, move |idx| idx.counts_for_term(&lookup)).await?;
    Ok(Json(CountsResponse { term, counts }))
}

pub async fn count_handler(
    State(state): State<AppState>,
    Query(params): Query<CountParams>,
) -> Result<Json<CountResponse>, ApiError> {
    let term = query_term(&state, &params.term, params.raw)?;
    let (url, lookup) = (params.url.clone(), term.clone());
    let count = blocking(&state.index, move |idx| idx.count_at(&url, &lookup)).await?;
    Ok(Json(CountResponse { url: params.url, term, count }))
}

pub async fn index_page_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(page): Json<PageUpload>,
) -> Result<Json<PageIndexed>, ApiError> {
    authorize(&state, &headers)?;
    if page.url.trim().is_empty() {
        return Err(ApiError::BadRequest("url must not be empty".into()));
    }
    let mut terms = TermCounter::new(page.url.clone());
    terms.process_text(&page.text, &state.analyzer);
    let n = terms.len();
    let url = page.url.clone();
    blocking(&state.index, move |idx| idx.index_page(&url, &terms)).await?;
    tracing::info!(url = %page.url, terms = n, "page indexed via api");
    Ok(Json(PageIndexed { url: page.url, terms: n }))
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err(ApiError::Unauthorized("ADMIN_TOKEN not set")),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err(ApiError::Unauthorized("invalid admin token"))
    }
}
