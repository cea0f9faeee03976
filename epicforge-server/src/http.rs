//! Epicforge HTTP API
//!
//! Axum-based HTTP server for epic generation, lookup and the bundled
//! single-page front-end.
//!
//! Architecture: each endpoint has a thin axum handler that delegates to a pure
//! inner function. The inner functions are directly testable without axum dispatch
//! machinery.
//!
//! Endpoints:
//! - POST /api/generate                         generate and store an epic
//! - GET  /api/generate-ideas?focus=            suggest feature ideas
//! - GET  /api/feature-requests                 list stored requests, newest first
//! - GET  /api/feature-requests/:hash/markdown  stored epic as Markdown
//! - GET  /generated/:hash                      front-end with the epic preloaded
//! - GET  /generated, GET /, GET /static/*      static front-end
//! - GET  /api/health, GET /ping                liveness

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::body::Bytes;
use axum::extract::{ConnectInfo, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse};
use axum::routing::{get, post};
use axum::{Json, Router};
use epicforge_core::config::HttpConfig;
use epicforge_core::models::{Epic, FeatureRequest, FeatureRequestSummary, NewFeatureRequest};
use epicforge_core::{FeatureStore, GenerationBackend, Payload};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::error::{ApiError, ErrorResponse};
use crate::pages::{inject_preloaded_data, StaticSite};

/// Shared state for all HTTP handlers
pub struct HttpState {
    pub store: FeatureStore,
    /// Adapter configured with the epic system prompt.
    pub feature_generator: Arc<dyn GenerationBackend>,
    /// Adapter configured with the ideas system prompt.
    pub ideas_generator: Arc<dyn GenerationBackend>,
    pub site: StaticSite,
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<HttpState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let assets = ServeDir::new(state.site.root());

    Router::new()
        .route("/api/generate", post(generate_handler))
        .route("/api/generate-ideas", get(ideas_handler))
        .route("/api/feature-requests", get(list_handler))
        .route("/api/feature-requests/:hash/markdown", get(markdown_handler))
        .route("/api/health", get(health_handler))
        .route("/ping", get(ping_handler))
        .route("/generated", get(generated_page_handler))
        .route("/generated/:hash", get(preloaded_page_handler))
        .route("/", get(index_handler))
        .nest_service("/static", assets)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    state: Arc<HttpState>,
    config: &HttpConfig,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", config.host, config.port);

    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Epicforge HTTP API listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        let _ = shutdown.recv().await;
        tracing::info!("HTTP server shutting down...");
    })
    .await?;

    Ok(())
}

// ============================================================================
// Request / Response DTOs
// ============================================================================

#[derive(Debug, Deserialize, Default)]
pub struct GenerateRequest {
    pub description: Option<String>,
}

impl GenerateRequest {
    /// Decode a request body regardless of its declared content type.
    pub fn from_body(body: &[u8]) -> Result<Self, ApiError> {
        serde_json::from_slice(body)
            .map_err(|e| ApiError::Validation(format!("Invalid request body: {}", e)))
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct IdeasQuery {
    pub focus: Option<String>,
}

/// Successful generation body: the model's raw text, untouched.
#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub result: String,
}

// ============================================================================
// Inner (directly testable) business logic functions
// ============================================================================

/// Inner generate: validate, call the feature adapter, persist, echo the text.
pub async fn generate_inner(
    state: &HttpState,
    req: GenerateRequest,
    client_ip: String,
) -> Result<GenerateResponse, ApiError> {
    let description = match req.description {
        Some(d) if !d.trim().is_empty() => d,
        _ => return Err(ApiError::Validation("Missing feature description".to_string())),
    };

    tracing::info!(
        backend = state.feature_generator.name(),
        chars = description.len(),
        "Generating epic"
    );

    let result_text = state.feature_generator.generate(&description).await?;

    let record = NewFeatureRequest::from_generation(description, client_ip, result_text.as_str());
    let stored = state.store.insert(record).await?;

    tracing::debug!(
        id = stored.id,
        epic_title = %stored.epic_title,
        "Generation result stored"
    );

    Ok(GenerateResponse {
        result: result_text,
    })
}

/// Inner ideas: call the ideas adapter with `focus: <focus>`; nothing is stored.
pub async fn ideas_inner(
    state: &HttpState,
    query: IdeasQuery,
) -> Result<GenerateResponse, ApiError> {
    let focus = query.focus.unwrap_or_else(|| "none".to_string());
    let message = format!("focus: {}", focus);
    tracing::info!(focus = %focus, "Generating ideas");

    let result = state.ideas_generator.generate(&message).await?;
    Ok(GenerateResponse { result })
}

async fn lookup(state: &HttpState, hash: &str) -> Result<FeatureRequest, ApiError> {
    state
        .store
        .find_by_hash(hash)
        .await?
        .ok_or_else(|| ApiError::NotFound("Feature request not found".to_string()))
}

/// Inner preloaded page: the index template with the stored payload injected.
pub async fn preloaded_page_inner(state: &HttpState, hash: &str) -> Result<String, ApiError> {
    let record = lookup(state, hash).await?;
    let data = Payload::parse(&record.json_response).into_value();

    let template = state.site.read_index().await.map_err(|e| {
        tracing::error!(
            path = %state.site.index_path().display(),
            error = %e,
            "Failed to read index template"
        );
        ApiError::Internal("Index file not found".to_string())
    })?;

    Ok(inject_preloaded_data(&template, &data))
}

/// Inner markdown: stored epic rendered as Markdown.
pub async fn markdown_inner(state: &HttpState, hash: &str) -> Result<String, ApiError> {
    let record = lookup(state, hash).await?;
    let epic = Epic::from_payload(Payload::parse(&record.json_response));
    Ok(epic.to_markdown())
}

/// Inner list: every stored request, newest first.
pub async fn list_inner(state: &HttpState) -> Result<Vec<FeatureRequestSummary>, ApiError> {
    Ok(state.store.list_summaries().await?)
}

/// Inner health: pure, independent of database and adapter state.
pub fn health_inner() -> serde_json::Value {
    serde_json::json!({ "status": "healthy" })
}

pub fn ping_inner() -> serde_json::Value {
    serde_json::json!({ "message": "pong" })
}

// ============================================================================
// Axum handler wrappers (thin, delegate to inner functions)
// ============================================================================

pub async fn generate_handler(
    State(state): State<Arc<HttpState>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    body: Bytes,
) -> Result<Json<GenerateResponse>, ApiError> {
    let req = GenerateRequest::from_body(&body)?;
    let client_ip = connect_info
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_default();
    generate_inner(&state, req, client_ip).await.map(Json)
}

pub async fn ideas_handler(
    State(state): State<Arc<HttpState>>,
    Query(query): Query<IdeasQuery>,
) -> Result<Json<GenerateResponse>, ApiError> {
    ideas_inner(&state, query).await.map(Json)
}

pub async fn list_handler(
    State(state): State<Arc<HttpState>>,
) -> Result<Json<Vec<FeatureRequestSummary>>, ApiError> {
    list_inner(&state).await.map(Json)
}

pub async fn preloaded_page_handler(
    State(state): State<Arc<HttpState>>,
    Path(hash): Path<String>,
) -> Result<Html<String>, ApiError> {
    preloaded_page_inner(&state, &hash).await.map(Html)
}

pub async fn markdown_handler(
    State(state): State<Arc<HttpState>>,
    Path(hash): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let markdown = markdown_inner(&state, &hash).await?;
    Ok((
        [(header::CONTENT_TYPE, "text/markdown; charset=utf-8")],
        markdown,
    ))
}

pub async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(health_inner()))
}

pub async fn ping_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(ping_inner()))
}

pub async fn index_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    match state.site.read_index().await {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            tracing::warn!(path = %state.site.index_path().display(), error = %e, "Index file not found");
            (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse::new("Index file not found")),
            )
                .into_response()
        }
    }
}

pub async fn generated_page_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    match state.site.read_generated().await {
        Ok(html) => Html(html).into_response(),
        Err(_) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("Generated page not found")),
        )
            .into_response(),
    }
}

// ============================================================================
// Unit Tests: call inner functions directly
// ============================================================================
