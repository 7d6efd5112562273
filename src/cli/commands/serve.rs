//! HTTP API server for integration with other systems.
//!
//! Provides REST endpoints for routed questions, retrieval, text-to-SQL and
//! CSV uploads.

use crate::backends::Backends;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::error::FinqueryError;
use crate::router::{Assistant, RouteLabel};
use crate::sql::SqliteStore;
use crate::vector_store::{Collection, IndexedSource, RetrievedChunk};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

/// Shared application state.
pub struct AppState {
    assistant: Assistant,
    /// Separate handle on the structured database for CSV uploads.
    uploads: SqliteStore,
}

impl AppState {
    pub fn new(assistant: Assistant, uploads: SqliteStore) -> Self {
        Self { assistant, uploads }
    }
}

/// Run the HTTP API server.
pub async fn run_serve(host: &str, port: u16, settings: Settings) -> anyhow::Result<()> {
    if let Err(e) = preflight::check(Operation::Ask, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'finquery doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let uploads = SqliteStore::new(&settings.structured_sqlite_path())?;
    let backends = Backends::from_settings(settings)?;
    let state = Arc::new(AppState::new(backends.assistant()?, uploads));

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("finquery API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET  /health");
    Output::kv("Ask", "POST /ask");
    Output::kv("Search", "POST /search");
    Output::kv("SQL", "POST /sql");
    Output::kv("Upload CSV", "POST /upload?table=<name>");
    Output::kv("Sources", "GET  /sources/{collection}");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, router(state)).await?;

    Ok(())
}

/// Build the API router.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/ask", post(ask))
        .route("/search", post(search))
        .route("/sql", post(sql))
        .route("/upload", post(upload))
        .route("/sources/{collection}", get(list_sources))
        .layer(cors)
        .with_state(state)
}

// === Request/Response Types ===

#[derive(Deserialize)]
struct AskRequest {
    question: String,
    /// Skip classification.
    #[serde(default)]
    route: Option<RouteLabel>,
}

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    collection: Collection,
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(Serialize)]
struct SearchResponse {
    collection: Collection,
    results: Vec<RetrievedChunk>,
}

#[derive(Deserialize)]
struct SqlRequest {
    question: String,
}

#[derive(Deserialize)]
struct UploadParams {
    #[serde(default = "default_upload_table")]
    table: String,
}

fn default_upload_table() -> String {
    "uploaded_table".to_string()
}

#[derive(Serialize)]
struct SourcesResponse {
    collection: Collection,
    sources: Vec<IndexedSource>,
    total: usize,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(status: StatusCode, error: impl std::fmt::Display) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
        .into_response()
}

fn status_for(error: &FinqueryError) -> StatusCode {
    match error {
        FinqueryError::InvalidInput(_) | FinqueryError::Csv(_) | FinqueryError::SqlRejected(_) => {
            StatusCode::BAD_REQUEST
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// === Handlers ===

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn ask(State(state): State<Arc<AppState>>, Json(req): Json<AskRequest>) -> Response {
    let result = match req.route {
        Some(route) => state.assistant.ask_with_route(&req.question, route).await,
        None => state.assistant.ask(&req.question).await,
    };

    match result {
        Ok(answer) => Json(answer).into_response(),
        Err(e) => error_response(status_for(&e), e),
    }
}

async fn search(State(state): State<Arc<AppState>>, Json(req): Json<SearchRequest>) -> Response {
    let retriever = state.assistant.retriever(req.collection);
    match retriever.search(&req.query, req.limit).await {
        Ok(results) => Json(SearchResponse {
            collection: req.collection,
            results,
        })
        .into_response(),
        Err(e) => error_response(status_for(&e), e),
    }
}

async fn sql(State(state): State<Arc<AppState>>, Json(req): Json<SqlRequest>) -> Response {
    if req.question.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Question is empty");
    }
    Json(state.assistant.sql_agent().answer(req.question.trim()).await).into_response()
}

async fn upload(
    State(state): State<Arc<AppState>>,
    Query(params): Query<UploadParams>,
    body: String,
) -> Response {
    if body.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Request body must contain CSV data");
    }

    let table = params.table;
    let result = tokio::task::spawn_blocking(move || state.uploads.import_csv(body.as_bytes(), &table)).await;

    match result {
        Ok(Ok(summary)) => {
            info!("Imported {} rows into {}", summary.rows_imported, summary.table);
            Json(summary).into_response()
        }
        Ok(Err(e)) => {
            warn!("CSV upload failed: {}", e);
            error_response(status_for(&e), e)
        }
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

async fn list_sources(
    State(state): State<Arc<AppState>>,
    Path(collection): Path<String>,
) -> Response {
    let collection: Collection = match collection.parse() {
        Ok(c) => c,
        Err(e) => return error_response(StatusCode::NOT_FOUND, e),
    };

    match state.assistant.retriever(collection).store().list_sources().await {
        Ok(sources) => Json(SourcesResponse {
            collection,
            total: sources.len(),
            sources,
        })
        .into_response(),
        Err(e) => error_response(status_for(&e), e),
    }
}
