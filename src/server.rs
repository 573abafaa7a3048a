//! HTTP query entry point.
//!
//! A thin axum layer over the retrieval state machine. The indexing
//! pipeline is invisible from here: at worst a file is temporarily missing
//! from the index until the next successful pass.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/retrieve` | Answer a question against a project index |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! Failures always carry an empty JSON array body — internal errors are
//! logged, never surfaced. Empty question or unknown project → 400;
//! everything else → 500.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::config::Config;
use crate::index::DocumentSearch;
use crate::llm::RetrievalModel;
use crate::retrieval;
use crate::scan;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub search: Arc<dyn DocumentSearch>,
    pub model: Arc<dyn RetrievalModel>,
}

pub async fn run_server(
    config: &Config,
    search: Arc<dyn DocumentSearch>,
    model: Arc<dyn RetrievalModel>,
) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let state = AppState {
        config: Arc::new(config.clone()),
        search,
        model,
    };

    let app = router(state);

    info!(bind = %bind_addr, "query server listening");
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/retrieve", post(handle_retrieve))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

/// Failures respond with an empty result array and a status code; the
/// message only goes to the log.
pub struct AppError {
    status: StatusCode,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, Json(Vec::<RetrieveResult>::new())).into_response()
    }
}

fn bad_request() -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
    }
}

fn internal_error() -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /api/retrieve ============

#[derive(Deserialize)]
pub struct RetrieveRequest {
    pub question: String,
    #[serde(rename = "projectId")]
    pub project_id: String,
}

#[derive(Serialize)]
pub struct RetrieveResult {
    pub contents: Vec<String>,
    pub title: String,
    pub description: String,
    pub project: String,
}

pub async fn handle_retrieve(
    State(state): State<AppState>,
    Json(req): Json<RetrieveRequest>,
) -> Result<Json<Vec<RetrieveResult>>, AppError> {
    if req.question.trim().is_empty() || req.project_id.trim().is_empty() {
        return Err(bad_request());
    }

    let project_path = state.config.indexing.projects_root.join(&req.project_id);
    if !project_path.is_dir() {
        return Err(bad_request());
    }

    let file_paths = scan::list_files(&project_path, &state.config.indexing.exclude_globs)
        .map_err(|e| {
            error!(project = %req.project_id, error = %e, "project scan failed");
            internal_error()
        })?;

    let outcome = retrieval::run(
        state.search.as_ref(),
        state.model.as_ref(),
        &state.config.retrieval,
        &req.project_id,
        &req.question,
        file_paths,
    )
    .await
    .map_err(|e| {
        error!(project = %req.project_id, error = %e, "retrieval failed");
        internal_error()
    })?;

    info!(
        project = %req.project_id,
        documents = outcome.documents.len(),
        sufficient = outcome.sufficient,
        "retrieve complete"
    );

    Ok(Json(
        outcome
            .documents
            .into_iter()
            .map(|doc| RetrieveResult {
                contents: vec![doc.content],
                title: doc.file_path.clone(),
                description: doc.file_path,
                project: req.project_id.clone(),
            })
            .collect(),
    ))
}
