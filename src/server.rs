//! HTTP API for the portal backend.
//!
//! Serves the three core operations over JSON so the management portal can
//! call them without linking this crate.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/documents/{id}/ingest` | Chunk and embed a document |
//! | `GET`  | `/documents/{id}/embedding-status` | Derived embedding progress |
//! | `POST` | `/search` | Hybrid retrieval over all indexed chunks |
//! | `GET`  | `/health` | Health check (returns name and version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `upstream` (502),
//! `internal` (500). A partial embedding run answers 207 with the same
//! report body as a full success, so callers can always distinguish the
//! three outcomes.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::embedding::EmbeddingProvider;
use crate::ingest;
use crate::models::EmbedOutcome;
use crate::search::{hybrid_search, SearchParams};
use crate::store::Store;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    store: Arc<dyn Store>,
    provider: Arc<dyn EmbeddingProvider>,
}

/// Start the HTTP server on `[server].bind`.
///
/// Runs until the process is terminated.
pub async fn run_server(
    config: &Config,
    store: Arc<dyn Store>,
    provider: Arc<dyn EmbeddingProvider>,
) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();

    let state = AppState {
        config: Arc::new(config.clone()),
        store,
        provider,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/documents/{id}/ingest", post(handle_ingest))
        .route(
            "/documents/{id}/embedding-status",
            get(handle_embedding_status),
        )
        .route("/search", post(handle_search))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    println!("API server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Handlers ============

async fn handle_ingest(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let report = ingest::run_ingest(
        state.store.as_ref(),
        state.provider.as_ref(),
        &state.config,
        &id,
    )
    .await
    .map_err(classify_error)?;

    let status = match report.outcome() {
        EmbedOutcome::Success => StatusCode::OK,
        EmbedOutcome::Partial => StatusCode::MULTI_STATUS,
        EmbedOutcome::Failure => StatusCode::BAD_GATEWAY,
    };

    Ok((status, Json(report)).into_response())
}

async fn handle_embedding_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let status = ingest::embedding_status(state.store.as_ref(), &id)
        .await
        .map_err(classify_error)?;

    Ok(Json(status).into_response())
}

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
}

async fn handle_search(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Result<Response, AppError> {
    let params = SearchParams::from(&state.config.retrieval);
    let results = hybrid_search(
        state.store.as_ref(),
        state.provider.as_ref(),
        &req.query,
        &params,
    )
    .await
    .map_err(classify_error)?;

    Ok(Json(results).into_response())
}

#[derive(Serialize)]
struct HealthResponse {
    name: &'static str,
    version: &'static str,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============ Error response ============

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`, `"not_found"`).
    code: String,
    /// Human-readable error message.
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

/// Maps pipeline errors to the most appropriate HTTP status: missing
/// documents → 404, validation errors → 400, everything else is treated
/// as an upstream provider failure → 502.
fn classify_error(err: anyhow::Error) -> AppError {
    let message = format!("{:#}", err);

    if message.contains("not found") {
        AppError {
            status: StatusCode::NOT_FOUND,
            code: "not_found".to_string(),
            message,
        }
    } else if message.contains("must not be empty") || message.contains("Unknown") {
        AppError {
            status: StatusCode::BAD_REQUEST,
            code: "bad_request".to_string(),
            message,
        }
    } else {
        AppError {
            status: StatusCode::BAD_GATEWAY,
            code: "upstream".to_string(),
            message,
        }
    }
}
