//! HTTP surface: a single op-dispatch endpoint plus liveness probes.
//!
//! `POST /api/plan` takes `{op, payload}` and hands it to the core
//! dispatcher; this module is the only place that knows how each
//! [`OpError`] maps to an HTTP status.

use std::net::SocketAddr;

use anyhow::Result;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use sqlx::PgPool;
use tower_http::cors::CorsLayer;

use planvault_core::dispatch::dispatch;
use planvault_core::error::OpError;
use planvault_core::request::OpRequest;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

pub struct AppError {
    status: StatusCode,
    body: Value,
}

impl From<OpError> for AppError {
    fn from(err: OpError) -> Self {
        let (status, body) = match err {
            OpError::MissingOp => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "Missing 'op'" }),
            ),
            OpError::UnknownOp(_) => (StatusCode::BAD_REQUEST, json!({ "error": "UNKNOWN_OP" })),
            OpError::Validation(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            OpError::NotFound => (StatusCode::NOT_FOUND, json!({ "error": "NOT_FOUND" })),
            OpError::SnapshotNotFound { target_version } => (
                StatusCode::NOT_FOUND,
                json!({ "error": "SNAPSHOT_NOT_FOUND", "target_version": target_version }),
            ),
            OpError::VersionConflict { current_version } => (
                StatusCode::CONFLICT,
                json!({ "error": "VERSION_CONFLICT", "current_version": current_version }),
            ),
            OpError::Storage(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": format!("{e:#}") }),
            ),
        };
        Self { status, body }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        (self.status, Json(self.body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(pool: PgPool) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/healthz", get(healthz))
        .route("/api/plan", post(plan_op))
        .layer(CorsLayer::permissive())
        .with_state(pool)
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub async fn run_serve(pool: PgPool, bind: &str, port: u16) -> Result<()> {
    let app = build_router(pool);
    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    tracing::info!("planvault serve listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("planvault serve shut down");
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install Ctrl+C handler");
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn index() -> Json<Value> {
    Json(json!({
        "ok": true,
        "endpoint": "/api/plan",
        "use": "POST with {op,payload}"
    }))
}

async fn healthz() -> Json<Value> {
    Json(json!({ "ok": true }))
}

async fn plan_op(
    State(pool): State<PgPool>,
    Json(req): Json<OpRequest>,
) -> Result<Json<Value>, AppError> {
    let value = dispatch(&pool, req).await?;
    Ok(Json(value))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
