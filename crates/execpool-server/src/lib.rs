//! HTTP front for the execution engine.
//!
//! Exposes the dispatcher to callers and reports the audit log:
//!
//! - `POST /execute` takes `{code, timeout?}` and returns the caller-facing
//!   output together with where it ran.
//! - `GET /execution-results` lists every audit log entry in storage order.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use execpool_core::errors::AuditLogError;
use execpool_core::{AuditLogEntry, AuditLogStore, Dispatcher, ExecutionRequest, ServedBy};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Audit log error: {0}")]
    Audit(#[from] AuditLogError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn status_code(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            ServerError::Audit(_) => "audit_error",
            ServerError::Config(_) => "config_error",
            ServerError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        log::error!("Request failed: {}", self);
        let body = json!({
            "error": self.to_string(),
            "error_type": self.error_type(),
        });
        (self.status_code(), Json(body)).into_response()
    }
}

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub audit: AuditLogStore,
}

impl AppState {
    pub fn new(dispatcher: Arc<Dispatcher>, audit: AuditLogStore) -> Self {
        Self { dispatcher, audit }
    }
}

#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    pub code: String,
    #[serde(default)]
    pub timeout: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct ExecuteResponse {
    pub execution_id: Uuid,
    pub output: String,
    pub served_by: ServedBy,
}

#[derive(Debug, Serialize)]
pub struct ExecutionResults {
    pub logs: Vec<AuditLogEntry>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/execute", post(execute_handler))
        .route("/execution-results", get(execution_results_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn execute_handler(
    State(state): State<AppState>,
    Json(body): Json<ExecuteRequest>,
) -> Json<ExecuteResponse> {
    let timeout = body
        .timeout
        .unwrap_or(state.dispatcher.config().execution.default_timeout_secs);
    let report = state
        .dispatcher
        .dispatch(ExecutionRequest::new(body.code, timeout))
        .await;

    Json(ExecuteResponse {
        execution_id: report.execution_id,
        output: report.output,
        served_by: report.served_by,
    })
}

async fn execution_results_handler(
    State(state): State<AppState>,
) -> Result<Json<ExecutionResults>, ServerError> {
    let logs = state.audit.list_all().await?;
    Ok(Json(ExecutionResults { logs }))
}

/// Serves `router` on `bind_addr` until `shutdown_signal` resolves.
pub async fn serve_with_shutdown<F>(
    router: Router,
    bind_addr: SocketAddr,
    shutdown_signal: F,
) -> Result<(), ServerError>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(bind_addr)
        .await
        .map_err(|e| ServerError::Config(format!("Failed to bind to {}: {}", bind_addr, e)))?;

    log::info!("Execution server listening on {}", bind_addr);
    log::info!("Execute: POST http://{}/execute", bind_addr);
    log::info!("Audit log: GET http://{}/execution-results", bind_addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .map_err(|e| ServerError::Internal(format!("Server error: {}", e)))?;

    log::info!("Execution server shut down");
    Ok(())
}
