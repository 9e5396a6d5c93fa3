//! Executor node: a small HTTP service that runs one snippet per request.
//!
//! A pool of these sits behind the dispatcher, addressed as `executor-1` to
//! `executor-N`. Each node exposes two routes:
//!
//! - `POST /execute` runs `{code, execution_id, timeout}` and always answers
//!   200 with `{execution_id, stdout, stderr, returncode, success}`, even when
//!   the program failed or timed out.
//! - `GET /health` answers `{status: "healthy", executor_id}`.

pub mod error;
pub mod runner;

pub use error::{NodeError, Result};
pub use runner::CodeRunner;

use axum::extract::State;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use execpool_core::core_types::{HealthResponse, NodeExecuteRequest, NodeExecuteResponse};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

pub const ENV_EXECUTOR_ID: &str = "EXECUTOR_ID";

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub bind_addr: SocketAddr,
    /// Reported by `/health`
    pub executor_id: String,
    pub python_bin: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 5000)),
            executor_id: std::env::var(ENV_EXECUTOR_ID).unwrap_or_else(|_| "unknown".to_string()),
            python_bin: "python3".to_string(),
        }
    }
}

impl NodeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bind_addr(mut self, addr: impl Into<SocketAddr>) -> Self {
        self.bind_addr = addr.into();
        self
    }

    pub fn with_executor_id(mut self, executor_id: impl Into<String>) -> Self {
        self.executor_id = executor_id.into();
        self
    }

    pub fn with_python_bin(mut self, python_bin: impl Into<String>) -> Self {
        self.python_bin = python_bin.into();
        self
    }
}

#[derive(Clone)]
struct NodeState {
    executor_id: Arc<str>,
    runner: Arc<CodeRunner>,
}

pub struct NodeServer {
    config: NodeConfig,
    runner: CodeRunner,
}

impl NodeServer {
    pub fn new(config: NodeConfig) -> Self {
        let runner = CodeRunner::new(config.python_bin.clone());
        Self { config, runner }
    }

    /// Replaces the runner built from the config, e.g. to redirect scratch files.
    pub fn with_runner(mut self, runner: CodeRunner) -> Self {
        self.runner = runner;
        self
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn build_router(&self) -> Router {
        let state = NodeState {
            executor_id: Arc::from(self.config.executor_id.as_str()),
            runner: Arc::new(self.runner.clone()),
        };

        Router::new()
            .route("/execute", post(execute_handler))
            .route("/health", get(health_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    pub async fn serve(self) -> Result<()> {
        self.serve_with_shutdown(std::future::pending::<()>()).await
    }

    /// Serves until `shutdown_signal` resolves, letting in-flight executions finish.
    pub async fn serve_with_shutdown<F>(self, shutdown_signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let router = self.build_router();
        let listener = TcpListener::bind(self.config.bind_addr)
            .await
            .map_err(|e| {
                NodeError::config_error(format!(
                    "Failed to bind to {}: {}",
                    self.config.bind_addr, e
                ))
            })?;

        log::info!(
            "Executor node {} listening on {} (interpreter: {})",
            self.config.executor_id,
            self.config.bind_addr,
            self.runner.python_bin()
        );

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| NodeError::internal(format!("Server error: {}", e)))?;

        log::info!("Executor node {} shut down", self.config.executor_id);
        Ok(())
    }
}

async fn execute_handler(
    State(state): State<NodeState>,
    Json(request): Json<NodeExecuteRequest>,
) -> Json<NodeExecuteResponse> {
    Json(state.runner.run(&request).await)
}

async fn health_handler(State(state): State<NodeState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        executor_id: state.executor_id.to_string(),
    })
}

/// Resolves on Ctrl+C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            log::info!("Received Ctrl+C, shutting down...");
        },
        _ = terminate => {
            log::info!("Received SIGTERM, shutting down...");
        },
    }
}
