// src/test_utils/mock_executor_node.rs
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

use crate::core_types::{HealthResponse, NodeExecuteRequest, NodeExecuteResponse};

/// How the mock node answers `POST /execute`.
#[derive(Debug, Clone)]
pub enum MockBehavior {
    Respond {
        stdout: String,
        stderr: String,
        returncode: i32,
    },
    Status(u16),
    Malformed,
}

impl MockBehavior {
    pub fn respond(stdout: &str, stderr: &str, returncode: i32) -> Self {
        MockBehavior::Respond {
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            returncode,
        }
    }
}

#[derive(Clone)]
struct MockNodeState {
    behavior: MockBehavior,
    requests: Arc<Mutex<Vec<NodeExecuteRequest>>>,
}

async fn execute_handler(
    axum::extract::State(state): axum::extract::State<MockNodeState>,
    Json(payload): Json<NodeExecuteRequest>,
) -> Response {
    log::debug!("Mock executor received execution {}", payload.execution_id);
    let execution_id = payload.execution_id.clone();
    state.requests.lock().unwrap().push(payload);

    match state.behavior {
        MockBehavior::Respond {
            stdout,
            stderr,
            returncode,
        } => Json(NodeExecuteResponse {
            execution_id,
            stdout,
            stderr,
            returncode,
            success: returncode == 0,
        })
        .into_response(),
        MockBehavior::Status(code) => {
            let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, "mock executor failure").into_response()
        }
        MockBehavior::Malformed => (StatusCode::OK, "this is not json").into_response(),
    }
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        executor_id: "mock".to_string(),
    })
}

pub struct MockExecutorNode {
    addr: SocketAddr,
    shutdown_tx: tokio::sync::oneshot::Sender<()>,
    pub recorded_requests: Arc<Mutex<Vec<NodeExecuteRequest>>>,
}

impl MockExecutorNode {
    pub async fn start(behavior: MockBehavior) -> Self {
        let state = MockNodeState {
            behavior,
            requests: Arc::new(Mutex::new(Vec::new())),
        };
        let recorded_requests = state.requests.clone();

        let app = Router::new()
            .route("/execute", post(execute_handler))
            .route("/health", get(health_handler))
            .with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap_or_else(|e| {
            panic!("Failed to bind mock executor to 127.0.0.1:0. Error: {}", e);
        });
        let addr = listener.local_addr().unwrap();
        log::info!("Mock executor node listening on {}", addr);

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap_or_else(|e| {
                    log::error!("Mock executor node error: {}", e);
                });
        });

        MockExecutorNode {
            addr,
            shutdown_tx,
            recorded_requests,
        }
    }

    pub fn address(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn request_count(&self) -> usize {
        self.recorded_requests.lock().unwrap().len()
    }

    pub async fn shutdown(self) {
        if self.shutdown_tx.send(()).is_err() {
            log::warn!("Mock executor shutdown signal already sent or receiver dropped.");
        }
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
    }
}

/// An address nothing is listening on: the port was bound and released.
pub fn refused_address() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}
