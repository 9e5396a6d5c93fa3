//! Core type definitions for the execution protocol
//!
//! These types are the contract between the dispatcher, the executor nodes and
//! the local sandbox. The `Node*` structs are the JSON wire format spoken over
//! HTTP; `ExecutionRequest` and `ExecutionResult` are what the engine passes
//! around internally.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::TransportError;

pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// One logical execution. The same `execution_id` is reused for every attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRequest {
    pub execution_id: Uuid,
    pub code: String,
    pub timeout_seconds: u64,
}

impl ExecutionRequest {
    pub fn new(code: impl Into<String>, timeout_seconds: u64) -> Self {
        Self {
            execution_id: Uuid::new_v4(),
            code: code.into(),
            timeout_seconds,
        }
    }

    pub fn to_wire(&self) -> NodeExecuteRequest {
        NodeExecuteRequest {
            code: self.code.clone(),
            execution_id: self.execution_id.to_string(),
            timeout: self.timeout_seconds,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionResult {
    pub execution_id: Uuid,
    pub stdout: String,
    pub stderr: String,
    pub return_code: i32,
    pub success: bool,
}

impl ExecutionResult {
    pub fn timed_out(execution_id: Uuid, timeout_seconds: u64) -> Self {
        Self {
            execution_id,
            stdout: String::new(),
            stderr: timeout_message(timeout_seconds),
            return_code: -1,
            success: false,
        }
    }

    /// Caller-facing text for this result.
    pub fn render_output(&self) -> String {
        format_output(&self.stdout, &self.stderr)
    }
}

pub fn timeout_message(timeout_seconds: u64) -> String {
    format!("Execution timed out after {} seconds", timeout_seconds)
}

/// Joins stdout and stderr the way callers expect to read them. Stdout alone is
/// returned untouched when there is nothing on stderr.
pub fn format_output(stdout: &str, stderr: &str) -> String {
    if stderr.is_empty() {
        stdout.to_string()
    } else {
        format!("Output:\n{}\n\nWarnings/Errors:\n{}", stdout, stderr)
    }
}

/// Body of `POST /execute`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeExecuteRequest {
    pub code: String,
    pub execution_id: String,
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// Response of `POST /execute`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeExecuteResponse {
    pub execution_id: String,
    pub stdout: String,
    pub stderr: String,
    pub returncode: i32,
    pub success: bool,
}

impl NodeExecuteResponse {
    pub fn into_result(self, execution_id: Uuid) -> ExecutionResult {
        if self.execution_id != execution_id.to_string() {
            log::debug!(
                "Executor echoed execution id {} for request {}",
                self.execution_id,
                execution_id
            );
        }
        ExecutionResult {
            execution_id,
            stdout: self.stdout,
            stderr: self.stderr,
            return_code: self.returncode,
            success: self.success,
        }
    }
}

/// Response of `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthResponse {
    pub status: String,
    pub executor_id: String,
}

/// A structurally valid reply from an executor node, whatever the program did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeReply {
    pub status_code: u16,
    pub result: ExecutionResult,
}

/// Outcome of a single remote attempt. Only `Transport` is retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Transport(TransportError),
    Completed(NodeReply),
}
