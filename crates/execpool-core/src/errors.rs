//! Error types for the execution orchestration engine
//!
//! Failures are grouped by where they originate so the dispatcher can decide
//! what to do with them. Transport failures are the only retryable class;
//! everything produced by the executed program itself is a terminal result
//! and never appears here.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecPoolError {
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Infrastructure-level failure talking to an executor node.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("could not connect to {url}: {message}")]
    Connect { url: String, message: String },
    #[error("executor returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed executor response: {0}")]
    MalformedBody(String),
    #[error("request to {url} timed out")]
    Timeout { url: String },
}

impl TransportError {
    pub fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout {
                url: url.to_string(),
            }
        } else if err.is_decode() {
            TransportError::MalformedBody(err.to_string())
        } else {
            TransportError::Connect {
                url: url.to_string(),
                message: err.to_string(),
            }
        }
    }
}

// Specific error for the local sandbox environment build
#[derive(Error, Debug)]
pub enum SandboxError {
    #[error("Could not create sandbox work directory: {0}")]
    WorkspaceCreation(std::io::Error),
    #[error("Could not write snippet to sandbox: {0}")]
    ScriptWrite(std::io::Error),
    #[error("Virtual environment creation failed: {0}")]
    EnvironmentCreation(String),
    #[error("Sandbox setup step '{step}' timed out after {seconds} seconds")]
    SetupTimeout { step: &'static str, seconds: u64 },
    #[error("Could not spawn interpreter: {0}")]
    Spawn(std::io::Error),
}

#[derive(Error, Debug)]
pub enum AuditLogError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("corrupt audit row {id}: {message}")]
    CorruptRow { id: i64, message: String },
}
