//! Code execution orchestration for machine-generated snippets.
//!
//! This crate runs untrusted code snippets on a pool of remote executor nodes,
//! falling back to a locally sandboxed interpreter when the pool cannot be
//! reached, and keeps an append-only audit log of every terminal outcome.
//!
//! # Architecture Overview
//!
//! - **Dispatcher**: node selection, retry with backoff on transport failures,
//!   single local fallback, audit logging
//! - **Pool access**: node addressing, HTTP transport and health probing
//! - **Local execution**: timeout-bounded subprocesses and the disposable
//!   virtual-environment sandbox
//! - **Audit log**: SQLite-backed write-once record of executions
//! - **Configuration**: YAML plus environment overrides, immutable after load

pub mod audit;
pub mod config;
pub mod core_types;
pub mod dispatcher;
pub mod errors;
pub mod executors;
pub mod pool;

pub use audit::{AuditLogEntry, AuditLogStore};
pub use config::*;
pub use core_types::{ExecutionRequest, ExecutionResult};
pub use dispatcher::{DispatchReport, Dispatcher, RetryPolicy, ServedBy};
pub use errors::{ExecPoolError, TransportError};
pub use executors::{LocalExecutor, LocalSandbox};

#[cfg(test)]
pub mod test_utils;
