//! Local code execution.
//!
//! Provides the subprocess runner shared with the executor node service and the
//! sandboxed fallback path the dispatcher uses when the remote pool cannot be
//! reached.

use async_trait::async_trait;

use crate::core_types::ExecutionRequest;

pub mod process;
pub mod sandbox;

pub use process::{run_with_timeout, ProcessOutcome};
pub use sandbox::{LocalSandbox, ModuleAllowList, SafeModule, SandboxOutcome};

/// Fallback executor invoked once after remote attempts are exhausted.
///
/// Implementations never fail: setup problems are reported inside the outcome.
#[async_trait]
pub trait LocalExecutor: Send + Sync {
    async fn execute(&self, request: &ExecutionRequest) -> SandboxOutcome;
}
