//! Runs one snippet under the node's interpreter.
//!
//! The code is written to a throwaway `.py` file that is removed when the run
//! ends, whatever the outcome. Every failure is folded into the response body:
//! a timeout or spawn error yields `returncode: -1` rather than an HTTP error.

use execpool_core::core_types::{timeout_message, NodeExecuteRequest, NodeExecuteResponse};
use execpool_core::executors::{run_with_timeout, ProcessOutcome};
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;

#[derive(Debug, Clone)]
pub struct CodeRunner {
    python_bin: String,
    scratch_dir: Option<PathBuf>,
}

impl CodeRunner {
    pub fn new(python_bin: impl Into<String>) -> Self {
        Self {
            python_bin: python_bin.into(),
            scratch_dir: None,
        }
    }

    /// Directory for the temporary script files. Defaults to the system temp dir.
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    pub fn python_bin(&self) -> &str {
        &self.python_bin
    }

    pub async fn run(&self, request: &NodeExecuteRequest) -> NodeExecuteResponse {
        log::info!(
            "Executing {} (timeout {}s)",
            request.execution_id,
            request.timeout
        );

        let response = match self.run_script(request).await {
            Ok(ProcessOutcome::Exited {
                stdout,
                stderr,
                return_code,
            }) => NodeExecuteResponse {
                execution_id: request.execution_id.clone(),
                stdout,
                stderr,
                returncode: return_code,
                success: return_code == 0,
            },
            Ok(ProcessOutcome::TimedOut) => {
                self.failure(request, timeout_message(request.timeout))
            }
            Err(e) => {
                log::error!("Failed to run {}: {}", request.execution_id, e);
                self.failure(request, format!("Error executing code: {}", e))
            }
        };

        log::info!(
            "Execution {} finished with return code {}",
            request.execution_id,
            response.returncode
        );
        response
    }

    async fn run_script(&self, request: &NodeExecuteRequest) -> std::io::Result<ProcessOutcome> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("code_exec_").suffix(".py");
        let script = match &self.scratch_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        tokio::fs::write(script.path(), &request.code).await?;

        let mut command = Command::new(&self.python_bin);
        command.arg(script.path());
        run_with_timeout(command, Duration::from_secs(request.timeout)).await
    }

    fn failure(&self, request: &NodeExecuteRequest, stderr: String) -> NodeExecuteResponse {
        NodeExecuteResponse {
            execution_id: request.execution_id.clone(),
            stdout: String::new(),
            stderr,
            returncode: -1,
            success: false,
        }
    }
}
