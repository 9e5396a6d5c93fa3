//! Local sandbox used when no executor node can be reached.
//!
//! Every execution gets its own throwaway directory holding the snippet and a
//! fresh virtual environment. Only modules from the built-in safe set are ever
//! installed into it: the configured list can narrow that set but never widen
//! it. The directory is a `TempDir` handle, so it is removed on every exit path,
//! including cancellation of the surrounding task.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::{Builder, TempDir};
use tokio::process::Command;
use uuid::Uuid;

use super::process::{run_with_timeout, ProcessOutcome};
use super::LocalExecutor;
use crate::config::SandboxConfig;
use crate::core_types::{timeout_message, ExecutionRequest, ExecutionResult};
use crate::errors::SandboxError;

const SCRIPT_NAME: &str = "code.py";
const VENV_DIR: &str = "venv";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SafeModule {
    Pandas,
    Numpy,
    Matplotlib,
    Requests,
    ScikitLearn,
}

impl SafeModule {
    pub const ALL: [SafeModule; 5] = [
        SafeModule::Pandas,
        SafeModule::Numpy,
        SafeModule::Matplotlib,
        SafeModule::Requests,
        SafeModule::ScikitLearn,
    ];

    pub fn package_name(&self) -> &'static str {
        match self {
            SafeModule::Pandas => "pandas",
            SafeModule::Numpy => "numpy",
            SafeModule::Matplotlib => "matplotlib",
            SafeModule::Requests => "requests",
            SafeModule::ScikitLearn => "scikit-learn",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL.iter().copied().find(|m| m.package_name() == name)
    }
}

/// Modules that may be installed: configured names intersected with `SafeModule`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleAllowList {
    modules: Vec<SafeModule>,
}

impl ModuleAllowList {
    /// Keeps configured order, drops unknown names and duplicates.
    pub fn intersect<I, S>(configured: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut modules = Vec::new();
        for name in configured {
            match SafeModule::from_name(name.as_ref()) {
                Some(module) if !modules.contains(&module) => modules.push(module),
                Some(_) => {}
                None => log::debug!(
                    "Ignoring module '{}': not in the sandbox safe set",
                    name.as_ref()
                ),
            }
        }
        Self { modules }
    }

    pub fn modules(&self) -> &[SafeModule] {
        &self.modules
    }

    pub fn package_names(&self) -> Vec<&'static str> {
        self.modules.iter().map(SafeModule::package_name).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

/// Terminal result of a sandbox run. Never retried by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SandboxOutcome {
    Completed(ExecutionResult),
    TimedOut { execution_id: Uuid, seconds: u64 },
    SetupFailed { execution_id: Uuid, message: String },
}

impl SandboxOutcome {
    pub fn render(&self) -> String {
        match self {
            SandboxOutcome::Completed(result) => result.render_output(),
            SandboxOutcome::TimedOut { seconds, .. } => format!("{}.", timeout_message(*seconds)),
            SandboxOutcome::SetupFailed { message, .. } => message.clone(),
        }
    }

    /// The outcome expressed as a result record, for auditing.
    pub fn to_result(&self) -> ExecutionResult {
        match self {
            SandboxOutcome::Completed(result) => result.clone(),
            SandboxOutcome::TimedOut {
                execution_id,
                seconds,
            } => ExecutionResult::timed_out(*execution_id, *seconds),
            SandboxOutcome::SetupFailed {
                execution_id,
                message,
            } => ExecutionResult {
                execution_id: *execution_id,
                stdout: String::new(),
                stderr: message.clone(),
                return_code: -1,
                success: false,
            },
        }
    }
}

pub struct LocalSandbox {
    config: SandboxConfig,
    allow_list: ModuleAllowList,
}

impl LocalSandbox {
    pub fn new(config: SandboxConfig, allowed_modules: &[String]) -> Self {
        let allow_list = ModuleAllowList::intersect(allowed_modules);
        log::debug!(
            "Local sandbox will install: {:?}",
            allow_list.package_names()
        );
        Self { config, allow_list }
    }

    pub fn allow_list(&self) -> &ModuleAllowList {
        &self.allow_list
    }

    fn setup_timeout(&self) -> Duration {
        Duration::from_secs(self.config.setup_timeout_secs)
    }

    fn create_workspace(&self, execution_id: Uuid) -> Result<TempDir, SandboxError> {
        let prefix = format!("code_exec_{}_", execution_id);
        let mut builder = Builder::new();
        builder.prefix(&prefix);
        match &self.config.work_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .map_err(SandboxError::WorkspaceCreation)
    }

    async fn run_in_workspace(
        &self,
        workspace: &Path,
        request: &ExecutionRequest,
    ) -> Result<SandboxOutcome, SandboxError> {
        let script = workspace.join(SCRIPT_NAME);
        tokio::fs::write(&script, request.code.as_bytes())
            .await
            .map_err(SandboxError::ScriptWrite)?;

        let venv = workspace.join(VENV_DIR);
        self.create_venv(&venv).await?;
        self.install_modules(&venv).await;

        log::info!(
            "Executing code locally for execution {}",
            request.execution_id
        );
        let mut cmd = Command::new(venv_bin(&venv, "python"));
        cmd.arg(&script).current_dir(workspace);

        let outcome = run_with_timeout(cmd, Duration::from_secs(request.timeout_seconds))
            .await
            .map_err(SandboxError::Spawn)?;

        Ok(match outcome {
            ProcessOutcome::Exited {
                stdout,
                stderr,
                return_code,
            } => SandboxOutcome::Completed(ExecutionResult {
                execution_id: request.execution_id,
                stdout,
                stderr,
                return_code,
                success: return_code == 0,
            }),
            ProcessOutcome::TimedOut => SandboxOutcome::TimedOut {
                execution_id: request.execution_id,
                seconds: request.timeout_seconds,
            },
        })
    }

    async fn create_venv(&self, venv: &Path) -> Result<(), SandboxError> {
        let mut cmd = Command::new(&self.config.python_bin);
        cmd.arg("-m").arg("venv").arg(venv);

        match run_with_timeout(cmd, self.setup_timeout()).await {
            Ok(ProcessOutcome::Exited { return_code: 0, .. }) => Ok(()),
            Ok(ProcessOutcome::Exited { stderr, .. }) => {
                Err(SandboxError::EnvironmentCreation(stderr))
            }
            Ok(ProcessOutcome::TimedOut) => Err(SandboxError::SetupTimeout {
                step: "venv",
                seconds: self.config.setup_timeout_secs,
            }),
            Err(e) => Err(SandboxError::EnvironmentCreation(e.to_string())),
        }
    }

    async fn install_modules(&self, venv: &Path) {
        if self.allow_list.is_empty() {
            return;
        }

        let packages = self.allow_list.package_names();
        let mut cmd = Command::new(venv_bin(venv, "pip"));
        cmd.arg("install").args(&packages);

        // A failed install still lets the snippet run; it may not need them.
        match run_with_timeout(cmd, self.setup_timeout()).await {
            Ok(ProcessOutcome::Exited { return_code: 0, .. }) => {
                log::debug!("Installed sandbox modules: {:?}", packages);
            }
            Ok(ProcessOutcome::Exited {
                stderr,
                return_code,
                ..
            }) => {
                log::warn!(
                    "pip install exited with {} in sandbox: {}",
                    return_code,
                    stderr.trim()
                );
            }
            Ok(ProcessOutcome::TimedOut) => {
                log::warn!(
                    "pip install timed out after {} seconds",
                    self.config.setup_timeout_secs
                );
            }
            Err(e) => log::warn!("Could not run pip in sandbox: {}", e),
        }
    }
}

#[async_trait]
impl LocalExecutor for LocalSandbox {
    async fn execute(&self, request: &ExecutionRequest) -> SandboxOutcome {
        let workspace = match self.create_workspace(request.execution_id) {
            Ok(dir) => dir,
            Err(e) => {
                log::error!("Error executing code locally: {}", e);
                return setup_failed(request.execution_id, &e);
            }
        };

        let outcome = match self.run_in_workspace(workspace.path(), request).await {
            Ok(outcome) => outcome,
            Err(e) => {
                log::error!("Error executing code locally: {}", e);
                setup_failed(request.execution_id, &e)
            }
        };

        if let Err(e) = workspace.close() {
            log::error!("Error during sandbox cleanup: {}", e);
        }

        outcome
    }
}

fn setup_failed(execution_id: Uuid, err: &SandboxError) -> SandboxOutcome {
    let message = match err {
        SandboxError::EnvironmentCreation(_) | SandboxError::SetupTimeout { step: "venv", .. } => {
            "Failed to create virtual environment for code execution.".to_string()
        }
        other => format!("Error executing code: {}", other),
    };
    SandboxOutcome::SetupFailed {
        execution_id,
        message,
    }
}

fn venv_bin(venv: &Path, tool: &str) -> PathBuf {
    if cfg!(windows) {
        venv.join("Scripts").join(format!("{}.exe", tool))
    } else {
        venv.join("bin").join(tool)
    }
}
