//! Configuration type definitions for the execution engine
//!
//! Every section is optional in YAML and falls back to the same defaults the
//! deployment uses when no file is given, so an empty document is a valid
//! configuration. Once loaded the configuration is treated as read-only and
//! shared behind an `Arc`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ExecPoolConfig {
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub sandbox: SandboxConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PoolConfig {
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    /// Modules the deployment would like installed. Only the intersection with
    /// the built-in safe set is ever honoured.
    #[serde(default = "default_allowed_modules")]
    pub allowed_modules: Vec<String>,
    /// URL of node `n`, with `{index}` substituted by `n`.
    #[serde(default = "default_node_url_template")]
    pub node_url_template: String,
    /// Extra time granted to the HTTP call on top of the execution timeout.
    #[serde(default = "default_request_grace_secs")]
    pub request_grace_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            pool_size: default_pool_size(),
            allowed_modules: default_allowed_modules(),
            node_url_template: default_node_url_template(),
            request_grace_secs: default_request_grace_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionConfig {
    #[serde(default = "default_timeout_secs")]
    pub default_timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

impl ExecutionConfig {
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            default_timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SandboxConfig {
    #[serde(default = "default_python_bin")]
    pub python_bin: String,
    /// Parent of the per-execution work directories. System temp dir if unset.
    #[serde(default)]
    pub work_root: Option<PathBuf>,
    #[serde(default = "default_setup_timeout_secs")]
    pub setup_timeout_secs: u64,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            python_bin: default_python_bin(),
            work_root: None,
            setup_timeout_secs: default_setup_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditConfig {
    #[serde(default = "default_database_url")]
    pub database_url: String,
    /// Also record results served by the local sandbox.
    #[serde(default = "default_true")]
    pub log_fallback: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            log_fallback: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_pool_size() -> usize { 3 }
fn default_allowed_modules() -> Vec<String> {
    ["pandas", "numpy", "matplotlib", "requests"]
        .iter()
        .map(|m| m.to_string())
        .collect()
}
fn default_node_url_template() -> String { "http://executor-{index}:5000".to_string() }
fn default_request_grace_secs() -> u64 { 5 }
fn default_timeout_secs() -> u64 { crate::core_types::DEFAULT_TIMEOUT_SECS }
fn default_max_retries() -> u32 { 2 }
fn default_backoff_ms() -> u64 { 2000 }
fn default_python_bin() -> String { "python3".to_string() }
fn default_setup_timeout_secs() -> u64 { 300 }
fn default_database_url() -> String { "sqlite://execution_log.db".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_true() -> bool { true }
