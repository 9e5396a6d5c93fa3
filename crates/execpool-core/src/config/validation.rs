//! Sanity checks applied after a configuration has been assembled.

use super::types::ExecPoolConfig;
use crate::errors::ExecPoolError;

pub const INDEX_PLACEHOLDER: &str = "{index}";

impl ExecPoolConfig {
    pub fn validate(&self) -> Result<(), ExecPoolError> {
        if self.pool.pool_size == 0 {
            return Err(ExecPoolError::ConfigError(
                "Executor pool size must be greater than 0".to_string(),
            ));
        }

        if !self.pool.node_url_template.contains(INDEX_PLACEHOLDER) {
            return Err(ExecPoolError::ConfigError(format!(
                "Node URL template '{}' must contain {}",
                self.pool.node_url_template, INDEX_PLACEHOLDER
            )));
        }

        if self.execution.default_timeout_secs == 0 {
            return Err(ExecPoolError::ConfigError(
                "Default execution timeout must be greater than 0".to_string(),
            ));
        }

        if self.sandbox.python_bin.trim().is_empty() {
            return Err(ExecPoolError::ConfigError(
                "Sandbox python binary cannot be empty".to_string(),
            ));
        }

        if self.audit.database_url.is_empty() {
            return Err(ExecPoolError::ConfigError(
                "Audit database URL cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}
