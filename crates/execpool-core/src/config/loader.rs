//! Configuration loader for YAML files and environment overrides
//!
//! Deployments configure the engine mostly through environment variables
//! (pool size, module list, default timeout). A YAML file can provide the
//! base values; the environment always wins over the file.

use crate::config::types::*;
use crate::errors::ExecPoolError;
use std::path::Path;
use std::str::FromStr;
use tokio::fs;

pub const ENV_POOL_SIZE: &str = "EXECUTOR_POOL_SIZE";
pub const ENV_INSTALLED_MODULES: &str = "INSTALLED_MODULES";
pub const ENV_EXECUTION_TIMEOUT: &str = "EXECUTION_TIMEOUT";
pub const ENV_URL_TEMPLATE: &str = "EXECUTOR_URL_TEMPLATE";
pub const ENV_LOG_DB: &str = "EXECUTION_LOG_DB";
pub const ENV_PYTHON: &str = "EXECPOOL_PYTHON";
pub const ENV_LOG_LEVEL: &str = "EXECPOOL_LOG_LEVEL";

/// Configuration loader with environment resolution
pub struct ConfigLoader;

impl ConfigLoader {
    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Result<ExecPoolConfig, ExecPoolError> {
        let mut config = ExecPoolConfig::default();
        Self::apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file, then apply the environment.
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<ExecPoolConfig, ExecPoolError> {
        let path = path.as_ref();

        let content = fs::read_to_string(path).await.map_err(|e| {
            ExecPoolError::ConfigError(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let mut config = Self::parse_yaml(&content)?;
        Self::apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
        config.validate()?;
        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn parse_yaml(content: &str) -> Result<ExecPoolConfig, ExecPoolError> {
        // An empty document deserializes to unit, not to an empty mapping.
        if content.trim().is_empty() {
            return Ok(ExecPoolConfig::default());
        }
        serde_yaml::from_str(content)
            .map_err(|e| ExecPoolError::ConfigError(format!("Failed to parse YAML config: {}", e)))
    }

    /// Applies overrides read through `lookup`, so callers other than the
    /// process environment (tests, embedding hosts) can feed values in.
    pub fn apply_env_overrides<F>(config: &mut ExecPoolConfig, lookup: F) -> Result<(), ExecPoolError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_POOL_SIZE) {
            config.pool.pool_size = parse_number(ENV_POOL_SIZE, &value)?;
        }

        if let Some(value) = lookup(ENV_INSTALLED_MODULES) {
            config.pool.allowed_modules = parse_module_list(&value);
        }

        if let Some(value) = lookup(ENV_EXECUTION_TIMEOUT) {
            config.execution.default_timeout_secs = parse_number(ENV_EXECUTION_TIMEOUT, &value)?;
        }

        if let Some(value) = lookup(ENV_URL_TEMPLATE) {
            config.pool.node_url_template = value;
        }

        if let Some(value) = lookup(ENV_LOG_DB) {
            config.audit.database_url = value;
        }

        if let Some(value) = lookup(ENV_PYTHON) {
            config.sandbox.python_bin = value;
        }

        if let Some(value) = lookup(ENV_LOG_LEVEL) {
            config.logging.level = value;
        }

        Ok(())
    }
}

/// Splits a comma separated module list, trimming entries and dropping empties.
pub fn parse_module_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T, ExecPoolError>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse::<T>().map_err(|e| {
        ExecPoolError::ConfigError(format!("Invalid value '{}' for {}: {}", value, key, e))
    })
}
