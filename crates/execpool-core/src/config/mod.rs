//! Configuration module for the execution engine
//!
//! Supports YAML configuration files and environment variable overrides.
//! The resulting `ExecPoolConfig` is validated once and then passed by value
//! (or `Arc`) into the dispatcher and the local sandbox at construction time.

pub mod types;
pub mod loader;
pub mod validation;

pub use types::*;
pub use loader::*;
pub use validation::*;

#[cfg(test)]
mod tests;

use crate::errors::ExecPoolError;
use std::path::Path;

/// Load a configuration from a YAML file
pub async fn load_config<P: AsRef<Path>>(path: P) -> Result<ExecPoolConfig, ExecPoolError> {
    ConfigLoader::from_file(path).await
}
