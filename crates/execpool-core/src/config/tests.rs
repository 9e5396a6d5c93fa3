//! Tests for configuration loading and validation

#[cfg(test)]
mod tests {
    use super::super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ExecPoolConfig::default();
        assert_eq!(config.pool.pool_size, 3);
        assert_eq!(
            config.pool.allowed_modules,
            vec!["pandas", "numpy", "matplotlib", "requests"]
        );
        assert_eq!(config.execution.max_attempts(), 3);
        assert_eq!(config.execution.backoff().as_secs(), 2);
        assert_eq!(config.execution.default_timeout_secs, 120);
        assert!(config.audit.log_fallback);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = ExecPoolConfig::default();
        let lookup = lookup_from(&[
            (ENV_POOL_SIZE, "5"),
            (ENV_INSTALLED_MODULES, " numpy, ,os ,pandas"),
            (ENV_EXECUTION_TIMEOUT, "30"),
            (ENV_URL_TEMPLATE, "http://10.0.0.{index}:5000"),
        ]);

        ConfigLoader::apply_env_overrides(&mut config, lookup).unwrap();

        assert_eq!(config.pool.pool_size, 5);
        assert_eq!(config.pool.allowed_modules, vec!["numpy", "os", "pandas"]);
        assert_eq!(config.execution.default_timeout_secs, 30);
        assert_eq!(config.pool.node_url_template, "http://10.0.0.{index}:5000");
    }

    #[test]
    fn test_invalid_numeric_env_is_an_error() {
        let mut config = ExecPoolConfig::default();
        let result =
            ConfigLoader::apply_env_overrides(&mut config, lookup_from(&[(ENV_POOL_SIZE, "three")]));
        assert!(matches!(result, Err(crate::errors::ExecPoolError::ConfigError(_))));
    }

    #[test]
    fn test_validation_rejects_empty_pool() {
        let mut config = ExecPoolConfig::default();
        config.pool.pool_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_template_without_index() {
        let mut config = ExecPoolConfig::default();
        config.pool.node_url_template = "http://executor:5000".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_yaml_is_default() {
        let config = ConfigLoader::parse_yaml("").unwrap();
        assert_eq!(config, ExecPoolConfig::default());
    }

    #[test]
    fn test_max_retries_at_limit_saturates() {
        let config = ConfigLoader::parse_yaml("execution:\n  max_retries: 4294967295\n").unwrap();
        assert_eq!(config.execution.max_attempts(), u32::MAX);
    }

    #[tokio::test]
    async fn test_from_file_partial_sections() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
pool:
  pool_size: 2
  allowed_modules: [numpy]
execution:
  max_retries: 0
sandbox:
  python_bin: /usr/bin/python3
"#
        )
        .unwrap();

        let config = load_config(file.path()).await.unwrap();
        assert_eq!(config.pool.pool_size, 2);
        assert_eq!(config.pool.allowed_modules, vec!["numpy"]);
        assert_eq!(config.pool.node_url_template, "http://executor-{index}:5000");
        assert_eq!(config.execution.max_attempts(), 1);
        assert_eq!(config.sandbox.python_bin, "/usr/bin/python3");
        assert_eq!(config.sandbox.setup_timeout_secs, 300);
    }

    #[tokio::test]
    async fn test_from_file_missing() {
        let result = load_config("/nonexistent/execpool.yaml").await;
        assert!(result.is_err());
    }
}
