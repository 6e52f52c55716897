//! # Configuration Management
//!
//! Loads [`KeyplaneConfig`] with the `config` crate: an optional YAML, TOML
//! or JSON file, layered under environment overrides such as
//! `KEYPLANE__LOGGING__LEVEL=debug` or
//! `KEYPLANE__PROVIDERS__VAULT__CONFIG__ADDRESS=https://vault:8200`.

pub mod settings;

pub use settings::{KeyplaneConfig, LogFormat, LoggingConfig, ProviderConfig, ProviderSettings};

use std::path::Path;
use tracing::debug;

use crate::errors::{Result, SecretsError};

/// Prefix of environment overrides
pub const ENV_PREFIX: &str = "KEYPLANE";

/// Separator between prefix and nested keys
pub const ENV_SEPARATOR: &str = "__";

/// Environment variable naming the configuration file
pub const CONFIG_PATH_ENV: &str = "KEYPLANE_CONFIG";

impl KeyplaneConfig {
    /// Load configuration from `path` (if any) plus environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            if !path.exists() {
                return Err(SecretsError::config(
                    "config",
                    format!("Configuration file '{}' does not exist", path.display()),
                    format!("Create the file or point --config / {CONFIG_PATH_ENV} elsewhere"),
                ));
            }
            debug!(path = %path.display(), "Loading configuration file");
            builder = builder.add_source(config::File::from(path));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator(ENV_SEPARATOR)
                .separator(ENV_SEPARATOR),
        );

        let config: KeyplaneConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment overrides only
    pub fn from_env() -> Result<Self> {
        Self::load(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    fn test_default_config() {
        let config = KeyplaneConfig::default();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, LogFormat::Plain);
        assert!(config.providers.is_empty());
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = KeyplaneConfig::load(Some(Path::new("/nonexistent/keyplane.yaml"))).unwrap_err();
        assert!(matches!(err, SecretsError::Config { ref field, .. } if field == "config"));
    }

    #[test]
    #[traced_test]
    fn test_load_logs_file_path() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        std::io::Write::write_all(&mut file, b"logging:\n  level: warn\n").unwrap();

        let config = KeyplaneConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.logging.level, "warn");
        assert!(logs_contain("Loading configuration file"));
    }
}
