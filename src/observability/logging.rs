//! # Structured Logging
//!
//! Subscriber setup and span macros built on the tracing ecosystem.
//!
//! Log fields name providers, backends and references. Secret values and
//! tokens are never recorded; they only ever appear as `SecretString`,
//! which renders as `[REDACTED]`.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{KeyplaneConfig, LogFormat, LoggingConfig};
use crate::errors::{Result, SecretsError};

/// Create a tracing span for one provider operation.
///
/// ```rust,ignore
/// let span = provider_span!("resolve", "vault");
/// let span = provider_span!("resolve", "aws", service = "ssm");
/// ```
#[macro_export]
macro_rules! provider_span {
    ($operation:expr, $provider:expr) => {
        tracing::info_span!(
            "provider_operation",
            operation = %$operation,
            provider = %$provider,
            operation_id = %uuid::Uuid::new_v4()
        )
    };
    ($operation:expr, $provider:expr, $($field:tt)*) => {
        tracing::info_span!(
            "provider_operation",
            operation = %$operation,
            provider = %$provider,
            operation_id = %uuid::Uuid::new_v4(),
            $($field)*
        )
    };
}

/// Install the global subscriber, writing to stderr.
///
/// `RUST_LOG` takes precedence over the configured level. Installing twice
/// is not an error; the first subscriber stays (integration tests).
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level).map_err(|e| {
            SecretsError::config(
                "logging.level",
                format!("Invalid log filter '{}': {}", config.level, e),
                "Use a level such as info or debug, or a directive like keyplane=debug",
            )
        })?,
    };

    let installed = match config.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        LogFormat::Plain => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(config.with_target)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    };

    if installed.is_err() {
        // Subscriber already set elsewhere; keep it.
        tracing::debug!("Global subscriber already installed");
    }
    Ok(())
}

/// Log the loaded configuration at startup (no secret material)
pub fn log_config_info(config: &KeyplaneConfig) {
    let providers: Vec<String> = config
        .providers
        .iter()
        .map(|(name, provider)| format!("{}={}", name, provider.provider_type))
        .collect();

    tracing::info!(
        provider_count = config.providers.len(),
        providers = %providers.join(","),
        log_level = %config.logging.level,
        "keyplane configuration loaded"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_macros_compile() {
        let _span = provider_span!("resolve", "vault");
        let _span = provider_span!("validate", "aws", service = "ssm");
    }

    #[test]
    fn test_invalid_level_is_config_error() {
        // RUST_LOG overrides the configured level
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let config = LoggingConfig { level: "keyplane=loudest".to_string(), ..Default::default() };
        let err = init_logging(&config).unwrap_err();
        assert!(matches!(err, SecretsError::Config { ref field, .. } if field == "logging.level"));
    }

    #[test]
    fn test_log_config_info() {
        // Should not panic on an empty configuration
        log_config_info(&KeyplaneConfig::default());
    }
}
