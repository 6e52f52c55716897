//! # Configuration Settings
//!
//! Defines the configuration structure for keyplane and the per-provider
//! settings view handed to provider factories.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use validator::Validate;

use crate::errors::{Result, SecretsError};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default)]
pub struct KeyplaneConfig {
    /// Logging configuration
    #[serde(default)]
    #[validate(nested)]
    pub logging: LoggingConfig,

    /// Configured providers keyed by instance name
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderConfig>,
}

impl KeyplaneConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self).map_err(SecretsError::from)?;

        for (name, provider) in &self.providers {
            if name.trim().is_empty() {
                return Err(SecretsError::config(
                    "providers",
                    "Provider names cannot be empty",
                    "Give every provider a non-empty key under 'providers'",
                ));
            }
            Validate::validate(provider).map_err(|errors| {
                let inner = SecretsError::from(errors);
                SecretsError::config(
                    format!("providers.{name}.type"),
                    inner.to_string(),
                    "Set 'type' to one of the names listed by 'keyplane types'",
                )
            })?;
        }

        Ok(())
    }
}

/// Output format of log lines
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    #[validate(length(min = 1, message = "Log level cannot be empty"))]
    pub level: String,

    pub format: LogFormat,

    /// Include the event target in plain output
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::Plain, with_target: false }
    }
}

/// One configured provider instance
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ProviderConfig {
    /// Provider type name resolved through the registry
    #[serde(rename = "type")]
    #[validate(length(min = 1, message = "Provider type cannot be empty"))]
    pub provider_type: String,

    /// Backend-specific settings
    #[serde(default)]
    pub config: BTreeMap<String, Value>,
}

impl ProviderConfig {
    pub fn new(provider_type: impl Into<String>) -> Self {
        Self { provider_type: provider_type.into(), config: BTreeMap::new() }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    /// Settings view for the instance called `name`
    pub fn settings(&self, name: &str) -> ProviderSettings {
        ProviderSettings::new(name, self.config.clone())
    }
}

/// Opaque string-keyed settings of one provider instance.
///
/// Accessors accept JSON strings for numbers and booleans because values
/// coming from environment overrides are always strings. Errors name the
/// full field path, `providers.<name>.<key>`.
#[derive(Debug, Clone, Default)]
pub struct ProviderSettings {
    provider: String,
    values: BTreeMap<String, Value>,
}

impl ProviderSettings {
    pub fn new(provider: impl Into<String>, values: BTreeMap<String, Value>) -> Self {
        Self { provider: provider.into(), values }
    }

    /// Name of the provider instance these settings belong to
    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn field_path(&self, key: &str) -> String {
        format!("providers.{}.{}", self.provider, key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get_str(key).is_some()
    }

    /// Non-empty string value; numbers and booleans are stringified
    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.values.get(key)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Mandatory string value
    pub fn require_str(&self, key: &str, suggestion: &str) -> Result<String> {
        self.get_str(key).ok_or_else(|| self.missing(key, suggestion))
    }

    /// String value, falling back to the first set environment variable
    pub fn str_or_env(&self, key: &str, env_vars: &[&str]) -> Option<String> {
        self.get_str(key).or_else(|| {
            env_vars
                .iter()
                .filter_map(|var| std::env::var(var).ok())
                .find(|value| !value.trim().is_empty())
        })
    }

    /// Mandatory string value with environment fallbacks
    pub fn require_str_or_env(&self, key: &str, env_vars: &[&str], suggestion: &str) -> Result<String> {
        self.str_or_env(key, env_vars).ok_or_else(|| self.missing(key, suggestion))
    }

    pub fn u64(&self, key: &str, default: u64) -> Result<u64> {
        match self.values.get(key) {
            None | Some(Value::Null) => Ok(default),
            Some(Value::Number(n)) => n.as_u64().ok_or_else(|| self.invalid(key, "a non-negative integer")),
            Some(Value::String(s)) => {
                s.trim().parse().map_err(|_| self.invalid(key, "a non-negative integer"))
            }
            Some(_) => Err(self.invalid(key, "a non-negative integer")),
        }
    }

    pub fn bool(&self, key: &str, default: bool) -> Result<bool> {
        match self.values.get(key) {
            None | Some(Value::Null) => Ok(default),
            Some(Value::Bool(b)) => Ok(*b),
            Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Ok(true),
                "false" | "no" | "0" => Ok(false),
                _ => Err(self.invalid(key, "true or false")),
            },
            Some(_) => Err(self.invalid(key, "true or false")),
        }
    }

    /// List value: a JSON array of strings, or a comma-separated string
    pub fn string_list(&self, key: &str) -> Result<Vec<String>> {
        match self.values.get(key) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::String(s)) => Ok(s
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s.clone()),
                    _ => Err(self.invalid(key, "a list of strings")),
                })
                .collect(),
            Some(_) => Err(self.invalid(key, "a list of strings")),
        }
    }

    /// Whole-second duration
    pub fn duration_secs(&self, key: &str, default: Duration) -> Result<Duration> {
        self.u64(key, default.as_secs()).map(Duration::from_secs)
    }

    /// Copy with one value replaced
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Copy reporting errors under a different provider name
    pub fn renamed(&self, provider: impl Into<String>) -> Self {
        Self { provider: provider.into(), values: self.values.clone() }
    }

    fn missing(&self, key: &str, suggestion: &str) -> SecretsError {
        SecretsError::config(self.field_path(key), "Required setting is missing", suggestion)
    }

    fn invalid(&self, key: &str, expected: &str) -> SecretsError {
        SecretsError::config(
            self.field_path(key),
            format!("Expected {expected}"),
            format!("Set '{}' to {expected}", self.field_path(key)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn settings() -> ProviderSettings {
        ProviderSettings::new("vault", BTreeMap::new())
            .with("address", "https://vault:8200")
            .with("ttl", "120")
            .with("verify", json!(false))
            .with("scopes", json!(["a", "b"]))
            .with("blank", "  ")
    }

    #[test]
    fn test_require_str_reports_field_path() {
        let s = settings();
        assert_eq!(s.require_str("address", "set it").unwrap(), "https://vault:8200");

        let err = s.require_str("token", "Set VAULT_TOKEN").unwrap_err();
        match err {
            SecretsError::Config { field, suggestion, .. } => {
                assert_eq!(field, "providers.vault.token");
                assert_eq!(suggestion, "Set VAULT_TOKEN");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_blank_strings_are_missing() {
        assert!(settings().get_str("blank").is_none());
        assert!(settings().require_str("blank", "x").is_err());
    }

    #[test]
    fn test_numbers_and_booleans_accept_strings() {
        let s = settings();
        assert_eq!(s.u64("ttl", 1).unwrap(), 120);
        assert_eq!(s.u64("absent", 7).unwrap(), 7);
        assert!(!s.bool("verify", true).unwrap());
        assert_eq!(s.duration_secs("ttl", Duration::from_secs(1)).unwrap(), Duration::from_secs(120));

        let s = s.with("ttl", "soon");
        assert!(s.u64("ttl", 1).is_err());
    }

    #[test]
    fn test_string_list_forms() {
        let s = settings().with("csv", "x, y,,z");
        assert_eq!(s.string_list("scopes").unwrap(), vec!["a", "b"]);
        assert_eq!(s.string_list("csv").unwrap(), vec!["x", "y", "z"]);
        assert!(s.string_list("absent").unwrap().is_empty());
    }

    #[test]
    fn test_str_or_env_fallback() {
        std::env::set_var("KEYPLANE_TEST_SETTINGS_FALLBACK", "from-env");
        let s = settings();
        assert_eq!(
            s.str_or_env("token", &["KEYPLANE_TEST_SETTINGS_UNSET", "KEYPLANE_TEST_SETTINGS_FALLBACK"]),
            Some("from-env".to_string())
        );
        assert_eq!(
            s.str_or_env("address", &["KEYPLANE_TEST_SETTINGS_FALLBACK"]),
            Some("https://vault:8200".to_string())
        );
        std::env::remove_var("KEYPLANE_TEST_SETTINGS_FALLBACK");
    }

    #[test]
    fn test_config_validation() {
        let mut config = KeyplaneConfig::default();
        config.providers.insert("vault".into(), ProviderConfig::new("vault"));
        assert!(config.validate().is_ok());

        config.providers.insert("broken".into(), ProviderConfig::new(""));
        let err = config.validate().unwrap_err();
        assert!(matches!(err, SecretsError::Config { ref field, .. } if field == "providers.broken.type"));
    }
}
