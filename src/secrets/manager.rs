//! Configured provider set
//!
//! Instantiates every provider named in [`KeyplaneConfig`] once and routes a
//! [`SecretReference`] to the provider it names.

use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

use super::provider::SecretProvider;
use super::registry::ProviderRegistry;
use super::types::{SecretMetadata, SecretReference, SecretValue};
use crate::config::KeyplaneConfig;
use crate::errors::{Result, SecretsError};

#[derive(Debug, Clone, Default)]
pub struct ProviderSet {
    providers: BTreeMap<String, Arc<dyn SecretProvider>>,
}

impl ProviderSet {
    /// Build every configured provider through `registry`
    pub async fn from_config(config: &KeyplaneConfig, registry: &ProviderRegistry) -> Result<Self> {
        let mut providers = BTreeMap::new();
        for (name, provider_config) in &config.providers {
            let provider = registry.create_provider(name, provider_config).await?;
            providers.insert(name.clone(), provider);
        }
        info!(count = providers.len(), "Secret providers ready");
        Ok(Self { providers })
    }

    /// Add an already-built provider under its own name
    pub fn insert(&mut self, provider: Arc<dyn SecretProvider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn SecretProvider>)> {
        self.providers.iter().map(|(name, provider)| (name.as_str(), provider))
    }

    pub fn get(&self, name: &str) -> Result<&Arc<dyn SecretProvider>> {
        self.providers.get(name).ok_or_else(|| {
            let known = self.names().collect::<Vec<_>>();
            SecretsError::config(
                format!("providers.{name}"),
                format!("Provider '{name}' is not configured"),
                if known.is_empty() {
                    "Add a providers section to the configuration file".to_string()
                } else {
                    format!("Use one of: {}", known.join(", "))
                },
            )
        })
    }

    pub async fn resolve(&self, reference: &SecretReference) -> Result<SecretValue> {
        self.get(&reference.provider)?.resolve(&reference.key).await
    }

    pub async fn describe(&self, reference: &SecretReference) -> Result<SecretMetadata> {
        self.get(&reference.provider)?.describe(&reference.key).await
    }

    pub async fn validate(&self, name: &str) -> Result<()> {
        self.get(name)?.validate().await
    }

    /// Validate every provider concurrently, reporting all failures at once
    pub async fn validate_all(&self) -> Result<()> {
        let results = join_all(self.providers.iter().map(|(name, provider)| async move {
            (name.clone(), provider.validate().await)
        }))
        .await;

        let failures: Vec<String> = results
            .into_iter()
            .filter_map(|(name, result)| {
                result.err().map(|e| {
                    warn!(provider = %name, error = %e, "Provider validation failed");
                    format!("{name}: {e}")
                })
            })
            .collect();

        if failures.is_empty() {
            return Ok(());
        }

        Err(SecretsError::operational(
            format!(
                "Validation failed for {} of {} provider(s)",
                failures.len(),
                self.providers.len()
            ),
            "Fix the configuration or credentials of every provider listed above",
        )
        .with_details(failures.join("\n")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderConfig;
    use crate::errors::ErrorKind;

    async fn env_set(prefix: &str) -> ProviderSet {
        let mut config = KeyplaneConfig::default();
        config
            .providers
            .insert("local".into(), ProviderConfig::new("env").with("prefix", prefix));
        ProviderSet::from_config(&config, &ProviderRegistry::builtin()).await.unwrap()
    }

    #[tokio::test]
    async fn test_resolve_routes_by_provider_name() {
        std::env::set_var("KEYPLANE_MANAGER_TEST_TOKEN", "abc");
        let set = env_set("KEYPLANE_MANAGER_TEST_").await;

        let value = set.resolve(&SecretReference::new("local", "TOKEN")).await.unwrap();
        assert_eq!(value.expose(), "abc");
        assert_eq!(value.metadata().get("provider").map(String::as_str), Some("local"));

        let meta = set.describe(&SecretReference::new("local", "ABSENT")).await.unwrap();
        assert!(!meta.exists);
        std::env::remove_var("KEYPLANE_MANAGER_TEST_TOKEN");
    }

    #[tokio::test]
    async fn test_unknown_provider_is_config_error() {
        let set = env_set("X_").await;
        let err = set.resolve(&SecretReference::new("vault", "k")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
        assert_eq!(err.suggestion(), Some("Use one of: local"));
    }

    #[tokio::test]
    async fn test_validate_all_passes_for_env() {
        let set = env_set("X_").await;
        assert!(set.validate_all().await.is_ok());
        assert!(set.validate("local").await.is_ok());
    }
}
