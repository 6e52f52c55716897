//! Unified provider for multi-service vendors
//!
//! A [`UnifiedProvider`] owns several sub-providers (for example AWS Secrets
//! Manager and Parameter Store) and picks one per reference:
//!
//! 1. an explicit `alias:` prefix naming a registered alias, stripped before
//!    forwarding
//! 2. the first structural route whose predicate matches the reference
//! 3. the default service
//!
//! A prefix shaped like an alias that is neither registered nor part of a
//! structural match is rejected rather than sent to the default service, as
//! is any route that lands on a service that was never configured.

use async_trait::async_trait;
use futures::future::join_all;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, Instrument};

use super::provider::SecretProvider;
use super::types::{Capabilities, SecretMetadata, SecretValue};
use crate::errors::{Result, SecretsError};
use crate::provider_span;

static ALIAS_SHAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z][a-z0-9-]*$").expect("ALIAS_SHAPE should be a valid regex pattern")
});

/// Structural routing rule: references matching `matches` go to `service`
#[derive(Debug, Clone, Copy)]
pub struct ServiceRoute {
    pub service: &'static str,
    pub matches: fn(&str) -> bool,
}

impl ServiceRoute {
    pub const fn new(service: &'static str, matches: fn(&str) -> bool) -> Self {
        Self { service, matches }
    }
}

/// How a reference was routed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteSource {
    Alias,
    Structural,
    Default,
}

/// Result of routing one reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutedReference<'a> {
    pub service: &'a str,
    pub key: &'a str,
    pub source: RouteSource,
}

pub struct UnifiedProvider {
    name: String,
    services: BTreeMap<String, Arc<dyn SecretProvider>>,
    aliases: BTreeMap<String, String>,
    routes: Vec<ServiceRoute>,
    default_service: String,
    capabilities: Capabilities,
}

impl fmt::Debug for UnifiedProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnifiedProvider")
            .field("name", &self.name)
            .field("services", &self.services.keys().collect::<Vec<_>>())
            .field("default_service", &self.default_service)
            .finish()
    }
}

impl UnifiedProvider {
    pub fn builder(name: impl Into<String>) -> UnifiedProviderBuilder {
        UnifiedProviderBuilder {
            name: name.into(),
            services: BTreeMap::new(),
            aliases: BTreeMap::new(),
            routes: Vec::new(),
            default_service: None,
        }
    }

    /// Canonical names of the configured services
    pub fn services(&self) -> impl Iterator<Item = &str> {
        self.services.keys().map(String::as_str)
    }

    pub fn default_service(&self) -> &str {
        &self.default_service
    }

    /// Aliases whose service is configured, sorted
    pub fn available_aliases(&self) -> Vec<&str> {
        self.aliases
            .iter()
            .filter(|(_, service)| self.services.contains_key(*service))
            .map(|(alias, _)| alias.as_str())
            .collect()
    }

    /// Pick the service for `key` and the key to forward to it. No I/O.
    pub fn route<'a>(&'a self, key: &'a str) -> Result<RoutedReference<'a>> {
        let prefix = key.split_once(':');

        if let Some((alias, rest)) = prefix {
            if let Some(service) = self.aliases.get(alias) {
                return Ok(RoutedReference { service, key: rest, source: RouteSource::Alias });
            }
        }

        if let Some(route) = self.routes.iter().find(|route| (route.matches)(key)) {
            return Ok(RoutedReference { service: route.service, key, source: RouteSource::Structural });
        }

        if let Some((alias, _)) = prefix {
            if ALIAS_SHAPE.is_match(alias) {
                return Err(self.unknown_service(alias));
            }
        }

        Ok(RoutedReference { service: &self.default_service, key, source: RouteSource::Default })
    }

    fn service(&self, service: &str) -> Result<&Arc<dyn SecretProvider>> {
        self.services.get(service).ok_or_else(|| {
            SecretsError::operational(
                format!("Service '{}' is not configured for provider '{}'", service, self.name),
                format!(
                    "Add the settings for '{}' to provider '{}', or use one of: {}",
                    service,
                    self.name,
                    self.available_aliases().join(", ")
                ),
            )
        })
    }

    fn unknown_service(&self, alias: &str) -> SecretsError {
        SecretsError::operational(
            format!("Unknown service '{}' for provider '{}'", alias, self.name),
            format!("Prefix the reference with one of: {}", self.available_aliases().join(", ")),
        )
    }

    fn dispatch<'a>(&'a self, key: &'a str) -> Result<(&'a Arc<dyn SecretProvider>, &'a str)> {
        let routed = self.route(key)?;
        debug!(
            provider = %self.name,
            service = routed.service,
            source = ?routed.source,
            "Routing reference"
        );
        Ok((self.service(routed.service)?, routed.key))
    }
}

#[async_trait]
impl SecretProvider for UnifiedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    async fn resolve(&self, key: &str) -> Result<SecretValue> {
        let (provider, key) = self.dispatch(key)?;
        provider.resolve(key).await
    }

    async fn describe(&self, key: &str) -> Result<SecretMetadata> {
        let (provider, key) = self.dispatch(key)?;
        provider.describe(key).await
    }

    async fn validate(&self) -> Result<()> {
        let span = provider_span!("validate", self.name, services = self.services.len());
        async move {
            let results = join_all(self.services.iter().map(|(service, provider)| async move {
                (service.clone(), provider.validate().await)
            }))
            .await;

            let failures: Vec<(String, SecretsError)> = results
                .into_iter()
                .filter_map(|(service, result)| result.err().map(|e| (service, e)))
                .collect();

            if failures.is_empty() {
                Ok(())
            } else {
                Err(SecretsError::aggregate(&self.name, failures))
            }
        }
        .instrument(span)
        .await
    }
}

/// Builder collecting services, aliases and routes of a [`UnifiedProvider`]
pub struct UnifiedProviderBuilder {
    name: String,
    services: BTreeMap<String, Arc<dyn SecretProvider>>,
    aliases: BTreeMap<String, String>,
    routes: Vec<ServiceRoute>,
    default_service: Option<String>,
}

impl UnifiedProviderBuilder {
    /// Register aliases for a service. The canonical name is always an alias.
    pub fn aliases(mut self, service: &str, aliases: &[&str]) -> Self {
        self.aliases.insert(service.to_string(), service.to_string());
        for alias in aliases {
            self.aliases.insert(alias.to_string(), service.to_string());
        }
        self
    }

    pub fn route(mut self, route: ServiceRoute) -> Self {
        self.routes.push(route);
        self
    }

    /// Attach a configured sub-provider
    pub fn service(mut self, service: &str, provider: Arc<dyn SecretProvider>) -> Self {
        self.services.insert(service.to_string(), provider);
        self
    }

    /// Default service, by canonical name or alias
    pub fn default_service(mut self, service: impl Into<String>) -> Self {
        self.default_service = Some(service.into());
        self
    }

    pub fn build(self) -> Result<UnifiedProvider> {
        let field = format!("providers.{}.default_service", self.name);

        if self.services.is_empty() {
            return Err(SecretsError::config(
                format!("providers.{}", self.name),
                "No service could be configured",
                "Provide the settings of at least one service of this provider",
            ));
        }

        let requested = self.default_service.ok_or_else(|| {
            SecretsError::config(&field, "No default service", "Set 'default_service'")
        })?;

        let default_service = self.aliases.get(&requested).cloned().ok_or_else(|| {
            SecretsError::config(
                &field,
                format!("Unknown service '{requested}'"),
                format!("Use one of: {}", self.aliases.keys().cloned().collect::<Vec<_>>().join(", ")),
            )
        })?;

        if !self.services.contains_key(&default_service) {
            return Err(SecretsError::config(
                &field,
                format!("Default service '{default_service}' is not configured"),
                format!(
                    "Configure '{default_service}' or choose one of: {}",
                    self.services.keys().cloned().collect::<Vec<_>>().join(", ")
                ),
            ));
        }

        let capabilities = self
            .services
            .values()
            .fold(Capabilities::default(), |acc, provider| acc.union(provider.capabilities()));

        info!(
            provider = %self.name,
            services = ?self.services.keys().collect::<Vec<_>>(),
            default_service = %default_service,
            "Built unified provider"
        );

        Ok(UnifiedProvider {
            name: self.name,
            services: self.services,
            aliases: self.aliases,
            routes: self.routes,
            default_service,
            capabilities,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    #[derive(Debug)]
    struct Echo {
        name: String,
        capabilities: Capabilities,
        fail_validate: bool,
    }

    impl Echo {
        fn arc(name: &str) -> Arc<dyn SecretProvider> {
            Arc::new(Echo { name: name.to_string(), capabilities: Capabilities::default(), fail_validate: false })
        }
    }

    #[async_trait]
    impl SecretProvider for Echo {
        fn name(&self) -> &str {
            &self.name
        }

        fn capabilities(&self) -> &Capabilities {
            &self.capabilities
        }

        async fn resolve(&self, key: &str) -> Result<SecretValue> {
            Ok(SecretValue::new(format!("{}:{}", self.name, key)))
        }

        async fn describe(&self, _key: &str) -> Result<SecretMetadata> {
            Ok(SecretMetadata::found())
        }

        async fn validate(&self) -> Result<()> {
            if self.fail_validate {
                return Err(SecretsError::auth(&self.name, "expired"));
            }
            Ok(())
        }
    }

    fn router() -> UnifiedProvider {
        UnifiedProvider::builder("aws")
            .aliases("secretsmanager", &["sm", "secrets"])
            .aliases("ssm", &["ps", "parameter"])
            .route(ServiceRoute::new("ssm", |k| k.starts_with('/')))
            .service("secretsmanager", Echo::arc("sm"))
            .service("ssm", Echo::arc("ssm"))
            .default_service("secretsmanager")
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_alias_wins_over_structure() {
        let r = router();
        let value = r.resolve("sm:/looks/like/ssm").await.unwrap();
        assert_eq!(value.expose(), "sm:/looks/like/ssm");
    }

    #[tokio::test]
    async fn test_structural_and_default_routes() {
        let r = router();
        assert_eq!(r.resolve("/prod/db").await.unwrap().expose(), "ssm:/prod/db");
        assert_eq!(r.resolve("prod/db").await.unwrap().expose(), "sm:prod/db");
        assert_eq!(r.route("prod/db").unwrap().source, RouteSource::Default);
    }

    #[tokio::test]
    async fn test_unknown_alias_lists_available() {
        let err = router().resolve("imaginary-service:key").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Operational);
        let suggestion = err.suggestion().unwrap();
        for alias in ["parameter", "ps", "secrets", "secretsmanager", "sm", "ssm"] {
            assert!(suggestion.contains(alias), "missing {alias} in {suggestion}");
        }
    }

    #[tokio::test]
    async fn test_unconfigured_service_is_error() {
        let r = UnifiedProvider::builder("aws")
            .aliases("secretsmanager", &["sm"])
            .aliases("ssm", &["ps"])
            .route(ServiceRoute::new("ssm", |k| k.starts_with('/')))
            .service("secretsmanager", Echo::arc("sm"))
            .default_service("sm")
            .build()
            .unwrap();

        let err = r.resolve("ps:/prod/db").await.unwrap_err();
        assert!(err.to_string().contains("'ssm' is not configured"));
        assert!(r.resolve("/prod/db").await.is_err());
        assert_eq!(r.available_aliases(), vec!["secretsmanager", "sm"]);
    }

    #[test]
    fn test_default_must_be_configured() {
        let err = UnifiedProvider::builder("gcp")
            .aliases("secretmanager", &["sm"])
            .aliases("iam", &["token"])
            .service("iam", Echo::arc("iam"))
            .default_service("secretmanager")
            .build()
            .unwrap_err();
        assert!(matches!(err, SecretsError::Config { ref field, .. } if field == "providers.gcp.default_service"));
    }

    #[tokio::test]
    async fn test_validate_aggregates_every_failure() {
        let failing = |name: &str| -> Arc<dyn SecretProvider> {
            Arc::new(Echo { name: name.to_string(), capabilities: Capabilities::default(), fail_validate: true })
        };
        let r = UnifiedProvider::builder("aws")
            .aliases("secretsmanager", &[])
            .aliases("ssm", &[])
            .service("secretsmanager", failing("aws/secretsmanager"))
            .service("ssm", failing("aws/ssm"))
            .default_service("secretsmanager")
            .build()
            .unwrap();

        let rendered = r.validate().await.unwrap_err().render();
        assert!(rendered.contains("secretsmanager: Authentication failed"));
        assert!(rendered.contains("ssm: Authentication failed"));
    }
}
