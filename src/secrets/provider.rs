//! Provider contract and the standard single-backend provider.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn, Instrument};

use super::backends::BackendAdapter;
use super::cache::TokenCache;
use super::reference::{ReferenceParser, StructuredReference};
use super::types::{Capabilities, SecretMetadata, SecretString, SecretValue};
use crate::errors::{BackendError, ErrorClassifier, ErrorKind, Result, SecretsError};
use crate::provider_span;

/// Uniform contract every configured provider exposes.
///
/// Implementations must be Send + Sync: one instance serves any number of
/// concurrent calls.
#[async_trait]
pub trait SecretProvider: Send + Sync + fmt::Debug {
    /// Configured instance name
    fn name(&self) -> &str;

    /// Static capabilities; no I/O
    fn capabilities(&self) -> &Capabilities;

    /// Resolve a reference key to its value.
    ///
    /// # Errors
    ///
    /// - [`SecretsError::NotFound`] if the target does not exist
    /// - [`SecretsError::Auth`] if authentication or authorization failed
    /// - [`SecretsError::Operational`] for malformed references and other faults
    async fn resolve(&self, key: &str) -> Result<SecretValue>;

    /// Describe a reference without reading its value.
    ///
    /// A missing target is `Ok` with `exists == false`.
    async fn describe(&self, key: &str) -> Result<SecretMetadata>;

    /// Cheapest authenticated round-trip proving the provider is usable
    async fn validate(&self) -> Result<()>;
}

/// Provider binding one reference parser, one token cache and one adapter
pub struct BackendProvider {
    name: String,
    parser: Box<dyn ReferenceParser>,
    adapter: Arc<dyn BackendAdapter>,
    cache: TokenCache,
    capabilities: Capabilities,
    classifier: &'static ErrorClassifier,
}

impl fmt::Debug for BackendProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendProvider")
            .field("name", &self.name)
            .field("backend", &self.adapter.kind())
            .field("parser", &self.parser)
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

impl BackendProvider {
    pub fn new<P>(
        name: impl Into<String>,
        parser: P,
        adapter: Arc<dyn BackendAdapter>,
        capabilities: Capabilities,
        classifier: &'static ErrorClassifier,
    ) -> Self
    where
        P: ReferenceParser + 'static,
    {
        Self {
            name: name.into(),
            parser: Box::new(parser),
            adapter,
            cache: TokenCache::new(),
            capabilities,
            classifier,
        }
    }

    pub fn token_cache(&self) -> &TokenCache {
        &self.cache
    }

    fn parse(&self, key: &str) -> Result<StructuredReference> {
        self.parser.parse(key).map_err(SecretsError::from)
    }

    /// Cached token, authenticating when the cache is empty or expired.
    /// `None` for backends that do not authenticate through the core.
    async fn token(&self, key: &str) -> Result<Option<SecretString>> {
        if !self.capabilities.requires_auth {
            return Ok(None);
        }

        let token = self
            .cache
            .get_or_refresh(|| async {
                debug!(provider = %self.name, backend = %self.adapter.kind(), "Authenticating");
                self.adapter.authenticate().await.map(|auth| (auth.token, auth.ttl))
            })
            .await
            .map_err(|e| {
                warn!(provider = %self.name, error = %e, "Authentication failed");
                self.classifier.classify_auth(&self.name, key, e)
            })?;

        Ok(Some(token))
    }

    /// Classify an adapter failure, dropping the cached token on auth errors
    async fn failure(&self, key: &str, error: BackendError) -> SecretsError {
        let classified = self.classifier.classify(&self.name, key, error);
        if classified.is_auth() {
            self.cache.clear().await;
        }
        classified
    }
}

#[async_trait]
impl SecretProvider for BackendProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    async fn resolve(&self, key: &str) -> Result<SecretValue> {
        let span = provider_span!("resolve", self.name, backend = %self.adapter.kind());
        async move {
            let reference = self.parse(key)?;
            let token = self.token(key).await?;

            let raw = match self.adapter.get_secret(token.as_ref(), &reference).await {
                Ok(raw) => raw,
                Err(e) => return Err(self.failure(key, e).await),
            };

            debug!(reference = %reference.display_path(), "Resolved secret");

            let mut metadata = raw.metadata;
            metadata.entry("provider".to_string()).or_insert_with(|| self.name.clone());
            metadata
                .entry("backend".to_string())
                .or_insert_with(|| self.adapter.kind().to_string());
            metadata.entry("path".to_string()).or_insert_with(|| reference.display_path());

            Ok(SecretValue::new(raw.value)
                .with_version(raw.version.or(reference.version))
                .with_updated_at(raw.updated_at)
                .with_metadata(metadata))
        }
        .instrument(span)
        .await
    }

    async fn describe(&self, key: &str) -> Result<SecretMetadata> {
        let span = provider_span!("describe", self.name, backend = %self.adapter.kind());
        async move {
            let reference = self.parse(key)?;
            let token = self.token(key).await?;

            match self.adapter.describe_item(token.as_ref(), &reference).await {
                Ok(metadata) => Ok(metadata),
                Err(e) => match self.failure(key, e).await {
                    err if err.kind() == ErrorKind::NotFound => {
                        debug!(reference = %reference.display_path(), "Secret does not exist");
                        Ok(SecretMetadata::missing())
                    }
                    err => Err(err),
                },
            }
        }
        .instrument(span)
        .await
    }

    async fn validate(&self) -> Result<()> {
        let span = provider_span!("validate", self.name, backend = %self.adapter.kind());
        async move {
            let token = self.token("").await?;

            match self.adapter.list_items(token.as_ref(), "").await {
                Ok(items) => {
                    debug!(items = items.len(), "Provider validated");
                    Ok(())
                }
                // Adapters answer an empty listing with Ok; a missing mount,
                // project or vault is a misconfigured provider.
                Err(e) if self.classifier.kind_of(&e) == ErrorKind::NotFound => {
                    warn!(provider = %self.name, error = %e, "Validation target does not exist");
                    Err(SecretsError::operational_with_source(
                        format!("Validation of provider '{}' failed: {}", self.name, e),
                        format!(
                            "Check that the mount, project or vault configured for provider '{}' exists",
                            self.name
                        ),
                        Box::new(e),
                    ))
                }
                Err(e) => Err(self.failure("", e).await),
            }
        }
        .instrument(span)
        .await
    }
}
