//! Provider registry
//!
//! Maps provider type names (`vault`, `gcp`, ...) to async factories that
//! build a [`SecretProvider`] from one provider's settings. The registry is
//! an ordinary value: build one with [`ProviderRegistry::builtin`], add
//! factories of your own, and pass it by reference.

use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::backends::{
    BitwardenBackend, BitwardenBackendConfig, CommandRunner, EnvBackend, EnvBackendConfig,
    GcpBackendConfig, GcpIamBackend, GcpSecretManagerBackend, GcpTokenSource, OnePasswordBackend,
    OnePasswordBackendConfig, SystemCommandRunner, VaultBackend, VaultBackendConfig,
};
use super::provider::{BackendProvider, SecretProvider};
use super::reference::{
    BitwardenReferenceParser, EnvReferenceParser, IamReferenceParser, OnePasswordReferenceParser,
    SecretManagerReferenceParser, VaultReferenceParser,
};
use super::routes;
use super::unified::UnifiedProvider;
use crate::config::{ProviderConfig, ProviderSettings};
use crate::errors::{classify, Result, SecretsError};

/// Future returned by a provider factory
pub type ProviderFuture = BoxFuture<'static, Result<Arc<dyn SecretProvider>>>;

/// Builds a provider from its instance name and settings
pub type ProviderFactory = Arc<dyn Fn(String, ProviderSettings) -> ProviderFuture + Send + Sync>;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone, Default)]
pub struct ProviderRegistry {
    factories: BTreeMap<String, ProviderFactory>,
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry").field("types", &self.supported_types()).finish()
    }
}

impl ProviderRegistry {
    /// Registry without any factory
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every backend compiled into this build
    pub fn builtin() -> Self {
        Self::builtin_with_runner(Arc::new(SystemCommandRunner))
    }

    /// Built-in registry whose CLI backends run commands through `runner`
    pub fn builtin_with_runner(runner: Arc<dyn CommandRunner>) -> Self {
        let mut registry = Self::new();

        registry.register_factory("env", |name, settings| env_provider(name, settings).boxed());
        registry.register_factory("vault", |name, settings| vault_provider(name, settings).boxed());

        let op_runner = runner.clone();
        registry.register_factory("onepassword", move |name, settings| {
            onepassword_provider(name, settings, op_runner.clone()).boxed()
        });

        let bw_runner = runner.clone();
        registry.register_factory("bitwarden", move |name, settings| {
            bitwarden_provider(name, settings, bw_runner.clone()).boxed()
        });

        let gcp_runner = runner.clone();
        registry.register_factory("gcp", move |name, settings| {
            gcp_unified_provider(name, settings, gcp_runner.clone()).boxed()
        });

        let sm_runner = runner.clone();
        registry.register_factory("gcp-secret-manager", move |name, settings| {
            gcp_secret_manager_provider(name, settings, sm_runner.clone()).boxed()
        });

        registry.register_factory("gcp-iam", move |name, settings| {
            gcp_iam_provider(name, settings, runner.clone()).boxed()
        });

        #[cfg(feature = "aws")]
        aws::register(&mut registry);

        debug!(types = ?registry.supported_types(), "Registered built-in provider types");
        registry
    }

    /// Register (or replace) the factory of a provider type
    pub fn register_factory<F>(&mut self, provider_type: impl Into<String>, factory: F)
    where
        F: Fn(String, ProviderSettings) -> ProviderFuture + Send + Sync + 'static,
    {
        self.factories.insert(provider_type.into(), Arc::new(factory));
    }

    pub fn is_supported(&self, provider_type: &str) -> bool {
        self.factories.contains_key(provider_type)
    }

    /// Registered type names, sorted
    pub fn supported_types(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    /// Instantiate the provider `name` described by `config`
    pub async fn create_provider(
        &self,
        name: &str,
        config: &ProviderConfig,
    ) -> Result<Arc<dyn SecretProvider>> {
        let factory = self.factories.get(&config.provider_type).ok_or_else(|| {
            SecretsError::config(
                format!("providers.{name}.type"),
                format!("Unknown provider type '{}'", config.provider_type),
                format!("Use one of: {}", self.supported_types().join(", ")),
            )
        })?;

        let provider = factory(name.to_string(), config.settings(name)).await?;
        info!(provider = %name, provider_type = %config.provider_type, "Created secret provider");
        Ok(provider)
    }
}

fn http_client(settings: &ProviderSettings) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(settings.duration_secs("timeout_secs", HTTP_TIMEOUT)?)
        .build()
        .map_err(|e| {
            SecretsError::operational_with_source(
                "Failed to build HTTP client",
                "Check the TLS configuration of the host",
                Box::new(e),
            )
        })
}

async fn env_provider(name: String, settings: ProviderSettings) -> Result<Arc<dyn SecretProvider>> {
    let backend = EnvBackend::new(EnvBackendConfig::from_settings(&settings)?);
    Ok(Arc::new(BackendProvider::new(
        name,
        EnvReferenceParser,
        Arc::new(backend),
        EnvBackend::capabilities(),
        &classify::ENV,
    )))
}

async fn vault_provider(name: String, settings: ProviderSettings) -> Result<Arc<dyn SecretProvider>> {
    let backend = VaultBackend::new(VaultBackendConfig::from_settings(&settings)?);
    Ok(Arc::new(BackendProvider::new(
        name,
        VaultReferenceParser,
        Arc::new(backend),
        VaultBackend::capabilities(),
        &classify::VAULT,
    )))
}

async fn onepassword_provider(
    name: String,
    settings: ProviderSettings,
    runner: Arc<dyn CommandRunner>,
) -> Result<Arc<dyn SecretProvider>> {
    let backend =
        OnePasswordBackend::new(OnePasswordBackendConfig::from_settings(&settings)?, runner);
    Ok(Arc::new(BackendProvider::new(
        name,
        OnePasswordReferenceParser,
        Arc::new(backend),
        OnePasswordBackend::capabilities(),
        &classify::ONEPASSWORD,
    )))
}

async fn bitwarden_provider(
    name: String,
    settings: ProviderSettings,
    runner: Arc<dyn CommandRunner>,
) -> Result<Arc<dyn SecretProvider>> {
    let backend = BitwardenBackend::new(BitwardenBackendConfig::from_settings(&settings)?, runner);
    Ok(Arc::new(BackendProvider::new(
        name,
        BitwardenReferenceParser,
        Arc::new(backend),
        BitwardenBackend::capabilities(),
        &classify::BITWARDEN,
    )))
}

/// Parts shared by both GCP services of one provider instance
struct GcpParts {
    config: GcpBackendConfig,
    tokens: Arc<GcpTokenSource>,
    http: reqwest::Client,
}

impl GcpParts {
    async fn new(settings: &ProviderSettings, runner: Arc<dyn CommandRunner>) -> Result<Self> {
        let config = GcpBackendConfig::from_settings(settings)?;
        let tokens =
            GcpTokenSource::from_config(&config.auth, runner, &settings.field_path("credentials_file"))
                .await?;
        Ok(Self { config, tokens: Arc::new(tokens), http: http_client(settings)? })
    }

    fn secret_manager(&self, name: &str, project: String) -> Arc<dyn SecretProvider> {
        let backend = GcpSecretManagerBackend::new(
            self.http.clone(),
            self.config.secret_manager_url.clone(),
            project,
            self.tokens.clone(),
        );
        Arc::new(BackendProvider::new(
            name,
            SecretManagerReferenceParser,
            Arc::new(backend),
            GcpSecretManagerBackend::capabilities(),
            &classify::GCP_SECRET_MANAGER,
        ))
    }

    fn iam(&self, name: &str) -> Arc<dyn SecretProvider> {
        let backend = GcpIamBackend::new(self.http.clone(), &self.config, self.tokens.clone());
        Arc::new(BackendProvider::new(
            name,
            IamReferenceParser,
            Arc::new(backend),
            GcpIamBackend::capabilities(),
            &classify::GCP_IAM,
        ))
    }
}

fn require_project(settings: &ProviderSettings, config: &GcpBackendConfig) -> Result<String> {
    config.project.clone().ok_or_else(|| {
        SecretsError::config(
            settings.field_path("project"),
            "A GCP project is required for Secret Manager",
            "Set 'project' or export GOOGLE_CLOUD_PROJECT",
        )
    })
}

async fn gcp_secret_manager_provider(
    name: String,
    settings: ProviderSettings,
    runner: Arc<dyn CommandRunner>,
) -> Result<Arc<dyn SecretProvider>> {
    let parts = GcpParts::new(&settings, runner).await?;
    let project = require_project(&settings, &parts.config)?;
    Ok(parts.secret_manager(&name, project))
}

async fn gcp_iam_provider(
    name: String,
    settings: ProviderSettings,
    runner: Arc<dyn CommandRunner>,
) -> Result<Arc<dyn SecretProvider>> {
    let parts = GcpParts::new(&settings, runner).await?;
    Ok(parts.iam(&name))
}

/// Secret Manager joins only when a project is known; IAM is always there
async fn gcp_unified_provider(
    name: String,
    settings: ProviderSettings,
    runner: Arc<dyn CommandRunner>,
) -> Result<Arc<dyn SecretProvider>> {
    let parts = GcpParts::new(&settings, runner).await?;

    let mut builder = routes::gcp(UnifiedProvider::builder(&name))
        .service(routes::GCP_IAM, parts.iam(&name));

    let default_service = match parts.config.project.clone() {
        Some(project) => {
            builder =
                builder.service(routes::GCP_SECRET_MANAGER, parts.secret_manager(&name, project));
            routes::GCP_SECRET_MANAGER
        }
        None => routes::GCP_IAM,
    };

    let provider = builder
        .default_service(settings.get_str("default_service").unwrap_or_else(|| default_service.to_string()))
        .build()?;
    Ok(Arc::new(provider))
}

#[cfg(feature = "aws")]
mod aws {
    use super::*;
    use crate::secrets::backends::{AwsBackendConfig, AwsSecretsManagerBackend, AwsSsmBackend};
    use crate::secrets::reference::{SecretsManagerReferenceParser, SsmReferenceParser};

    pub(super) fn register(registry: &mut ProviderRegistry) {
        registry.register_factory("aws", |name, settings| unified(name, settings).boxed());
        registry.register_factory("aws-secrets-manager", |name, settings| {
            secrets_manager_provider(name, settings).boxed()
        });
        registry.register_factory("aws-ssm", |name, settings| ssm_provider(name, settings).boxed());
    }

    async fn sdk_config(settings: &ProviderSettings) -> Result<aws_config::SdkConfig> {
        Ok(AwsBackendConfig::from_settings(settings)?.load().await)
    }

    async fn secrets_manager_provider(
        name: String,
        settings: ProviderSettings,
    ) -> Result<Arc<dyn SecretProvider>> {
        Ok(secrets_manager(&name, &sdk_config(&settings).await?))
    }

    async fn ssm_provider(name: String, settings: ProviderSettings) -> Result<Arc<dyn SecretProvider>> {
        Ok(ssm(&name, &sdk_config(&settings).await?))
    }

    fn secrets_manager(name: &str, sdk: &aws_config::SdkConfig) -> Arc<dyn SecretProvider> {
        Arc::new(BackendProvider::new(
            name,
            SecretsManagerReferenceParser,
            Arc::new(AwsSecretsManagerBackend::new(sdk)),
            AwsSecretsManagerBackend::capabilities(),
            &classify::AWS_SECRETS_MANAGER,
        ))
    }

    fn ssm(name: &str, sdk: &aws_config::SdkConfig) -> Arc<dyn SecretProvider> {
        Arc::new(BackendProvider::new(
            name,
            SsmReferenceParser,
            Arc::new(AwsSsmBackend::new(sdk)),
            AwsSsmBackend::capabilities(),
            &classify::AWS_SSM,
        ))
    }

    async fn unified(name: String, settings: ProviderSettings) -> Result<Arc<dyn SecretProvider>> {
        let sdk = sdk_config(&settings).await?;
        let provider = routes::aws(UnifiedProvider::builder(&name))
            .service(routes::AWS_SECRETS_MANAGER, secrets_manager(&name, &sdk))
            .service(routes::AWS_SSM, ssm(&name, &sdk))
            .default_service(
                settings
                    .get_str("default_service")
                    .unwrap_or_else(|| routes::AWS_SECRETS_MANAGER.to_string()),
            )
            .build()?;
        Ok(Arc::new(provider))
    }
}
