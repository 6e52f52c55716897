//! AWS Secrets Manager and SSM Parameter Store backends
//!
//! Credentials come from the SDK's default provider chain (environment,
//! profile, IMDS, ...). The SDK signs and refreshes on its own, so these
//! adapters report `requires_auth = false` and bypass the token cache.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_secretsmanager::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{debug, info};

use super::backend::{AuthToken, BackendAdapter, BackendKind, RawSecret};
use super::json_field;
use crate::config::ProviderSettings;
use crate::errors::{BackendError, BackendOperation, BackendResult, Result};
use crate::secrets::reference::aws::is_version_id;
use crate::secrets::reference::StructuredReference;
use crate::secrets::types::{Capabilities, SecretMetadata, SecretString};

const CURRENT_STAGE: &str = "AWSCURRENT";

/// SDK settings shared by both AWS adapters
#[derive(Debug, Clone, Default)]
pub struct AwsBackendConfig {
    pub region: Option<String>,
    pub profile: Option<String>,
    /// Endpoint override, e.g. LocalStack
    pub endpoint_url: Option<String>,
}

impl AwsBackendConfig {
    pub fn from_settings(settings: &ProviderSettings) -> Result<Self> {
        Ok(Self {
            region: settings.str_or_env("region", &["AWS_REGION", "AWS_DEFAULT_REGION"]),
            profile: settings.get_str("profile"),
            endpoint_url: settings.get_str("endpoint_url"),
        })
    }

    pub async fn load(&self) -> SdkConfig {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &self.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(profile) = &self.profile {
            loader = loader.profile_name(profile);
        }
        if let Some(endpoint) = &self.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        let config = loader.load().await;
        info!(
            region = ?config.region().map(|r| r.as_ref().to_string()),
            profile = ?self.profile,
            "Loaded AWS SDK configuration"
        );
        config
    }
}

fn capabilities(versioning: bool) -> Capabilities {
    Capabilities { supports_versioning: versioning, supports_metadata: true, ..Default::default() }
        .with_auth_methods(["default_chain", "profile"])
}

fn sdk_error<E>(operation: BackendOperation, resource: &str, err: SdkError<E>) -> BackendError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let status = err.raw_response().map(|r| r.status().as_u16());
    let detail = DisplayErrorContext(&err).to_string();
    let message = match err.code() {
        Some(code) => format!("{code}: {detail}"),
        None => detail,
    };
    let error = BackendError::new(operation, resource, message).with_source(err);
    match status {
        Some(status) => error.with_status(status),
        None => error,
    }
}

fn to_chrono(value: Option<&aws_sdk_secretsmanager::primitives::DateTime>) -> Option<DateTime<Utc>> {
    value.and_then(|t| DateTime::from_timestamp(t.secs(), t.subsec_nanos()))
}

fn no_auth() -> AuthToken {
    AuthToken::new("", Duration::ZERO)
}

/// AWS Secrets Manager adapter
#[derive(Debug, Clone)]
pub struct AwsSecretsManagerBackend {
    client: aws_sdk_secretsmanager::Client,
}

impl AwsSecretsManagerBackend {
    pub fn new(sdk_config: &SdkConfig) -> Self {
        Self { client: aws_sdk_secretsmanager::Client::new(sdk_config) }
    }

    pub fn capabilities() -> Capabilities {
        capabilities(true)
    }
}

#[async_trait]
impl BackendAdapter for AwsSecretsManagerBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::AwsSecretsManager
    }

    async fn authenticate(&self) -> BackendResult<AuthToken> {
        Ok(no_auth())
    }

    async fn get_secret(
        &self,
        _token: Option<&SecretString>,
        reference: &StructuredReference,
    ) -> BackendResult<RawSecret> {
        let op = BackendOperation::GetSecret;
        let name = &reference.name;

        // A UUID selects a version id, anything else a staging label
        let (version_id, version_stage) = match reference.version.as_deref() {
            Some(v) if is_version_id(v) => (Some(v.to_string()), None),
            Some(stage) => (None, Some(stage.to_string())),
            None => (None, None),
        };

        let output = self
            .client
            .get_secret_value()
            .secret_id(name)
            .set_version_id(version_id)
            .set_version_stage(version_stage)
            .send()
            .await
            .map_err(|e| sdk_error(op, name, e))?;

        let payload = match (output.secret_string(), output.secret_binary()) {
            (Some(text), _) => text.to_string(),
            (None, Some(blob)) => String::from_utf8(blob.as_ref().to_vec())
                .map_err(|_| BackendError::new(op, name, "secret is binary, not UTF-8 text"))?,
            (None, None) => {
                return Err(BackendError::missing(op, name, "secret has no value"));
            }
        };

        let value = match reference.field.as_deref() {
            Some(path) => json_field::extract(&payload, path)
                .map_err(|e| e.into_backend_error(op, &reference.display_path()))?,
            None => payload,
        };

        debug!(secret = %name, "Fetched AWS Secrets Manager secret");
        let mut raw = RawSecret::new(value)
            .with_version(output.version_id().map(String::from))
            .with_updated_at(to_chrono(output.created_date()));
        if let Some(arn) = output.arn() {
            raw = raw.with_metadata("arn", arn);
        }
        if !output.version_stages().is_empty() {
            raw = raw.with_metadata("stages", output.version_stages().join(","));
        }
        Ok(raw)
    }

    async fn describe_item(
        &self,
        _token: Option<&SecretString>,
        reference: &StructuredReference,
    ) -> BackendResult<SecretMetadata> {
        let op = BackendOperation::DescribeItem;
        let name = &reference.name;

        let output = self
            .client
            .describe_secret()
            .secret_id(name)
            .send()
            .await
            .map_err(|e| sdk_error(op, name, e))?;

        if output.deleted_date().is_some() {
            return Err(BackendError::missing(op, name, "secret is scheduled for deletion"));
        }

        let mut metadata = SecretMetadata::found().with_type("secretsmanager");
        metadata.updated_at =
            to_chrono(output.last_changed_date()).or_else(|| to_chrono(output.created_date()));
        metadata.version = output.version_ids_to_stages().and_then(|versions| {
            versions
                .iter()
                .find(|(_, stages)| stages.iter().any(|s| s == CURRENT_STAGE))
                .map(|(id, _)| id.clone())
        });
        for tag in output.tags() {
            if let (Some(key), Some(value)) = (tag.key(), tag.value()) {
                metadata.tags.insert(key.to_string(), value.to_string());
            }
        }
        Ok(metadata)
    }

    async fn list_items(
        &self,
        _token: Option<&SecretString>,
        _path: &str,
    ) -> BackendResult<Vec<String>> {
        let op = BackendOperation::ListItems;
        let output = self
            .client
            .list_secrets()
            .max_results(1)
            .send()
            .await
            .map_err(|e| sdk_error(op, "secrets", e))?;

        Ok(output.secret_list().iter().filter_map(|s| s.name().map(String::from)).collect())
    }
}

/// AWS Systems Manager Parameter Store adapter
#[derive(Debug, Clone)]
pub struct AwsSsmBackend {
    client: aws_sdk_ssm::Client,
}

impl AwsSsmBackend {
    pub fn new(sdk_config: &SdkConfig) -> Self {
        Self { client: aws_sdk_ssm::Client::new(sdk_config) }
    }

    pub fn capabilities() -> Capabilities {
        capabilities(true)
    }

    /// Parameter selector: `name` or `name:version`
    fn selector(reference: &StructuredReference) -> String {
        match &reference.version {
            Some(version) => format!("{}:{}", reference.name, version),
            None => reference.name.clone(),
        }
    }

    async fn parameter(
        &self,
        operation: BackendOperation,
        reference: &StructuredReference,
        decrypt: bool,
    ) -> BackendResult<aws_sdk_ssm::types::Parameter> {
        let selector = Self::selector(reference);
        let output = self
            .client
            .get_parameter()
            .name(&selector)
            .with_decryption(decrypt)
            .send()
            .await
            .map_err(|e| sdk_error(operation, &selector, e))?;

        output
            .parameter
            .ok_or_else(|| BackendError::missing(operation, &selector, "parameter not found"))
    }
}

#[async_trait]
impl BackendAdapter for AwsSsmBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::AwsSsm
    }

    async fn authenticate(&self) -> BackendResult<AuthToken> {
        Ok(no_auth())
    }

    async fn get_secret(
        &self,
        _token: Option<&SecretString>,
        reference: &StructuredReference,
    ) -> BackendResult<RawSecret> {
        let op = BackendOperation::GetSecret;
        let parameter = self.parameter(op, reference, true).await?;

        let payload = parameter
            .value()
            .ok_or_else(|| BackendError::missing(op, &reference.name, "parameter has no value"))?
            .to_string();

        let value = match reference.field.as_deref() {
            Some(path) => json_field::extract(&payload, path)
                .map_err(|e| e.into_backend_error(op, &reference.display_path()))?,
            None => payload,
        };

        let mut raw = RawSecret::new(value)
            .with_version(Some(parameter.version().to_string()))
            .with_updated_at(to_chrono(parameter.last_modified_date()));
        if let Some(kind) = parameter.r#type() {
            raw = raw.with_metadata("parameter_type", kind.as_str());
        }
        if let Some(arn) = parameter.arn() {
            raw = raw.with_metadata("arn", arn);
        }
        Ok(raw)
    }

    async fn describe_item(
        &self,
        _token: Option<&SecretString>,
        reference: &StructuredReference,
    ) -> BackendResult<SecretMetadata> {
        // Without decryption a SecureString comes back still encrypted
        let parameter = self.parameter(BackendOperation::DescribeItem, reference, false).await?;

        let mut metadata = SecretMetadata::found()
            .with_version(parameter.version().to_string())
            .with_type(parameter.r#type().map(|t| t.as_str()).unwrap_or("String"));
        metadata.updated_at = to_chrono(parameter.last_modified_date());
        if let Some(data_type) = parameter.data_type() {
            metadata.tags.insert("data_type".to_string(), data_type.to_string());
        }
        Ok(metadata)
    }

    async fn list_items(
        &self,
        _token: Option<&SecretString>,
        _path: &str,
    ) -> BackendResult<Vec<String>> {
        let op = BackendOperation::ListItems;
        let output = self
            .client
            .describe_parameters()
            .max_results(1)
            .send()
            .await
            .map_err(|e| sdk_error(op, "parameters", e))?;

        Ok(output.parameters().iter().filter_map(|p| p.name().map(String::from)).collect())
    }
}
