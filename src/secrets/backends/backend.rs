//! Backend adapter trait and types
//!
//! Defines the four operations a concrete secret store exposes to the core.
//! Adapters return [`BackendError`]; classification happens in the provider.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::BackendResult;
use crate::secrets::reference::StructuredReference;
use crate::secrets::types::{SecretMetadata, SecretString};

/// Concrete backend behind an adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// HashiCorp Vault KV v2
    Vault,
    /// GCP Secret Manager
    GcpSecretManager,
    /// GCP IAM Credentials (short-lived tokens)
    GcpIam,
    /// AWS Secrets Manager
    AwsSecretsManager,
    /// AWS Systems Manager Parameter Store
    AwsSsm,
    /// 1Password CLI
    OnePassword,
    /// Bitwarden CLI
    Bitwarden,
    /// Process environment
    Env,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vault => "vault",
            Self::GcpSecretManager => "gcp-secret-manager",
            Self::GcpIam => "gcp-iam",
            Self::AwsSecretsManager => "aws-secrets-manager",
            Self::AwsSsm => "aws-ssm",
            Self::OnePassword => "onepassword",
            Self::Bitwarden => "bitwarden",
            Self::Env => "env",
        }
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "vault" => Ok(Self::Vault),
            "gcp-secret-manager" => Ok(Self::GcpSecretManager),
            "gcp-iam" => Ok(Self::GcpIam),
            "aws-secrets-manager" => Ok(Self::AwsSecretsManager),
            "aws-ssm" => Ok(Self::AwsSsm),
            "onepassword" => Ok(Self::OnePassword),
            "bitwarden" => Ok(Self::Bitwarden),
            "env" => Ok(Self::Env),
            _ => Err(format!("Unknown backend: {}", s)),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Credential returned by [`BackendAdapter::authenticate`]
#[derive(Debug, Clone)]
pub struct AuthToken {
    pub token: SecretString,
    pub ttl: Duration,
}

impl AuthToken {
    pub fn new(token: impl Into<SecretString>, ttl: Duration) -> Self {
        Self { token: token.into(), ttl }
    }
}

/// Value fetched by an adapter, before it becomes a `SecretValue`
#[derive(Debug, Clone)]
pub struct RawSecret {
    pub value: SecretString,
    pub version: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
    pub metadata: BTreeMap<String, String>,
}

impl RawSecret {
    pub fn new(value: impl Into<SecretString>) -> Self {
        Self { value: value.into(), version: None, updated_at: None, metadata: BTreeMap::new() }
    }

    pub fn with_version(mut self, version: Option<String>) -> Self {
        self.version = version;
        self
    }

    pub fn with_updated_at(mut self, updated_at: Option<DateTime<Utc>>) -> Self {
        self.updated_at = updated_at;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Trait for backend adapters
///
/// Implementations must be Send + Sync; one adapter instance is shared by
/// every concurrent call on its provider. Adapters whose capabilities do not
/// require authentication receive `None` as token.
#[async_trait]
pub trait BackendAdapter: Send + Sync + fmt::Debug {
    /// Backend identifier used in logs
    fn kind(&self) -> BackendKind;

    /// Obtain a fresh credential and its lifetime
    async fn authenticate(&self) -> BackendResult<AuthToken>;

    /// Fetch the value a structured reference points to
    async fn get_secret(
        &self,
        token: Option<&SecretString>,
        reference: &StructuredReference,
    ) -> BackendResult<RawSecret>;

    /// Describe the referenced item without reading its value
    async fn describe_item(
        &self,
        token: Option<&SecretString>,
        reference: &StructuredReference,
    ) -> BackendResult<SecretMetadata>;

    /// List item names under `path`; an empty path lists the backend root
    async fn list_items(&self, token: Option<&SecretString>, path: &str)
        -> BackendResult<Vec<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind_roundtrip() {
        for kind in [
            BackendKind::Vault,
            BackendKind::GcpSecretManager,
            BackendKind::GcpIam,
            BackendKind::AwsSecretsManager,
            BackendKind::AwsSsm,
            BackendKind::OnePassword,
            BackendKind::Bitwarden,
            BackendKind::Env,
        ] {
            let parsed: BackendKind = kind.as_str().parse().unwrap();
            assert_eq!(kind, parsed);
        }
        assert!("database".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_backend_kind_serialization() {
        let json = serde_json::to_string(&BackendKind::AwsSsm).unwrap();
        assert_eq!(json, "\"aws-ssm\"");
    }

    #[test]
    fn test_raw_secret_builder() {
        let raw = RawSecret::new("v").with_version(Some("2".into())).with_metadata("path", "a/b");
        assert_eq!(raw.value.expose_secret(), "v");
        assert_eq!(raw.version.as_deref(), Some("2"));
        assert_eq!(raw.metadata.get("path").map(String::as_str), Some("a/b"));
    }
}
