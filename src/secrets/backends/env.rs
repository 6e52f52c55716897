//! Environment variable backend
//!
//! Reads secrets from the process environment, optionally under a name
//! prefix (`prefix = "APP_"` turns reference `DB_PASSWORD` into
//! `APP_DB_PASSWORD`). No authentication.

use async_trait::async_trait;
use std::time::Duration;

use super::backend::{AuthToken, BackendAdapter, BackendKind, RawSecret};
use crate::config::ProviderSettings;
use crate::errors::{BackendError, BackendOperation, BackendResult, Result};
use crate::secrets::reference::StructuredReference;
use crate::secrets::types::{Capabilities, SecretMetadata, SecretString};

/// Configuration for the environment backend
#[derive(Debug, Clone, Default)]
pub struct EnvBackendConfig {
    pub prefix: String,
}

impl EnvBackendConfig {
    pub fn from_settings(settings: &ProviderSettings) -> Result<Self> {
        Ok(Self { prefix: settings.get_str("prefix").unwrap_or_default() })
    }
}

#[derive(Debug, Clone, Default)]
pub struct EnvBackend {
    prefix: String,
}

impl EnvBackend {
    pub fn new(config: EnvBackendConfig) -> Self {
        Self { prefix: config.prefix }
    }

    pub fn capabilities() -> Capabilities {
        Capabilities::default()
    }

    fn variable(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    fn read(&self, operation: BackendOperation, name: &str) -> BackendResult<String> {
        let variable = self.variable(name);
        std::env::var(&variable).map_err(|e| match e {
            std::env::VarError::NotPresent => BackendError::missing(
                operation,
                &variable,
                format!("environment variable '{variable}' is not set"),
            ),
            std::env::VarError::NotUnicode(_) => BackendError::new(
                operation,
                &variable,
                format!("environment variable '{variable}' is not valid UTF-8"),
            ),
        })
    }
}

#[async_trait]
impl BackendAdapter for EnvBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Env
    }

    async fn authenticate(&self) -> BackendResult<AuthToken> {
        Ok(AuthToken::new("", Duration::ZERO))
    }

    async fn get_secret(
        &self,
        _token: Option<&SecretString>,
        reference: &StructuredReference,
    ) -> BackendResult<RawSecret> {
        let value = self.read(BackendOperation::GetSecret, &reference.name)?;
        Ok(RawSecret::new(value).with_metadata("variable", self.variable(&reference.name)))
    }

    async fn describe_item(
        &self,
        _token: Option<&SecretString>,
        reference: &StructuredReference,
    ) -> BackendResult<SecretMetadata> {
        let value = self.read(BackendOperation::DescribeItem, &reference.name)?;
        Ok(SecretMetadata::found().with_size(value.len() as u64).with_type("env"))
    }

    async fn list_items(
        &self,
        _token: Option<&SecretString>,
        path: &str,
    ) -> BackendResult<Vec<String>> {
        let prefix = self.variable(path);
        let mut names: Vec<String> = std::env::vars_os()
            .filter_map(|(key, _)| key.into_string().ok())
            .filter(|key| key.starts_with(&prefix))
            .filter_map(|key| key.strip_prefix(&self.prefix).map(String::from))
            .collect();
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference(name: &str) -> StructuredReference {
        StructuredReference::new(name)
    }

    #[tokio::test]
    async fn test_reads_prefixed_variable() {
        std::env::set_var("KEYPLANE_TEST_ENV_DB_PASSWORD", "hunter2");
        let backend = EnvBackend::new(EnvBackendConfig { prefix: "KEYPLANE_TEST_ENV_".into() });

        let raw = backend.get_secret(None, &reference("DB_PASSWORD")).await.unwrap();
        assert_eq!(raw.value.expose_secret(), "hunter2");

        let meta = backend.describe_item(None, &reference("DB_PASSWORD")).await.unwrap();
        assert_eq!(meta.size, Some(7));

        let names = backend.list_items(None, "").await.unwrap();
        assert!(names.contains(&"DB_PASSWORD".to_string()));
        std::env::remove_var("KEYPLANE_TEST_ENV_DB_PASSWORD");
    }

    #[tokio::test]
    async fn test_unset_variable_is_missing() {
        let backend = EnvBackend::default();
        let err = backend
            .get_secret(None, &reference("KEYPLANE_TEST_ENV_NEVER_SET"))
            .await
            .unwrap_err();
        assert_eq!(err.hint, Some(crate::errors::ErrorKind::NotFound));
    }
}
