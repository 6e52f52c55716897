//! Vault secret backend implementation
//!
//! Reads secrets from the HashiCorp Vault KV v2 engine. References name a
//! path inside the configured mount and a field of the stored map.
//!
//! Two authentication methods are supported:
//!
//! - `token`: a static token. Its remaining TTL comes from `lookup-self`; a
//!   non-expiring token (TTL 0) is re-checked every `token_ttl_secs`.
//! - `approle`: `role_id`/`secret_id` login, cached for the lease duration.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};
use vaultrs::client::{VaultClient, VaultClientSettingsBuilder};
use vaultrs::error::ClientError;
use vaultrs::kv2;

use super::backend::{AuthToken, BackendAdapter, BackendKind, RawSecret};
use super::json_field;
use crate::config::ProviderSettings;
use crate::errors::{BackendError, BackendOperation, BackendResult, Result, SecretsError};
use crate::secrets::reference::StructuredReference;
use crate::secrets::types::{Capabilities, SecretMetadata, SecretString};

const DEFAULT_KV_MOUNT: &str = "secret";
const DEFAULT_APPROLE_MOUNT: &str = "approle";
const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(3600);

/// How the backend authenticates
#[derive(Debug, Clone)]
pub enum VaultAuth {
    Token(SecretString),
    AppRole { mount: String, role_id: String, secret_id: SecretString },
}

impl VaultAuth {
    pub fn method(&self) -> &'static str {
        match self {
            VaultAuth::Token(_) => "token",
            VaultAuth::AppRole { .. } => "approle",
        }
    }
}

/// Configuration for Vault backend
#[derive(Debug, Clone)]
pub struct VaultBackendConfig {
    /// Vault server address
    pub address: String,
    pub auth: VaultAuth,
    /// Vault namespace (for Enterprise)
    pub namespace: Option<String>,
    /// KV v2 mount path (default: "secret")
    pub kv_mount_path: String,
    /// Cache lifetime for tokens Vault reports as non-expiring
    pub token_ttl: Duration,
    pub skip_verify: bool,
}

impl VaultBackendConfig {
    /// Build configuration from provider settings.
    ///
    /// Falls back to `VAULT_ADDR`, `VAULT_TOKEN` and `VAULT_NAMESPACE`.
    pub fn from_settings(settings: &ProviderSettings) -> Result<Self> {
        let address = settings.require_str_or_env(
            "address",
            &["VAULT_ADDR"],
            "Set 'address' to the Vault URL or export VAULT_ADDR",
        )?;

        let auth = match settings.get_str("auth_method").as_deref().unwrap_or("token") {
            "token" => VaultAuth::Token(SecretString::new(settings.require_str_or_env(
                "token",
                &["VAULT_TOKEN"],
                "Set 'token' or export VAULT_TOKEN",
            )?)),
            "approle" => VaultAuth::AppRole {
                mount: settings
                    .get_str("approle_mount")
                    .unwrap_or_else(|| DEFAULT_APPROLE_MOUNT.to_string()),
                role_id: settings.require_str_or_env(
                    "role_id",
                    &["VAULT_ROLE_ID"],
                    "Set 'role_id' or export VAULT_ROLE_ID",
                )?,
                secret_id: SecretString::new(settings.require_str_or_env(
                    "secret_id",
                    &["VAULT_SECRET_ID"],
                    "Set 'secret_id' or export VAULT_SECRET_ID",
                )?),
            },
            other => {
                return Err(SecretsError::config(
                    settings.field_path("auth_method"),
                    format!("Unsupported Vault auth method '{other}'"),
                    "Use 'token' or 'approle'",
                ))
            }
        };

        Ok(Self {
            address,
            auth,
            namespace: settings.str_or_env("namespace", &["VAULT_NAMESPACE"]),
            kv_mount_path: settings
                .get_str("mount")
                .unwrap_or_else(|| DEFAULT_KV_MOUNT.to_string()),
            token_ttl: settings.duration_secs("token_ttl_secs", DEFAULT_TOKEN_TTL)?,
            skip_verify: settings.bool("skip_verify", false)?,
        })
    }
}

/// HashiCorp Vault KV v2 adapter
pub struct VaultBackend {
    config: VaultBackendConfig,
}

impl std::fmt::Debug for VaultBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultBackend")
            .field("address", &self.config.address)
            .field("auth_method", &self.config.auth.method())
            .field("kv_mount_path", &self.config.kv_mount_path)
            .finish()
    }
}

impl VaultBackend {
    pub fn new(config: VaultBackendConfig) -> Self {
        info!(
            address = %config.address,
            kv_mount = %config.kv_mount_path,
            auth_method = config.auth.method(),
            "Initialized Vault backend"
        );
        Self { config }
    }

    pub fn capabilities() -> Capabilities {
        Capabilities {
            supports_versioning: true,
            supports_metadata: true,
            requires_auth: true,
            ..Default::default()
        }
        .with_auth_methods(["token", "approle"])
    }

    /// Build a client, authenticated with `token` when given
    fn client(
        &self,
        operation: BackendOperation,
        token: Option<&SecretString>,
    ) -> BackendResult<VaultClient> {
        let mut settings_builder = VaultClientSettingsBuilder::default();
        settings_builder.address(&self.config.address).verify(!self.config.skip_verify);

        if let Some(token) = token {
            settings_builder.token(token.expose_secret());
        }

        if let Some(ref namespace) = self.config.namespace {
            settings_builder.namespace(Some(namespace.clone()));
        }

        let settings = settings_builder.build().map_err(|e| {
            BackendError::new(operation, &self.config.address, format!("invalid client settings: {e}"))
        })?;

        VaultClient::new(settings).map_err(|e| client_error(operation, &self.config.address, e))
    }

    fn mount(&self) -> &str {
        &self.config.kv_mount_path
    }
}

/// Map a vaultrs error, keeping the HTTP status for classification
fn client_error(operation: BackendOperation, resource: &str, error: ClientError) -> BackendError {
    let backend_error = match &error {
        ClientError::APIError { code, errors } => {
            let message = if errors.is_empty() {
                format!("Vault returned status {code}")
            } else {
                errors.join("; ")
            };
            BackendError::new(operation, resource, message).with_status(*code)
        }
        other => BackendError::new(operation, resource, other.to_string()),
    };
    backend_error.with_source(error)
}

/// KV answers a LIST on a prefix holding no keys with a bare 404. A 404
/// carrying errors (such as "no handler for route") means the mount is missing.
fn listing(
    resource: &str,
    result: std::result::Result<Vec<String>, ClientError>,
) -> BackendResult<Vec<String>> {
    match result {
        Ok(keys) => Ok(keys),
        Err(ClientError::APIError { code: 404, errors }) if errors.is_empty() => Ok(Vec::new()),
        Err(e) => Err(client_error(BackendOperation::ListItems, resource, e)),
    }
}

fn parse_time(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value).ok().map(|t| t.with_timezone(&Utc))
}

fn parse_version(
    operation: BackendOperation,
    reference: &StructuredReference,
) -> BackendResult<Option<u64>> {
    reference
        .version
        .as_deref()
        .map(|v| {
            v.parse::<u64>().map_err(|_| {
                BackendError::new(operation, &reference.name, format!("invalid version '{v}'"))
            })
        })
        .transpose()
}

#[async_trait]
impl BackendAdapter for VaultBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Vault
    }

    async fn authenticate(&self) -> BackendResult<AuthToken> {
        let op = BackendOperation::Authenticate;
        match &self.config.auth {
            VaultAuth::Token(token) => {
                let client = self.client(op, Some(token))?;
                let info = vaultrs::token::lookup_self(&client)
                    .await
                    .map_err(|e| client_error(op, "auth/token/lookup-self", e))?;

                let ttl = if info.ttl == 0 { self.config.token_ttl } else { Duration::from_secs(info.ttl) };
                debug!(ttl_secs = ttl.as_secs(), "Vault token verified");
                Ok(AuthToken::new(token.clone(), ttl))
            }
            VaultAuth::AppRole { mount, role_id, secret_id } => {
                let client = self.client(op, None)?;
                let auth = vaultrs::auth::approle::login(
                    &client,
                    mount,
                    role_id,
                    secret_id.expose_secret(),
                )
                .await
                .map_err(|e| client_error(op, &format!("auth/{mount}/login"), e))?;

                debug!(ttl_secs = auth.lease_duration, "Vault AppRole login succeeded");
                Ok(AuthToken::new(auth.client_token, Duration::from_secs(auth.lease_duration)))
            }
        }
    }

    async fn get_secret(
        &self,
        token: Option<&SecretString>,
        reference: &StructuredReference,
    ) -> BackendResult<RawSecret> {
        let op = BackendOperation::GetSecret;
        let client = self.client(op, token)?;
        let path = reference.name.as_str();

        let data: HashMap<String, Value> = match parse_version(op, reference)? {
            Some(version) => kv2::read_version(&client, self.mount(), path, version).await,
            None => kv2::read(&client, self.mount(), path).await,
        }
        .map_err(|e| client_error(op, path, e))?;

        let field = reference.field.as_deref().unwrap_or(crate::secrets::reference::vault::DEFAULT_FIELD);
        let value = match data.get(field) {
            Some(value) => json_field::render(value),
            None => {
                let document = Value::Object(data.into_iter().collect());
                json_field::select(&document, field).map(json_field::render).ok_or_else(|| {
                    BackendError::missing(
                        op,
                        reference.display_path(),
                        format!("field '{field}' not found at '{path}'"),
                    )
                })?
            }
        };

        Ok(RawSecret::new(value)
            .with_version(reference.version.clone())
            .with_metadata("mount", self.mount()))
    }

    async fn describe_item(
        &self,
        token: Option<&SecretString>,
        reference: &StructuredReference,
    ) -> BackendResult<SecretMetadata> {
        let op = BackendOperation::DescribeItem;
        let client = self.client(op, token)?;
        let path = reference.name.as_str();

        let meta = kv2::read_metadata(&client, self.mount(), path)
            .await
            .map_err(|e| client_error(op, path, e))?;

        let mut metadata = SecretMetadata::found().with_type("kv-v2");
        if let Some(tags) = meta.custom_metadata {
            metadata.tags = tags.into_iter().collect();
        }

        match parse_version(op, reference)? {
            Some(version) => {
                let Some(entry) = meta.versions.get(&version.to_string()) else {
                    return Err(BackendError::missing(
                        op,
                        path,
                        format!("version {version} does not exist"),
                    ));
                };
                if entry.destroyed || !entry.deletion_time.is_empty() {
                    return Err(BackendError::missing(op, path, format!("version {version} is deleted")));
                }
                metadata.version = Some(version.to_string());
                metadata.updated_at = parse_time(&entry.created_time);
            }
            None => {
                metadata.version = Some(meta.current_version.to_string());
                metadata.updated_at = parse_time(&meta.updated_time);
            }
        }

        Ok(metadata)
    }

    async fn list_items(
        &self,
        token: Option<&SecretString>,
        path: &str,
    ) -> BackendResult<Vec<String>> {
        let op = BackendOperation::ListItems;
        let client = self.client(op, token)?;
        let resource = format!("{}/{}", self.mount(), path);
        listing(&resource, kv2::list(&client, self.mount(), path).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{classify, ErrorKind};
    use std::collections::BTreeMap;

    fn settings(values: &[(&str, &str)]) -> ProviderSettings {
        let map: BTreeMap<String, Value> =
            values.iter().map(|(k, v)| (k.to_string(), Value::from(*v))).collect();
        ProviderSettings::new("vault", map)
    }

    #[test]
    fn test_config_token_auth() {
        let config = VaultBackendConfig::from_settings(&settings(&[
            ("address", "https://vault:8200"),
            ("token", "s.abc"),
            ("mount", "kv"),
        ]))
        .unwrap();
        assert_eq!(config.address, "https://vault:8200");
        assert_eq!(config.kv_mount_path, "kv");
        assert_eq!(config.auth.method(), "token");
        assert_eq!(config.token_ttl, DEFAULT_TOKEN_TTL);
    }

    #[test]
    fn test_config_approle_requires_ids() {
        let err = VaultBackendConfig::from_settings(&settings(&[
            ("address", "https://vault:8200"),
            ("auth_method", "approle"),
            ("role_id", "r-1"),
        ]));
        // VAULT_SECRET_ID may be exported by a developer shell
        if std::env::var("VAULT_SECRET_ID").is_err() {
            match err.unwrap_err() {
                SecretsError::Config { field, .. } => assert_eq!(field, "providers.vault.secret_id"),
                other => panic!("unexpected error: {other:?}"),
            }
        }
    }

    #[test]
    fn test_config_rejects_unknown_auth_method() {
        let err = VaultBackendConfig::from_settings(&settings(&[
            ("address", "https://vault:8200"),
            ("auth_method", "kerberos"),
        ]))
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_api_errors_keep_status() {
        let err = client_error(
            BackendOperation::GetSecret,
            "app/db",
            ClientError::APIError { code: 403, errors: vec!["permission denied".into()] },
        );
        assert_eq!(err.status, Some(403));
        assert_eq!(classify::VAULT.kind_of(&err), ErrorKind::Auth);

        let err = client_error(
            BackendOperation::GetSecret,
            "app/db",
            ClientError::APIError { code: 404, errors: vec![] },
        );
        assert_eq!(classify::VAULT.kind_of(&err), ErrorKind::NotFound);
    }

    #[test]
    fn test_empty_listing_is_ok_but_missing_mount_is_not() {
        let keys = listing("secret/", Err(ClientError::APIError { code: 404, errors: vec![] }));
        assert!(keys.unwrap().is_empty());

        let err = listing(
            "typo/",
            Err(ClientError::APIError {
                code: 404,
                errors: vec!["no handler for route \"typo/metadata\"".into()],
            }),
        )
        .unwrap_err();
        assert_eq!(err.resource, "typo/");
        assert_eq!(classify::VAULT.kind_of(&err), ErrorKind::NotFound);
    }

    #[test]
    fn test_debug_hides_token() {
        let config = VaultBackendConfig::from_settings(&settings(&[
            ("address", "https://vault:8200"),
            ("token", "s.super-secret"),
        ]))
        .unwrap();
        let backend = VaultBackend::new(config);
        assert!(!format!("{backend:?}").contains("super-secret"));
    }
}
