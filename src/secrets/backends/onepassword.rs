//! 1Password backend over the `op` CLI
//!
//! Two ways to authenticate:
//!
//! - a service account token (`service_account_token` or
//!   `OP_SERVICE_ACCOUNT_TOKEN`), handed to every `op` call through the
//!   child environment
//! - an interactive account session from `op signin --raw`, passed back
//!   with `--session` until it expires

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::backend::{AuthToken, BackendAdapter, BackendKind, RawSecret};
use super::command::{run_checked, CommandRunner};
use crate::config::ProviderSettings;
use crate::errors::{BackendError, BackendOperation, BackendResult, ErrorKind, Result};
use crate::secrets::reference::onepassword::DEFAULT_FIELD;
use crate::secrets::reference::StructuredReference;
use crate::secrets::types::{Capabilities, SecretMetadata, SecretString};

const DEFAULT_PROGRAM: &str = "op";
const SERVICE_ACCOUNT_ENV: &str = "OP_SERVICE_ACCOUNT_TOKEN";
/// 1Password expires idle CLI sessions after 30 minutes
const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(30 * 60);
const SERVICE_ACCOUNT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Clone)]
pub struct OnePasswordBackendConfig {
    pub program: String,
    pub account: Option<String>,
    pub service_account_token: Option<SecretString>,
    pub session_ttl: Duration,
}

impl fmt::Debug for OnePasswordBackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnePasswordBackendConfig")
            .field("program", &self.program)
            .field("account", &self.account)
            .field("service_account", &self.service_account_token.is_some())
            .field("session_ttl", &self.session_ttl)
            .finish()
    }
}

impl OnePasswordBackendConfig {
    pub fn from_settings(settings: &ProviderSettings) -> Result<Self> {
        Ok(Self {
            program: settings.get_str("program").unwrap_or_else(|| DEFAULT_PROGRAM.to_string()),
            account: settings.get_str("account"),
            service_account_token: settings
                .str_or_env("service_account_token", &[SERVICE_ACCOUNT_ENV])
                .map(SecretString::new),
            session_ttl: settings.duration_secs("session_ttl_secs", DEFAULT_SESSION_TTL)?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ItemDetails {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    version: Option<u64>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    fields: Vec<ItemField>,
}

#[derive(Debug, Deserialize)]
struct ItemField {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    section: Option<FieldSection>,
    #[serde(default)]
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FieldSection {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    label: Option<String>,
}

/// Matches a label case-insensitively or an id exactly, like `op read`
fn names(id: Option<&str>, label: Option<&str>, wanted: &str) -> bool {
    id == Some(wanted) || label.is_some_and(|l| l.eq_ignore_ascii_case(wanted))
}

impl ItemField {
    /// Whether this field is the one `selector` (`field` or `section/field`) reads
    fn is_selected_by(&self, selector: &str) -> bool {
        let (section, field) = match selector.rsplit_once('/') {
            Some((section, field)) => (Some(section), field),
            None => (None, selector),
        };
        if !names(self.id.as_deref(), self.label.as_deref(), field) {
            return false;
        }
        match section {
            None => true,
            Some(wanted) => self
                .section
                .as_ref()
                .is_some_and(|s| names(s.id.as_deref(), s.label.as_deref(), wanted)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct NamedEntry {
    #[serde(alias = "title")]
    name: String,
}

#[derive(Debug)]
pub struct OnePasswordBackend {
    config: OnePasswordBackendConfig,
    runner: Arc<dyn CommandRunner>,
}

impl OnePasswordBackend {
    pub fn new(config: OnePasswordBackendConfig, runner: Arc<dyn CommandRunner>) -> Self {
        info!(
            program = %config.program,
            service_account = config.service_account_token.is_some(),
            "Initialized 1Password backend"
        );
        Self { config, runner }
    }

    pub fn capabilities() -> Capabilities {
        Capabilities { supports_metadata: true, requires_auth: true, ..Default::default() }
            .with_auth_methods(["service_account", "session"])
    }

    /// Run `op` with the credential for this mode attached
    async fn op(
        &self,
        operation: BackendOperation,
        resource: &str,
        token: Option<&SecretString>,
        mut args: Vec<String>,
    ) -> BackendResult<String> {
        let mut env = Vec::new();
        if let Some(account) = &self.config.account {
            args.extend(["--account".to_string(), account.clone()]);
        }
        match (token, self.config.service_account_token.is_some()) {
            (Some(token), true) => env.push((SERVICE_ACCOUNT_ENV.to_string(), token.clone())),
            (Some(token), false) => {
                args.extend(["--session".to_string(), token.expose_secret().to_string()])
            }
            (None, _) => {}
        }
        run_checked(self.runner.as_ref(), operation, resource, &self.config.program, &args, &env).await
    }

    fn split_name(reference: &StructuredReference) -> (&str, &str) {
        reference.name.split_once('/').unwrap_or(("", reference.name.as_str()))
    }
}

fn decode<T: serde::de::DeserializeOwned>(
    operation: BackendOperation,
    resource: &str,
    stdout: &str,
) -> BackendResult<T> {
    serde_json::from_str(stdout).map_err(|e| {
        BackendError::new(operation, resource, format!("unexpected op output: {e}")).with_source(e)
    })
}

#[async_trait]
impl BackendAdapter for OnePasswordBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::OnePassword
    }

    async fn authenticate(&self) -> BackendResult<AuthToken> {
        if let Some(token) = &self.config.service_account_token {
            return Ok(AuthToken::new(token.clone(), SERVICE_ACCOUNT_TTL));
        }

        let op = BackendOperation::Authenticate;
        let args = vec!["signin".to_string(), "--raw".to_string()];
        let session = self.op(op, "session", None, args).await?;
        let session = session.trim();
        if session.is_empty() {
            return Err(BackendError::new(op, "session", "op signin returned no session token")
                .with_hint(ErrorKind::Auth));
        }
        Ok(AuthToken::new(session, self.config.session_ttl))
    }

    async fn get_secret(
        &self,
        token: Option<&SecretString>,
        reference: &StructuredReference,
    ) -> BackendResult<RawSecret> {
        let field = reference.field.as_deref().unwrap_or(DEFAULT_FIELD);
        let uri = format!("op://{}/{}", reference.name, field);
        let args = vec!["read".to_string(), uri.clone(), "--no-newline".to_string()];

        let value = self.op(BackendOperation::GetSecret, &uri, token, args).await?;
        Ok(RawSecret::new(value).with_metadata("uri", uri))
    }

    async fn describe_item(
        &self,
        token: Option<&SecretString>,
        reference: &StructuredReference,
    ) -> BackendResult<SecretMetadata> {
        let op = BackendOperation::DescribeItem;
        let (vault, item) = Self::split_name(reference);
        let args = ["item", "get", item, "--vault", vault, "--format", "json"]
            .map(String::from)
            .to_vec();

        let stdout = self.op(op, &reference.name, token, args).await?;
        let details: ItemDetails = decode(op, &reference.name, &stdout)?;

        // The item exists; the selected field must exist as well
        let field = reference.field.as_deref().unwrap_or(DEFAULT_FIELD);
        let selected = details.fields.iter().find(|f| f.is_selected_by(field));
        let Some(selected) = selected else {
            return Err(BackendError::missing(
                op,
                &reference.display_path(),
                format!("field '{field}' not found on item"),
            ));
        };

        let mut metadata = SecretMetadata::found();
        metadata.version = details.version.map(|v| v.to_string());
        metadata.updated_at = details.updated_at;
        metadata.secret_type = details.category.map(|c| c.to_lowercase());
        metadata.size = selected.value.as_ref().map(|v| v.len() as u64);
        if let Some(id) = details.id {
            metadata.tags.insert("id".to_string(), id);
        }
        if !details.tags.is_empty() {
            metadata.tags.insert("tags".to_string(), details.tags.join(","));
        }
        Ok(metadata)
    }

    async fn list_items(
        &self,
        token: Option<&SecretString>,
        path: &str,
    ) -> BackendResult<Vec<String>> {
        let op = BackendOperation::ListItems;
        let args = if path.is_empty() {
            ["vault", "list", "--format", "json"].map(String::from).to_vec()
        } else {
            ["item", "list", "--vault", path, "--format", "json"].map(String::from).to_vec()
        };

        let stdout = self.op(op, path, token, args).await?;
        let entries: Vec<NamedEntry> = decode(op, path, &stdout)?;
        Ok(entries.into_iter().map(|e| e.name).collect())
    }
}
