//! Bitwarden backend over the `bw` CLI
//!
//! The vault is unlocked with `bw unlock --raw --passwordenv BW_PASSWORD`
//! and the resulting session key is handed to later calls as `BW_SESSION`.
//! An existing session (`session` setting or `BW_SESSION`) skips the unlock.

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
use crate::secrets::reference::bitwarden::DEFAULT_FIELD;
use crate::secrets::reference::StructuredReference;
use crate::secrets::types::{Capabilities, SecretMetadata, SecretString};

const DEFAULT_PROGRAM: &str = "bw";
const PASSWORD_ENV: &str = "BW_PASSWORD";
const SESSION_ENV: &str = "BW_SESSION";
const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(30 * 60);

#[derive(Clone)]
pub struct BitwardenBackendConfig {
    pub program: String,
    /// Master password; when unset the CLI reads `BW_PASSWORD` itself
    pub password: Option<SecretString>,
    /// Pre-unlocked session key
    pub session: Option<SecretString>,
    pub session_ttl: Duration,
}

impl fmt::Debug for BitwardenBackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BitwardenBackendConfig")
            .field("program", &self.program)
            .field("password", &self.password.is_some())
            .field("session", &self.session.is_some())
            .field("session_ttl", &self.session_ttl)
            .finish()
    }
}

impl BitwardenBackendConfig {
    pub fn from_settings(settings: &ProviderSettings) -> Result<Self> {
        Ok(Self {
            program: settings.get_str("program").unwrap_or_else(|| DEFAULT_PROGRAM.to_string()),
            password: settings.get_str("password").map(SecretString::new),
            session: settings.str_or_env("session", &[SESSION_ENV]).map(SecretString::new),
            session_ttl: settings.duration_secs("session_ttl_secs", DEFAULT_SESSION_TTL)?,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Item {
    #[serde(default)]
    id: Option<String>,
    name: String,
    #[serde(rename = "type", default)]
    item_type: Option<u8>,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default)]
    login: Option<Login>,
    #[serde(default)]
    fields: Vec<CustomField>,
    #[serde(default)]
    revision_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
struct Login {
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    totp: Option<String>,
    #[serde(default)]
    uris: Vec<LoginUri>,
}

#[derive(Debug, Deserialize)]
struct LoginUri {
    #[serde(default)]
    uri: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CustomField {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    value: Option<String>,
}

impl Item {
    /// Built-in login fields first, then custom fields by name
    fn field(&self, field: &str) -> Option<&str> {
        let login = self.login.as_ref();
        let builtin = match field {
            "password" => login.and_then(|l| l.password.as_deref()),
            "username" => login.and_then(|l| l.username.as_deref()),
            "totp" => login.and_then(|l| l.totp.as_deref()),
            "uri" => login.and_then(|l| l.uris.first()).and_then(|u| u.uri.as_deref()),
            "notes" => self.notes.as_deref(),
            _ => None,
        };
        builtin.or_else(|| {
            self.fields
                .iter()
                .find(|f| f.name.as_deref() == Some(field))
                .and_then(|f| f.value.as_deref())
        })
    }

    fn type_name(&self) -> &'static str {
        match self.item_type {
            Some(1) => "login",
            Some(2) => "secure_note",
            Some(3) => "card",
            Some(4) => "identity",
            _ => "item",
        }
    }
}

#[derive(Debug)]
pub struct BitwardenBackend {
    config: BitwardenBackendConfig,
    runner: Arc<dyn CommandRunner>,
}

impl BitwardenBackend {
    pub fn new(config: BitwardenBackendConfig, runner: Arc<dyn CommandRunner>) -> Self {
        info!(program = %config.program, session = config.session.is_some(), "Initialized Bitwarden backend");
        Self { config, runner }
    }

    pub fn capabilities() -> Capabilities {
        Capabilities { supports_metadata: true, requires_auth: true, ..Default::default() }
            .with_auth_methods(["master_password", "session"])
    }

    async fn bw(
        &self,
        operation: BackendOperation,
        resource: &str,
        token: Option<&SecretString>,
        args: &[&str],
    ) -> BackendResult<String> {
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        let env: Vec<(String, SecretString)> =
            token.map(|t| (SESSION_ENV.to_string(), t.clone())).into_iter().collect();
        run_checked(self.runner.as_ref(), operation, resource, &self.config.program, &args, &env).await
    }

    async fn item(
        &self,
        operation: BackendOperation,
        token: Option<&SecretString>,
        name: &str,
    ) -> BackendResult<Item> {
        let stdout = self.bw(operation, name, token, &["get", "item", name]).await?;
        serde_json::from_str(&stdout).map_err(|e| {
            BackendError::new(operation, name, format!("unexpected bw output: {e}")).with_source(e)
        })
    }
}

#[async_trait]
impl BackendAdapter for BitwardenBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Bitwarden
    }

    async fn authenticate(&self) -> BackendResult<AuthToken> {
        if let Some(session) = &self.config.session {
            return Ok(AuthToken::new(session.clone(), self.config.session_ttl));
        }

        let op = BackendOperation::Authenticate;
        let env: Vec<(String, SecretString)> = match &self.config.password {
            Some(password) => vec![(PASSWORD_ENV.to_string(), password.clone())],
            None if std::env::var_os(PASSWORD_ENV).is_some() => Vec::new(),
            None => {
                return Err(BackendError::new(
                    op,
                    "session",
                    format!("no master password: set 'password' or export {PASSWORD_ENV}"),
                )
                .with_hint(ErrorKind::Auth))
            }
        };

        let args = ["unlock", "--raw", "--passwordenv", PASSWORD_ENV].map(String::from);
        let session =
            run_checked(self.runner.as_ref(), op, "session", &self.config.program, &args, &env).await?;
        let session = session.trim();
        if session.is_empty() {
            return Err(BackendError::new(op, "session", "bw unlock returned no session key")
                .with_hint(ErrorKind::Auth));
        }
        Ok(AuthToken::new(session, self.config.session_ttl))
    }

    async fn get_secret(
        &self,
        token: Option<&SecretString>,
        reference: &StructuredReference,
    ) -> BackendResult<RawSecret> {
        let op = BackendOperation::GetSecret;
        let field = reference.field.as_deref().unwrap_or(DEFAULT_FIELD);
        let item = self.item(op, token, &reference.name).await?;

        let value = item.field(field).ok_or_else(|| {
            BackendError::missing(
                op,
                &reference.display_path(),
                format!("field '{field}' not found on item '{}'", item.name),
            )
        })?;

        let mut raw = RawSecret::new(value).with_updated_at(item.revision_date);
        if let Some(id) = &item.id {
            raw = raw.with_metadata("item_id", id.as_str());
        }
        Ok(raw)
    }

    async fn describe_item(
        &self,
        token: Option<&SecretString>,
        reference: &StructuredReference,
    ) -> BackendResult<SecretMetadata> {
        let op = BackendOperation::DescribeItem;
        let field = reference.field.as_deref().unwrap_or(DEFAULT_FIELD);
        let item = self.item(op, token, &reference.name).await?;

        let Some(value) = item.field(field) else {
            return Err(BackendError::missing(
                op,
                &reference.display_path(),
                format!("field '{field}' not found on item '{}'", item.name),
            ));
        };

        let mut metadata = SecretMetadata::found()
            .with_size(value.len() as u64)
            .with_type(item.type_name())
            .with_tag("name", item.name.as_str());
        metadata.updated_at = item.revision_date;
        if let Some(id) = &item.id {
            metadata.tags.insert("id".to_string(), id.clone());
        }
        Ok(metadata)
    }

    async fn list_items(
        &self,
        token: Option<&SecretString>,
        path: &str,
    ) -> BackendResult<Vec<String>> {
        let op = BackendOperation::ListItems;
        let stdout = if path.is_empty() {
            self.bw(op, "items", token, &["list", "items"]).await?
        } else {
            self.bw(op, path, token, &["list", "items", "--search", path]).await?
        };

        let items: Vec<Item> = serde_json::from_str(&stdout).map_err(|e| {
            BackendError::new(op, path, format!("unexpected bw output: {e}")).with_source(e)
        })?;
        Ok(items.into_iter().map(|i| i.name).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::backends::command::testing::ScriptedRunner;
    use crate::secrets::backends::command::CommandOutput;

    const ITEM: &str = r#"{
        "id": "9f1c",
        "name": "github",
        "type": 1,
        "notes": "2fa on",
        "login": {"username": "octo", "password": "hunter2", "uris": [{"uri": "https://github.com"}]},
        "fields": [{"name": "api_key", "value": "ghp_x"}],
        "revisionDate": "2024-05-01T10:00:00.000Z"
    }"#;

    fn backend(runner: Arc<ScriptedRunner>, password: Option<&str>) -> BitwardenBackend {
        BitwardenBackend::new(
            BitwardenBackendConfig {
                program: "bw".into(),
                password: password.map(SecretString::new),
                session: None,
                session_ttl: DEFAULT_SESSION_TTL,
            },
            runner,
        )
    }

    #[test]
    fn test_item_field_selection() {
        let item: Item = serde_json::from_str(ITEM).unwrap();
        assert_eq!(item.field("password"), Some("hunter2"));
        assert_eq!(item.field("username"), Some("octo"));
        assert_eq!(item.field("uri"), Some("https://github.com"));
        assert_eq!(item.field("notes"), Some("2fa on"));
        assert_eq!(item.field("api_key"), Some("ghp_x"));
        assert_eq!(item.field("totp"), None);
    }

    #[tokio::test]
    async fn test_unlock_passes_password_and_session_via_env() {
        let runner = Arc::new(ScriptedRunner::new([
            CommandOutput::ok("session-key\n"),
            CommandOutput::ok(ITEM),
        ]));
        let backend = backend(runner.clone(), Some("master"));

        let token = backend.authenticate().await.unwrap();
        let raw = backend
            .get_secret(Some(&token.token), &StructuredReference::new("github").with_field(Some("username")))
            .await
            .unwrap();
        assert_eq!(raw.value.expose_secret(), "octo");

        let calls = runner.calls();
        assert_eq!(calls[0].args, vec!["unlock", "--raw", "--passwordenv", "BW_PASSWORD"]);
        assert_eq!(calls[0].env, vec![("BW_PASSWORD".to_string(), "master".to_string())]);
        assert_eq!(calls[1].args, vec!["get", "item", "github"]);
        assert_eq!(calls[1].env, vec![("BW_SESSION".to_string(), "session-key".to_string())]);
    }

    #[tokio::test]
    async fn test_missing_field_is_not_found() {
        let runner = Arc::new(ScriptedRunner::new([CommandOutput::ok(ITEM)]));
        let backend = backend(runner, Some("m"));
        let err = backend
            .get_secret(
                Some(&SecretString::new("s")),
                &StructuredReference::new("github").with_field(Some("totp")),
            )
            .await
            .unwrap_err();
        assert_eq!(err.hint, Some(ErrorKind::NotFound));
    }

    #[tokio::test]
    async fn test_describe_reports_type_and_size() {
        let runner = Arc::new(ScriptedRunner::new([CommandOutput::ok(ITEM)]));
        let backend = backend(runner, Some("m"));
        let meta = backend
            .describe_item(Some(&SecretString::new("s")), &StructuredReference::new("github").with_field(Some("password")))
            .await
            .unwrap();
        assert_eq!(meta.secret_type.as_deref(), Some("login"));
        assert_eq!(meta.size, Some(7));
        assert!(meta.updated_at.is_some());
    }
}
