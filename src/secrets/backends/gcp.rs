//! Google Cloud backends over the REST APIs
//!
//! Two adapters share one credential source:
//!
//! - [`GcpSecretManagerBackend`]: Secret Manager `versions/*:access`
//! - [`GcpIamBackend`]: IAM Credentials `generateAccessToken` /
//!   `generateIdToken` for service account impersonation
//!
//! ## Configuration
//!
//! - `project` (or `GOOGLE_CLOUD_PROJECT` / `GCP_PROJECT_ID`): required for
//!   Secret Manager short names
//! - `auth`: `access_token`, `gcloud` or `service_account`. Defaults to
//!   `access_token` when `access_token` is set, `service_account` when a
//!   credentials file is known, `gcloud` otherwise
//! - `credentials_file` (or `GOOGLE_APPLICATION_CREDENTIALS`): service
//!   account key, requires the `gcp` feature
//! - `secret_manager_url`, `iam_credentials_url`, `iam_url`, `oauth2_url`:
//!   API base URLs
//! - `scopes`, `token_lifetime_secs`, `audience`: IAM token parameters

use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::backend::{AuthToken, BackendAdapter, BackendKind, RawSecret};
use super::command::{run_checked, CommandRunner};
use super::json_field;
use crate::config::ProviderSettings;
use crate::errors::{BackendError, BackendOperation, BackendResult, ErrorKind, Result, SecretsError};
use crate::secrets::reference::gcp::{ACCESS_TOKEN, ID_TOKEN};
use crate::secrets::reference::StructuredReference;
use crate::secrets::types::{Capabilities, SecretMetadata, SecretString};

pub const DEFAULT_SECRET_MANAGER_URL: &str = "https://secretmanager.googleapis.com";
pub const DEFAULT_IAM_CREDENTIALS_URL: &str = "https://iamcredentials.googleapis.com";
pub const DEFAULT_IAM_URL: &str = "https://iam.googleapis.com";
pub const DEFAULT_OAUTH2_URL: &str = "https://oauth2.googleapis.com";
pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(3600);
const GCLOUD_TOKEN_TTL: Duration = Duration::from_secs(3300);
const DEFAULT_IMPERSONATION_LIFETIME: Duration = Duration::from_secs(3600);

/// Where the caller's own Google access token comes from
#[derive(Debug, Clone)]
pub enum GcpAuthConfig {
    /// Pre-issued access token, trusted for `ttl`
    AccessToken { token: SecretString, ttl: Duration },
    /// `gcloud auth print-access-token`
    Gcloud { ttl: Duration },
    /// Service account key file
    ServiceAccount { credentials_file: String },
}

impl GcpAuthConfig {
    pub fn method(&self) -> &'static str {
        match self {
            GcpAuthConfig::AccessToken { .. } => "access_token",
            GcpAuthConfig::Gcloud { .. } => "gcloud",
            GcpAuthConfig::ServiceAccount { .. } => "service_account",
        }
    }
}

/// Configuration shared by the GCP adapters
#[derive(Debug, Clone)]
pub struct GcpBackendConfig {
    pub project: Option<String>,
    pub auth: GcpAuthConfig,
    pub secret_manager_url: String,
    pub iam_credentials_url: String,
    pub iam_url: String,
    /// Serves `tokeninfo`, used to validate the caller's token
    pub oauth2_url: String,
    /// Scopes of impersonated access tokens
    pub scopes: Vec<String>,
    /// Requested lifetime of impersonated access tokens
    pub token_lifetime: Duration,
    /// Audience of impersonated ID tokens
    pub audience: Option<String>,
}

impl GcpBackendConfig {
    pub fn from_settings(settings: &ProviderSettings) -> Result<Self> {
        let token_ttl = settings.duration_secs("token_ttl_secs", DEFAULT_TOKEN_TTL)?;
        let access_token = settings.get_str("access_token");
        let credentials_file =
            settings.str_or_env("credentials_file", &["GOOGLE_APPLICATION_CREDENTIALS"]);

        let method = settings.get_str("auth").unwrap_or_else(|| {
            if access_token.is_some() {
                "access_token".to_string()
            } else if credentials_file.is_some() {
                "service_account".to_string()
            } else {
                "gcloud".to_string()
            }
        });

        let auth = match method.as_str() {
            "access_token" | "static" => GcpAuthConfig::AccessToken {
                token: SecretString::new(settings.require_str(
                    "access_token",
                    "Set 'access_token' or choose auth 'gcloud' / 'service_account'",
                )?),
                ttl: token_ttl,
            },
            "gcloud" => GcpAuthConfig::Gcloud {
                ttl: settings.duration_secs("token_ttl_secs", GCLOUD_TOKEN_TTL)?,
            },
            "service_account" => GcpAuthConfig::ServiceAccount {
                credentials_file: settings.require_str_or_env(
                    "credentials_file",
                    &["GOOGLE_APPLICATION_CREDENTIALS"],
                    "Set 'credentials_file' or export GOOGLE_APPLICATION_CREDENTIALS",
                )?,
            },
            other => {
                return Err(SecretsError::config(
                    settings.field_path("auth"),
                    format!("Unsupported GCP auth method '{other}'"),
                    "Use 'access_token', 'gcloud' or 'service_account'",
                ))
            }
        };

        let mut scopes = settings.string_list("scopes")?;
        if scopes.is_empty() {
            scopes.push(CLOUD_PLATFORM_SCOPE.to_string());
        }

        Ok(Self {
            project: settings.str_or_env("project", &["GOOGLE_CLOUD_PROJECT", "GCP_PROJECT_ID"]),
            auth,
            secret_manager_url: base_url(settings, "secret_manager_url", DEFAULT_SECRET_MANAGER_URL),
            iam_credentials_url: base_url(settings, "iam_credentials_url", DEFAULT_IAM_CREDENTIALS_URL),
            iam_url: base_url(settings, "iam_url", DEFAULT_IAM_URL),
            oauth2_url: base_url(settings, "oauth2_url", DEFAULT_OAUTH2_URL),
            scopes,
            token_lifetime: settings
                .duration_secs("token_lifetime_secs", DEFAULT_IMPERSONATION_LIFETIME)?,
            audience: settings.get_str("audience"),
        })
    }
}

fn base_url(settings: &ProviderSettings, key: &str, default: &str) -> String {
    settings.get_str(key).unwrap_or_else(|| default.to_string()).trim_end_matches('/').to_string()
}

#[cfg(feature = "gcp")]
type ServiceAccountAuthenticator = yup_oauth2::authenticator::DefaultAuthenticator;

/// Credential source for the caller's own Google access token
pub enum GcpTokenSource {
    AccessToken { token: SecretString, ttl: Duration },
    Gcloud { runner: Arc<dyn CommandRunner>, ttl: Duration },
    #[cfg(feature = "gcp")]
    ServiceAccount(Box<ServiceAccountAuthenticator>),
}

impl fmt::Debug for GcpTokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GcpTokenSource::AccessToken { ttl, .. } => {
                f.debug_struct("AccessToken").field("ttl", ttl).finish_non_exhaustive()
            }
            GcpTokenSource::Gcloud { ttl, .. } => f.debug_struct("Gcloud").field("ttl", ttl).finish(),
            #[cfg(feature = "gcp")]
            GcpTokenSource::ServiceAccount(_) => write!(f, "ServiceAccount"),
        }
    }
}

impl GcpTokenSource {
    /// Build the source. Service account keys are read here, before any
    /// network traffic.
    pub async fn from_config(
        auth: &GcpAuthConfig,
        runner: Arc<dyn CommandRunner>,
        field: &str,
    ) -> Result<Self> {
        match auth {
            GcpAuthConfig::AccessToken { token, ttl } => {
                Ok(GcpTokenSource::AccessToken { token: token.clone(), ttl: *ttl })
            }
            GcpAuthConfig::Gcloud { ttl } => Ok(GcpTokenSource::Gcloud { runner, ttl: *ttl }),
            #[cfg(feature = "gcp")]
            GcpAuthConfig::ServiceAccount { credentials_file } => {
                let key = yup_oauth2::read_service_account_key(credentials_file).await.map_err(|e| {
                    SecretsError::config(
                        field,
                        format!("Failed to read service account key '{credentials_file}': {e}"),
                        "Point 'credentials_file' at a JSON key downloaded from the IAM console",
                    )
                })?;
                let authenticator = yup_oauth2::ServiceAccountAuthenticator::builder(key)
                    .build()
                    .await
                    .map_err(|e| {
                        SecretsError::config(
                            field,
                            format!("Failed to build GCP authenticator: {e}"),
                            "Check the service account key file",
                        )
                    })?;
                Ok(GcpTokenSource::ServiceAccount(Box::new(authenticator)))
            }
            #[cfg(not(feature = "gcp"))]
            GcpAuthConfig::ServiceAccount { .. } => Err(SecretsError::config(
                field,
                "Service account key authentication is not compiled in",
                "Rebuild with --features gcp, or use auth 'gcloud' / 'access_token'",
            )),
        }
    }

    pub async fn token(&self) -> BackendResult<AuthToken> {
        let op = BackendOperation::Authenticate;
        match self {
            GcpTokenSource::AccessToken { token, ttl } => Ok(AuthToken::new(token.clone(), *ttl)),
            GcpTokenSource::Gcloud { runner, ttl } => {
                let args = ["auth", "print-access-token"].map(String::from);
                let out = run_checked(runner.as_ref(), op, "gcloud", "gcloud", &args, &[]).await?;
                let token = out.trim();
                if token.is_empty() {
                    return Err(BackendError::new(op, "gcloud", "gcloud returned an empty token")
                        .with_hint(ErrorKind::Auth));
                }
                Ok(AuthToken::new(token, *ttl))
            }
            #[cfg(feature = "gcp")]
            GcpTokenSource::ServiceAccount(authenticator) => {
                let token = authenticator.token(&[CLOUD_PLATFORM_SCOPE]).await.map_err(|e| {
                    BackendError::new(op, "service_account", e.to_string()).with_hint(ErrorKind::Auth)
                })?;
                let value = token.token().ok_or_else(|| {
                    BackendError::new(op, "service_account", "authenticator returned no token")
                        .with_hint(ErrorKind::Auth)
                })?;
                let ttl = token
                    .expiration_time()
                    .map(|at| (at - time::OffsetDateTime::now_utc()).whole_seconds().max(0) as u64)
                    .map(Duration::from_secs)
                    .unwrap_or(DEFAULT_TOKEN_TTL);
                Ok(AuthToken::new(value, ttl))
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct GoogleErrorBody {
    error: GoogleError,
}

#[derive(Debug, Deserialize)]
struct GoogleError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

fn bearer(operation: BackendOperation, token: Option<&SecretString>) -> BackendResult<&str> {
    token.map(SecretString::expose_secret).ok_or_else(|| {
        BackendError::new(operation, "token", "no access token available").with_hint(ErrorKind::Auth)
    })
}

/// Send a request and decode the JSON body, mapping Google error bodies
/// (`{"error": {"code", "message", "status"}}`) to [`BackendError`].
async fn send_json<T: DeserializeOwned>(
    request: reqwest::RequestBuilder,
    operation: BackendOperation,
    resource: &str,
) -> BackendResult<T> {
    let response = request.send().await.map_err(|e| {
        BackendError::new(operation, resource, format!("request failed: {e}")).with_source(e)
    })?;

    let status = response.status();
    if status.is_success() {
        return response.json::<T>().await.map_err(|e| {
            BackendError::new(operation, resource, format!("invalid response body: {e}"))
                .with_source(e)
        });
    }

    let body = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<GoogleErrorBody>(&body) {
        Ok(parsed) if !parsed.error.status.is_empty() => {
            format!("{}: {}", parsed.error.status, parsed.error.message)
        }
        Ok(parsed) => parsed.error.message,
        Err(_) if body.trim().is_empty() => format!("HTTP {status}"),
        Err(_) => body.trim().to_string(),
    };
    Err(BackendError::new(operation, resource, message).with_status(status.as_u16()))
}

fn parse_time(value: Option<&str>) -> Option<DateTime<Utc>> {
    value.and_then(|v| DateTime::parse_from_rfc3339(v).ok()).map(|t| t.with_timezone(&Utc))
}

fn last_segment(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

fn capabilities_for(auth_methods: [&str; 3], versioning: bool) -> Capabilities {
    Capabilities {
        supports_versioning: versioning,
        supports_metadata: true,
        requires_auth: true,
        ..Default::default()
    }
    .with_auth_methods(auth_methods)
}

const AUTH_METHODS: [&str; 3] = ["access_token", "gcloud", "service_account"];

#[derive(Debug, Deserialize)]
struct AccessResponse {
    name: String,
    payload: Payload,
}

#[derive(Debug, Deserialize)]
struct Payload {
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VersionResponse {
    name: String,
    create_time: Option<String>,
    state: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SecretResponse {
    #[serde(default)]
    labels: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct TokenInfoResponse {
    email: Option<String>,
    expires_in: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
struct ListSecretsResponse {
    #[serde(default)]
    secrets: Vec<SecretEntry>,
}

#[derive(Debug, Deserialize)]
struct SecretEntry {
    name: String,
}

/// GCP Secret Manager adapter
pub struct GcpSecretManagerBackend {
    http: reqwest::Client,
    base_url: String,
    project: String,
    tokens: Arc<GcpTokenSource>,
}

impl fmt::Debug for GcpSecretManagerBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GcpSecretManagerBackend")
            .field("base_url", &self.base_url)
            .field("project", &self.project)
            .field("tokens", &self.tokens)
            .finish()
    }
}

impl GcpSecretManagerBackend {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        project: impl Into<String>,
        tokens: Arc<GcpTokenSource>,
    ) -> Self {
        let backend = Self { http, base_url: base_url.into(), project: project.into(), tokens };
        info!(project = %backend.project, base_url = %backend.base_url, "Initialized GCP Secret Manager backend");
        backend
    }

    pub fn capabilities() -> Capabilities {
        capabilities_for(AUTH_METHODS, true)
    }

    /// `projects/P/secrets/S`, using the configured project for short names
    fn secret_name(&self, reference: &StructuredReference) -> String {
        if reference.name.starts_with("projects/") {
            reference.name.clone()
        } else {
            format!("projects/{}/secrets/{}", self.project, reference.name)
        }
    }

    fn version_name(&self, reference: &StructuredReference) -> String {
        format!(
            "{}/versions/{}",
            self.secret_name(reference),
            reference.version.as_deref().unwrap_or("latest")
        )
    }
}

#[async_trait]
impl BackendAdapter for GcpSecretManagerBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::GcpSecretManager
    }

    async fn authenticate(&self) -> BackendResult<AuthToken> {
        self.tokens.token().await
    }

    async fn get_secret(
        &self,
        token: Option<&SecretString>,
        reference: &StructuredReference,
    ) -> BackendResult<RawSecret> {
        let op = BackendOperation::GetSecret;
        let name = self.version_name(reference);
        let url = format!("{}/v1/{}:access", self.base_url, name);

        let response: AccessResponse =
            send_json(self.http.get(&url).bearer_auth(bearer(op, token)?), op, &name).await?;

        let bytes = base64::engine::general_purpose::STANDARD
            .decode(response.payload.data.as_bytes())
            .map_err(|e| BackendError::new(op, &name, format!("payload is not base64: {e}")))?;
        let payload = String::from_utf8(bytes)
            .map_err(|_| BackendError::new(op, &name, "payload is binary, not UTF-8 text"))?;

        let value = match reference.field.as_deref() {
            Some(path) => json_field::extract(&payload, path)
                .map_err(|e| e.into_backend_error(op, &reference.display_path()))?,
            None => payload,
        };

        debug!(secret = %name, "Accessed GCP secret version");
        Ok(RawSecret::new(value)
            .with_version(Some(last_segment(&response.name).to_string()))
            .with_metadata("resource", response.name))
    }

    async fn describe_item(
        &self,
        token: Option<&SecretString>,
        reference: &StructuredReference,
    ) -> BackendResult<SecretMetadata> {
        let op = BackendOperation::DescribeItem;
        let token = bearer(op, token)?;
        let secret = self.secret_name(reference);
        let version_name = self.version_name(reference);

        let version: VersionResponse = send_json(
            self.http.get(format!("{}/v1/{}", self.base_url, version_name)).bearer_auth(token),
            op,
            &version_name,
        )
        .await?;

        if version.state.as_deref() == Some("DESTROYED") {
            return Err(BackendError::missing(op, &version_name, "version is destroyed"));
        }

        let details: SecretResponse = send_json(
            self.http.get(format!("{}/v1/{}", self.base_url, secret)).bearer_auth(token),
            op,
            &secret,
        )
        .await?;

        let mut metadata = SecretMetadata::found()
            .with_version(last_segment(&version.name))
            .with_type("secret");
        metadata.updated_at = parse_time(version.create_time.as_deref());
        metadata.tags = details.labels;
        if let Some(state) = version.state {
            metadata.tags.entry("state".to_string()).or_insert(state);
        }
        Ok(metadata)
    }

    async fn list_items(
        &self,
        token: Option<&SecretString>,
        _path: &str,
    ) -> BackendResult<Vec<String>> {
        let op = BackendOperation::ListItems;
        let parent = format!("projects/{}", self.project);
        let url = format!("{}/v1/{}/secrets", self.base_url, parent);

        let response: ListSecretsResponse = send_json(
            self.http.get(&url).query(&[("pageSize", "1")]).bearer_auth(bearer(op, token)?),
            op,
            &parent,
        )
        .await?;

        Ok(response.secrets.into_iter().map(|s| last_segment(&s.name).to_string()).collect())
    }
}

#[derive(Debug, Serialize)]
struct GenerateAccessTokenRequest<'a> {
    scope: &'a [String],
    lifetime: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateAccessTokenResponse {
    access_token: String,
    expire_time: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateIdTokenRequest<'a> {
    audience: &'a str,
    include_email: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateIdTokenResponse {
    token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceAccountResponse {
    email: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    disabled: bool,
    #[serde(default)]
    unique_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ListServiceAccountsResponse {
    #[serde(default)]
    accounts: Vec<ServiceAccountResponse>,
}

/// GCP IAM Credentials adapter: short-lived tokens for service accounts
pub struct GcpIamBackend {
    http: reqwest::Client,
    credentials_url: String,
    iam_url: String,
    oauth2_url: String,
    project: Option<String>,
    scopes: Vec<String>,
    lifetime: Duration,
    audience: Option<String>,
    tokens: Arc<GcpTokenSource>,
}

impl fmt::Debug for GcpIamBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GcpIamBackend")
            .field("credentials_url", &self.credentials_url)
            .field("iam_url", &self.iam_url)
            .field("scopes", &self.scopes)
            .field("tokens", &self.tokens)
            .finish()
    }
}

impl GcpIamBackend {
    pub fn new(http: reqwest::Client, config: &GcpBackendConfig, tokens: Arc<GcpTokenSource>) -> Self {
        info!(base_url = %config.iam_credentials_url, "Initialized GCP IAM credentials backend");
        Self {
            http,
            credentials_url: config.iam_credentials_url.clone(),
            iam_url: config.iam_url.clone(),
            oauth2_url: config.oauth2_url.clone(),
            project: config.project.clone(),
            scopes: config.scopes.clone(),
            lifetime: config.token_lifetime,
            audience: config.audience.clone(),
            tokens,
        }
    }

    pub fn capabilities() -> Capabilities {
        capabilities_for(AUTH_METHODS, false)
    }

    fn account_name(email: &str) -> String {
        format!("projects/-/serviceAccounts/{email}")
    }

    /// Ask Google who the caller's token belongs to. Lists that identity,
    /// or nothing for tokens without an email.
    async fn token_identity(&self, token: &str) -> BackendResult<Vec<String>> {
        let op = BackendOperation::ListItems;
        let url = format!("{}/tokeninfo", self.oauth2_url);
        let request = self.http.get(&url).query(&[("access_token", token)]);

        // tokeninfo answers a rejected token with 400 invalid_token
        let info: TokenInfoResponse = send_json(request, op, "tokeninfo").await.map_err(|e| {
            if e.status == Some(400) {
                e.with_hint(ErrorKind::Auth)
            } else {
                e
            }
        })?;

        debug!(expires_in = ?info.expires_in, "Validated caller token");
        Ok(info.email.into_iter().collect())
    }
}

#[async_trait]
impl BackendAdapter for GcpIamBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::GcpIam
    }

    async fn authenticate(&self) -> BackendResult<AuthToken> {
        self.tokens.token().await
    }

    async fn get_secret(
        &self,
        token: Option<&SecretString>,
        reference: &StructuredReference,
    ) -> BackendResult<RawSecret> {
        let op = BackendOperation::GetSecret;
        let token = bearer(op, token)?;
        let account = Self::account_name(&reference.name);

        match reference.field.as_deref().unwrap_or(ACCESS_TOKEN) {
            ID_TOKEN => {
                let audience = self.audience.as_deref().ok_or_else(|| {
                    BackendError::new(op, &account, "id_token requires an 'audience' setting")
                        .with_hint(ErrorKind::Operational)
                        .with_suggestion(
                            "Set 'audience' on the provider to the service that will verify the ID token",
                        )
                })?;
                let url = format!("{}/v1/{}:generateIdToken", self.credentials_url, account);
                let body = GenerateIdTokenRequest { audience, include_email: true };
                let response: GenerateIdTokenResponse =
                    send_json(self.http.post(&url).bearer_auth(token).json(&body), op, &account)
                        .await?;

                Ok(RawSecret::new(response.token)
                    .with_metadata("token_type", ID_TOKEN)
                    .with_metadata("audience", audience))
            }
            _ => {
                let url = format!("{}/v1/{}:generateAccessToken", self.credentials_url, account);
                let body = GenerateAccessTokenRequest {
                    scope: &self.scopes,
                    lifetime: format!("{}s", self.lifetime.as_secs()),
                };
                let response: GenerateAccessTokenResponse =
                    send_json(self.http.post(&url).bearer_auth(token).json(&body), op, &account)
                        .await?;

                let mut raw = RawSecret::new(response.access_token).with_metadata("token_type", ACCESS_TOKEN);
                if let Some(expire_time) = response.expire_time {
                    raw = raw.with_metadata("expire_time", expire_time);
                }
                Ok(raw)
            }
        }
    }

    async fn describe_item(
        &self,
        token: Option<&SecretString>,
        reference: &StructuredReference,
    ) -> BackendResult<SecretMetadata> {
        let op = BackendOperation::DescribeItem;
        let account = Self::account_name(&reference.name);
        let url = format!("{}/v1/{}", self.iam_url, account);

        let response: ServiceAccountResponse =
            send_json(self.http.get(&url).bearer_auth(bearer(op, token)?), op, &account).await?;

        let mut metadata = SecretMetadata::found()
            .with_type("service_account")
            .with_tag("email", response.email)
            .with_tag("disabled", response.disabled.to_string());
        if let Some(display_name) = response.display_name {
            metadata = metadata.with_tag("display_name", display_name);
        }
        if let Some(unique_id) = response.unique_id {
            metadata = metadata.with_tag("unique_id", unique_id);
        }
        Ok(metadata)
    }

    async fn list_items(
        &self,
        token: Option<&SecretString>,
        _path: &str,
    ) -> BackendResult<Vec<String>> {
        let op = BackendOperation::ListItems;
        let token = bearer(op, token)?;

        let Some(project) = &self.project else {
            return self.token_identity(token).await;
        };

        let parent = format!("projects/{project}");
        let url = format!("{}/v1/{}/serviceAccounts", self.iam_url, parent);
        let response: ListServiceAccountsResponse =
            send_json(self.http.get(&url).query(&[("pageSize", "1")]).bearer_auth(token), op, &parent)
                .await?;

        Ok(response.accounts.into_iter().map(|a| a.email).collect())
    }
}
