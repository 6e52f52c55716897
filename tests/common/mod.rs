//! Common test utilities for all integration tests.
//!
//! Provides a scripted backend adapter that counts calls, and helpers that
//! wrap it in a provider.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use keyplane::errors::{classify, BackendError, BackendOperation, BackendResult, ErrorKind};
use keyplane::secrets::backends::{AuthToken, BackendAdapter, BackendKind, RawSecret};
use keyplane::secrets::reference::VaultReferenceParser;
use keyplane::secrets::{BackendProvider, Capabilities, SecretMetadata, SecretString, StructuredReference};

/// Backend adapter answering from an in-memory table
#[derive(Debug)]
pub struct MockAdapter {
    secrets: Mutex<HashMap<(String, Option<String>), String>>,
    pub auth_calls: AtomicUsize,
    pub get_calls: AtomicUsize,
    pub tokens_seen: Mutex<Vec<String>>,
    pub fail_auth: AtomicBool,
    /// Next `get_secret` fails with this status and message
    pub next_failure: Mutex<Option<(u16, String)>>,
    pub ttl: Duration,
    pub auth_delay: Duration,
}

impl Default for MockAdapter {
    fn default() -> Self {
        Self {
            secrets: Mutex::default(),
            auth_calls: AtomicUsize::new(0),
            get_calls: AtomicUsize::new(0),
            tokens_seen: Mutex::default(),
            fail_auth: AtomicBool::new(false),
            next_failure: Mutex::default(),
            ttl: Duration::from_secs(3600),
            auth_delay: Duration::ZERO,
        }
    }
}

impl MockAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_auth_delay(mut self, delay: Duration) -> Self {
        self.auth_delay = delay;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_secret(self, name: &str, version: Option<&str>, value: &str) -> Self {
        self.secrets
            .lock()
            .unwrap()
            .insert((name.to_string(), version.map(String::from)), value.to_string());
        self
    }

    pub fn fail_next_get(&self, status: u16, message: &str) {
        *self.next_failure.lock().unwrap() = Some((status, message.to_string()));
    }

    pub fn auth_count(&self) -> usize {
        self.auth_calls.load(Ordering::SeqCst)
    }

    fn lookup(&self, reference: &StructuredReference) -> Option<String> {
        let secrets = self.secrets.lock().unwrap();
        secrets.get(&(reference.name.clone(), reference.version.clone())).cloned()
    }
}

#[async_trait]
impl BackendAdapter for MockAdapter {
    fn kind(&self) -> BackendKind {
        BackendKind::Vault
    }

    async fn authenticate(&self) -> BackendResult<AuthToken> {
        let call = self.auth_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.auth_delay.is_zero() {
            tokio::time::sleep(self.auth_delay).await;
        }
        if self.fail_auth.load(Ordering::SeqCst) {
            return Err(BackendError::new(BackendOperation::Authenticate, "token", "permission denied")
                .with_status(403));
        }
        Ok(AuthToken::new(format!("token-{call}"), self.ttl))
    }

    async fn get_secret(
        &self,
        token: Option<&SecretString>,
        reference: &StructuredReference,
    ) -> BackendResult<RawSecret> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(token) = token {
            self.tokens_seen.lock().unwrap().push(token.expose_secret().to_string());
        }

        if let Some((status, message)) = self.next_failure.lock().unwrap().take() {
            return Err(BackendError::new(BackendOperation::GetSecret, &reference.name, message)
                .with_status(status));
        }

        match self.lookup(reference) {
            Some(value) => Ok(RawSecret::new(value)),
            None => Err(BackendError::missing(
                BackendOperation::GetSecret,
                &reference.name,
                "secret not found",
            )),
        }
    }

    async fn describe_item(
        &self,
        _token: Option<&SecretString>,
        reference: &StructuredReference,
    ) -> BackendResult<SecretMetadata> {
        match self.lookup(reference) {
            Some(value) => Ok(SecretMetadata::found().with_size(value.len() as u64)),
            None => Err(BackendError::new(BackendOperation::DescribeItem, &reference.name, "no secret")
                .with_status(404)),
        }
    }

    async fn list_items(
        &self,
        _token: Option<&SecretString>,
        _path: &str,
    ) -> BackendResult<Vec<String>> {
        if self.fail_auth.load(Ordering::SeqCst) {
            return Err(BackendError::new(BackendOperation::ListItems, "", "denied")
                .with_hint(ErrorKind::Auth));
        }
        let secrets = self.secrets.lock().unwrap();
        Ok(secrets.keys().map(|(name, _)| name.clone()).collect())
    }
}

pub fn token_capabilities() -> Capabilities {
    Capabilities { supports_versioning: true, requires_auth: true, ..Default::default() }
        .with_auth_methods(["token"])
}

/// Provider named `name` using the Vault reference grammar over `adapter`
pub fn mock_provider(name: &str, adapter: Arc<MockAdapter>) -> BackendProvider {
    BackendProvider::new(name, VaultReferenceParser, adapter, token_capabilities(), &classify::VAULT)
}
