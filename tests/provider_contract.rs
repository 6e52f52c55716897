//! Integration tests for the provider contract
//!
//! Exercise `BackendProvider` end to end over a scripted adapter: parsing,
//! token handling, error classification and the describe/resolve asymmetry.

mod common;

use common::{mock_provider, MockAdapter};
use keyplane::errors::ErrorKind;
use keyplane::secrets::SecretProvider;
use keyplane::SecretsError;
use std::sync::atomic::Ordering;
use std::sync::Arc;

#[tokio::test]
async fn test_versioned_reference_end_to_end() {
    let adapter = Arc::new(
        MockAdapter::new()
            .with_secret("item", Some("3"), "secret-v3")
            .with_secret("item", None, "secret-latest"),
    );
    let provider = mock_provider("vault", adapter.clone());

    let value = provider.resolve("item@v3").await.unwrap();
    assert_eq!(value.expose(), "secret-v3");
    assert_eq!(value.version(), Some("3"));

    let latest = provider.resolve("item").await.unwrap();
    assert_eq!(latest.expose(), "secret-latest");
    assert_eq!(latest.version(), None);
}

#[tokio::test]
async fn test_resolve_records_provenance_metadata() {
    let adapter = Arc::new(MockAdapter::new().with_secret("app/db", None, "pw"));
    let provider = mock_provider("primary", adapter);

    let value = provider.resolve("app/db#password").await.unwrap();
    let metadata = value.metadata();
    assert_eq!(metadata.get("provider").map(String::as_str), Some("primary"));
    assert_eq!(metadata.get("backend").map(String::as_str), Some("vault"));
    assert_eq!(metadata.get("path").map(String::as_str), Some("app/db#password"));
}

#[tokio::test]
async fn test_describe_missing_is_not_an_error_but_resolve_is() {
    let adapter = Arc::new(MockAdapter::new());
    let provider = mock_provider("vault", adapter);

    let metadata = provider.describe("does/not/exist").await.unwrap();
    assert!(!metadata.exists);

    let err = provider.resolve("does/not/exist").await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.to_string(), "Secret 'does/not/exist' not found in provider 'vault'");
}

#[tokio::test]
async fn test_describe_existing_secret() {
    let adapter = Arc::new(MockAdapter::new().with_secret("app/api", None, "abcdef"));
    let provider = mock_provider("vault", adapter);

    let metadata = provider.describe("app/api").await.unwrap();
    assert!(metadata.exists);
    assert_eq!(metadata.size, Some(6));
}

#[tokio::test]
async fn test_malformed_reference_is_operational_with_grammar() {
    let adapter = Arc::new(MockAdapter::new());
    let provider = mock_provider("vault", adapter.clone());

    let err = provider.resolve("").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Operational);
    assert!(err.suggestion().unwrap_or_default().contains("path[#field][@vN]"));
    // Parsing fails before any I/O
    assert_eq!(adapter.auth_count(), 0);
    assert_eq!(adapter.get_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_auth_failure_classified_and_not_cached() {
    let adapter = Arc::new(MockAdapter::new().with_secret("k", None, "v"));
    adapter.fail_auth.store(true, Ordering::SeqCst);
    let provider = mock_provider("vault", adapter.clone());

    let err = provider.resolve("k").await.unwrap_err();
    assert!(matches!(err, SecretsError::Auth { ref provider, .. } if provider == "vault"));

    // The next call authenticates again instead of reusing a failure
    adapter.fail_auth.store(false, Ordering::SeqCst);
    let value = provider.resolve("k").await.unwrap();
    assert_eq!(value.expose(), "v");
    assert_eq!(adapter.auth_count(), 2);
}

#[tokio::test]
async fn test_auth_rejection_during_fetch_drops_cached_token() {
    let adapter = Arc::new(MockAdapter::new().with_secret("k", None, "v"));
    let provider = mock_provider("vault", adapter.clone());

    provider.resolve("k").await.unwrap();
    assert_eq!(adapter.auth_count(), 1);

    adapter.fail_next_get(403, "permission denied");
    let err = provider.resolve("k").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Auth);

    provider.resolve("k").await.unwrap();
    assert_eq!(adapter.auth_count(), 2);
    let tokens = adapter.tokens_seen.lock().unwrap().clone();
    assert_eq!(tokens, vec!["token-1", "token-1", "token-2"]);
}

#[tokio::test]
async fn test_unclassifiable_failure_is_operational() {
    let adapter = Arc::new(MockAdapter::new().with_secret("k", None, "v"));
    let provider = mock_provider("vault", adapter.clone());

    adapter.fail_next_get(500, "internal error");
    let err = provider.resolve("k").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Operational);
    assert!(err.to_string().contains("internal error"));
    assert!(err.suggestion().is_some());
}

#[tokio::test]
async fn test_validate_reports_auth_failure() {
    let adapter = Arc::new(MockAdapter::new());
    let provider = mock_provider("vault", adapter.clone());
    assert!(provider.validate().await.is_ok());

    provider.token_cache().clear().await;
    adapter.fail_auth.store(true, Ordering::SeqCst);
    let err = provider.validate().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Auth);
}

#[tokio::test]
async fn test_capabilities_are_static() {
    let adapter = Arc::new(MockAdapter::new());
    let provider = mock_provider("vault", adapter.clone());

    let caps = provider.capabilities();
    assert!(caps.requires_auth);
    assert!(caps.supports_versioning);
    assert!(caps.auth_methods.contains("token"));
    assert_eq!(adapter.auth_count(), 0);
}
