//! Integration tests for token caching behind a provider

mod common;

use common::{mock_provider, MockAdapter};
use futures::future::join_all;
use keyplane::secrets::SecretProvider;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_resolves_authenticate_once() {
    let adapter = Arc::new(
        MockAdapter::new()
            .with_auth_delay(Duration::from_millis(50))
            .with_secret("app/db", None, "pw"),
    );
    let provider = Arc::new(mock_provider("vault", adapter.clone()));

    let tasks = (0..32).map(|_| {
        let provider = provider.clone();
        tokio::spawn(async move { provider.resolve("app/db").await })
    });
    let results = join_all(tasks).await;

    for result in results {
        let value = result.expect("task panicked").expect("resolve failed");
        assert_eq!(value.expose(), "pw");
    }
    assert_eq!(adapter.auth_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_token_reused_until_safety_buffer() {
    let adapter = Arc::new(
        MockAdapter::new().with_ttl(Duration::from_secs(60)).with_secret("k", None, "v"),
    );
    let provider = mock_provider("vault", adapter.clone());

    provider.resolve("k").await.unwrap();
    tokio::time::advance(Duration::from_secs(54)).await;
    provider.resolve("k").await.unwrap();
    assert_eq!(adapter.auth_count(), 1);

    // 60s TTL minus the 5s buffer
    tokio::time::advance(Duration::from_secs(2)).await;
    provider.resolve("k").await.unwrap();
    assert_eq!(adapter.auth_count(), 2);

    let tokens = adapter.tokens_seen.lock().unwrap().clone();
    assert_eq!(tokens, vec!["token-1", "token-1", "token-2"]);
}

#[tokio::test(start_paused = true)]
async fn test_short_ttl_expires_at_ttl() {
    let adapter = Arc::new(
        MockAdapter::new().with_ttl(Duration::from_secs(3)).with_secret("k", None, "v"),
    );
    let provider = mock_provider("vault", adapter.clone());

    provider.resolve("k").await.unwrap();
    tokio::time::advance(Duration::from_secs(2)).await;
    provider.resolve("k").await.unwrap();
    assert_eq!(adapter.auth_count(), 1);

    tokio::time::advance(Duration::from_secs(1)).await;
    provider.resolve("k").await.unwrap();
    assert_eq!(adapter.auth_count(), 2);
}

#[tokio::test]
async fn test_describe_and_resolve_share_the_token() {
    let adapter = Arc::new(MockAdapter::new().with_secret("k", None, "v"));
    let provider = mock_provider("vault", adapter.clone());

    provider.describe("k").await.unwrap();
    provider.resolve("k").await.unwrap();
    provider.validate().await.unwrap();
    assert_eq!(adapter.auth_count(), 1);
}
