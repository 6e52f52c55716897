//! Token cache for reducing authentication round-trips
//!
//! Holds at most one bearer token per provider instance. Reads share a
//! reader/writer lock; refreshes are serialised by a separate mutex so that
//! concurrent callers racing against an expired token authenticate once.

use std::future::Future;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::debug;

use super::types::SecretString;

/// Tokens are treated as expired this long before the backend says so
pub const SAFETY_BUFFER: Duration = Duration::from_secs(5);

/// Cached token with its local expiry
#[derive(Debug, Clone)]
pub struct CachedToken {
    pub token: SecretString,
    pub expires_at: Instant,
}

impl CachedToken {
    /// Build a token expiring `ttl` from now, minus [`SAFETY_BUFFER`] when the
    /// TTL is long enough to absorb it.
    pub fn new(token: SecretString, ttl: Duration) -> Self {
        let lifetime = if ttl > SAFETY_BUFFER { ttl - SAFETY_BUFFER } else { ttl };
        Self { token, expires_at: Instant::now() + lifetime }
    }

    pub fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// Single-slot TTL cache for one provider's credential
#[derive(Debug, Default)]
pub struct TokenCache {
    slot: RwLock<Option<CachedToken>>,
    refresh: Mutex<()>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached token, if present and not expired. Never performs I/O.
    pub async fn get(&self) -> Option<SecretString> {
        let slot = self.slot.read().await;
        match slot.as_ref() {
            Some(cached) if cached.is_valid() => Some(cached.token.clone()),
            Some(_) => {
                debug!("Cached token expired");
                None
            }
            None => None,
        }
    }

    /// Store a token, replacing any previous one
    pub async fn set(&self, token: SecretString, ttl: Duration) {
        debug!(ttl_secs = %ttl.as_secs(), "Caching authentication token");
        *self.slot.write().await = Some(CachedToken::new(token, ttl));
    }

    /// Drop the cached token unconditionally
    pub async fn clear(&self) {
        debug!("Clearing cached authentication token");
        *self.slot.write().await = None;
    }

    /// Return the cached token or obtain a new one through `refresh`.
    ///
    /// Only one caller runs `refresh` at a time; callers that waited on the
    /// refresh lock re-check the slot and reuse the token it produced. A
    /// failed refresh leaves the cache empty and is returned to the caller.
    pub async fn get_or_refresh<F, Fut, E>(&self, refresh: F) -> Result<SecretString, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(SecretString, Duration), E>>,
    {
        if let Some(token) = self.get().await {
            return Ok(token);
        }

        let _guard = self.refresh.lock().await;

        if let Some(token) = self.get().await {
            debug!("Token refreshed by concurrent caller");
            return Ok(token);
        }

        let (token, ttl) = refresh().await?;
        self.set(token.clone(), ttl).await;
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_set_then_get() {
        let cache = TokenCache::new();
        assert!(cache.get().await.is_none());

        cache.set(SecretString::new("tok"), Duration::from_secs(60)).await;
        assert_eq!(cache.get().await, Some(SecretString::new("tok")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_subtracts_buffer() {
        let cache = TokenCache::new();
        cache.set(SecretString::new("tok"), Duration::from_secs(60)).await;

        tokio::time::advance(Duration::from_secs(54)).await;
        assert!(cache.get().await.is_some());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(cache.get().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_ttl_keeps_full_lifetime() {
        let cache = TokenCache::new();
        cache.set(SecretString::new("tok"), Duration::from_secs(3)).await;

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(cache.get().await.is_some());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(cache.get().await.is_none());
    }

    #[tokio::test]
    async fn test_clear() {
        let cache = TokenCache::new();
        cache.set(SecretString::new("tok"), Duration::from_secs(60)).await;
        cache.clear().await;
        assert!(cache.get().await.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_refresh_authenticates_once() {
        let cache = Arc::new(TokenCache::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let calls = Arc::clone(&calls);
                tokio::spawn(async move {
                    cache
                        .get_or_refresh(|| async {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(20)).await;
                            Ok::<_, std::io::Error>((SecretString::new("fresh"), Duration::from_secs(60)))
                        })
                        .await
                })
            })
            .collect();

        for handle in handles {
            let token = handle.await.unwrap().unwrap();
            assert_eq!(token.expose_secret(), "fresh");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_refresh_leaves_cache_empty() {
        let cache = TokenCache::new();
        let result = cache
            .get_or_refresh(|| async {
                Err::<(SecretString, Duration), _>(std::io::Error::other("denied"))
            })
            .await;
        assert!(result.is_err());
        assert!(cache.get().await.is_none());
    }
}
