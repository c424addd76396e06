//! Session key cache — unwrapped long-term secrets, keyed by principal.
//!
//! Entries appear at login and vanish at logout or process restart. There
//! is no TTL: callers own the `remove` on logout. The backing store is
//! pluggable so a deployment can swap the in-process map for a networked
//! cache with identical observable behavior.

use async_trait::async_trait;
use convene_crypto::LongTermSecret;
use convene_types::PrincipalId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Pluggable backing store for session secrets.
///
/// Implementations must be last-write-wins on concurrent `put` and must
/// return absent after `remove` (or a backend restart). Each operation is
/// individually atomic; none participate in a larger transaction.
#[async_trait]
pub trait SecretCacheBackend: Send + Sync {
    async fn put(&self, principal_id: &str, secret: LongTermSecret);
    async fn get(&self, principal_id: &str) -> Option<LongTermSecret>;
    async fn remove(&self, principal_id: &str);
}

/// In-process backend: a map behind a `tokio` RwLock.
#[derive(Default)]
pub struct MemorySecretCache {
    secrets: RwLock<HashMap<PrincipalId, LongTermSecret>>,
}

impl MemorySecretCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SecretCacheBackend for MemorySecretCache {
    async fn put(&self, principal_id: &str, secret: LongTermSecret) {
        self.secrets
            .write()
            .await
            .insert(principal_id.to_string(), secret);
    }

    async fn get(&self, principal_id: &str) -> Option<LongTermSecret> {
        self.secrets.read().await.get(principal_id).cloned()
    }

    async fn remove(&self, principal_id: &str) {
        self.secrets.write().await.remove(principal_id);
    }
}

/// The session key cache handed to request contexts. Cheap to clone.
#[derive(Clone)]
pub struct SessionKeyCache {
    backend: Arc<dyn SecretCacheBackend>,
}

impl SessionKeyCache {
    /// Cache backed by the in-process map.
    pub fn in_memory() -> Self {
        Self::with_backend(Arc::new(MemorySecretCache::new()))
    }

    /// Cache backed by a custom (e.g. networked) backend.
    pub fn with_backend(backend: Arc<dyn SecretCacheBackend>) -> Self {
        Self { backend }
    }

    /// Stores a principal's secret for the session. Called after a
    /// successful login.
    pub async fn put(&self, principal_id: &str, secret: LongTermSecret) {
        self.backend.put(principal_id, secret).await;
    }

    /// Returns the cached secret, or `None` if the principal has not
    /// logged in this cache epoch.
    pub async fn get(&self, principal_id: &str) -> Option<LongTermSecret> {
        self.backend.get(principal_id).await
    }

    /// Drops the principal's secret. Called at logout.
    pub async fn remove(&self, principal_id: &str) {
        self.backend.remove(principal_id).await;
    }

    /// Availability check without cloning the secret out.
    pub async fn contains(&self, principal_id: &str) -> bool {
        self.backend.get(principal_id).await.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use convene_crypto::generate_secret;

    #[tokio::test]
    async fn put_get_remove_lifecycle() {
        let cache = SessionKeyCache::in_memory();
        assert!(cache.get("p-1").await.is_none());

        let secret = generate_secret();
        cache.put("p-1", secret.clone()).await;
        assert_eq!(
            cache.get("p-1").await.unwrap().as_bytes(),
            secret.as_bytes()
        );
        assert!(cache.contains("p-1").await);

        cache.remove("p-1").await;
        assert!(cache.get("p-1").await.is_none());
        assert!(!cache.contains("p-1").await);
    }

    #[tokio::test]
    async fn concurrent_put_is_last_write_wins() {
        let cache = SessionKeyCache::in_memory();
        let first = generate_secret();
        let second = generate_secret();

        cache.put("p-1", first).await;
        cache.put("p-1", second.clone()).await;

        assert_eq!(
            cache.get("p-1").await.unwrap().as_bytes(),
            second.as_bytes()
        );
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let cache = SessionKeyCache::in_memory();
        cache.remove("never-present").await;
        assert!(cache.get("never-present").await.is_none());
    }
}
