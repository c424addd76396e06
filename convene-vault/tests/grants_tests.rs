use convene_crypto::{generate_data_key, generate_secret};
use convene_storage::MeetingStore;
use convene_vault::{MeetingKeyRegistry, SessionKeyCache, VaultError};

#[tokio::test]
async fn multi_recipient_grants_unwrap_to_same_key() {
    let cache = SessionKeyCache::in_memory();
    let registry = MeetingKeyRegistry::new(cache.clone());
    let store = MeetingStore::open_in_memory("m-1").unwrap();

    cache.put("owner", generate_secret()).await;
    cache.put("admin", generate_secret()).await;

    let data_key = generate_data_key();
    registry
        .grant(&store, "owner", "owner@example.com", &data_key)
        .await
        .unwrap();
    registry
        .grant(&store, "admin", "admin@example.com", &data_key)
        .await
        .unwrap();

    let via_owner = registry.unwrap_data_key(&store, "owner").await.unwrap();
    let via_admin = registry.unwrap_data_key(&store, "admin").await.unwrap();

    assert_eq!(via_owner.as_bytes(), data_key.as_bytes());
    assert_eq!(via_admin.as_bytes(), data_key.as_bytes());
}

#[tokio::test]
async fn grant_requires_cached_secret() {
    let cache = SessionKeyCache::in_memory();
    let registry = MeetingKeyRegistry::new(cache);
    let store = MeetingStore::open_in_memory("m-1").unwrap();

    let err = registry
        .grant(&store, "never-logged-in", "x@example.com", &generate_data_key())
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::SecretUnavailable(_)));
}

#[tokio::test]
async fn unwrap_without_grant_is_authorization_failure() {
    let cache = SessionKeyCache::in_memory();
    let registry = MeetingKeyRegistry::new(cache.clone());
    let store = MeetingStore::open_in_memory("m-1").unwrap();

    cache.put("member", generate_secret()).await;
    let err = registry.unwrap_data_key(&store, "member").await.unwrap_err();
    assert!(matches!(err, VaultError::NoGrantForPrincipal { .. }));
}

#[tokio::test]
async fn logout_invalidates_unwrap() {
    let cache = SessionKeyCache::in_memory();
    let registry = MeetingKeyRegistry::new(cache.clone());
    let store = MeetingStore::open_in_memory("m-1").unwrap();

    cache.put("owner", generate_secret()).await;
    let data_key = generate_data_key();
    registry
        .grant(&store, "owner", "owner@example.com", &data_key)
        .await
        .unwrap();

    // Grant persists, but the session secret is gone after logout.
    cache.remove("owner").await;
    let err = registry.unwrap_data_key(&store, "owner").await.unwrap_err();
    assert!(matches!(err, VaultError::SecretUnavailable(_)));
}

#[tokio::test]
async fn stale_secret_cannot_unwrap() {
    let cache = SessionKeyCache::in_memory();
    let registry = MeetingKeyRegistry::new(cache.clone());
    let store = MeetingStore::open_in_memory("m-1").unwrap();

    cache.put("owner", generate_secret()).await;
    let data_key = generate_data_key();
    registry
        .grant(&store, "owner", "owner@example.com", &data_key)
        .await
        .unwrap();

    // A different secret (e.g. reset account without re-granting) must not
    // recover the data key.
    cache.put("owner", generate_secret()).await;
    match registry.unwrap_data_key(&store, "owner").await {
        Err(_) => {}
        Ok(key) => assert_ne!(key.as_bytes(), data_key.as_bytes()),
    }
}

#[tokio::test]
async fn revoke_removes_access() {
    let cache = SessionKeyCache::in_memory();
    let registry = MeetingKeyRegistry::new(cache.clone());
    let store = MeetingStore::open_in_memory("m-1").unwrap();

    cache.put("admin", generate_secret()).await;
    registry
        .grant(&store, "admin", "admin@example.com", &generate_data_key())
        .await
        .unwrap();

    assert!(registry.revoke(&store, "admin").await.unwrap());
    assert!(!registry.revoke(&store, "admin").await.unwrap());

    let err = registry.unwrap_data_key(&store, "admin").await.unwrap_err();
    assert!(matches!(err, VaultError::NoGrantForPrincipal { .. }));
}

#[tokio::test]
async fn list_unlocked_principals_is_cache_presence_only() {
    let cache = SessionKeyCache::in_memory();
    let registry = MeetingKeyRegistry::new(cache.clone());

    cache.put("a", generate_secret()).await;
    cache.put("c", generate_secret()).await;

    let unlocked = registry
        .list_unlocked_principals(&["a".into(), "b".into(), "c".into()])
        .await;
    assert_eq!(unlocked, vec!["a".to_string(), "c".to_string()]);
}
