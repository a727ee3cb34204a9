//! Integration tests for first-boot admin token seeding.

use api_tokens::{
    ApiTokenConfig, ApiTokenService, ApiTokenStore, BootstrapConfig, BootstrapOutcome,
    NewApiToken, Permission, StoreError, TokenError, mocks::MockApiTokenStore,
};

fn bootstrap_config(descriptors: &str) -> ApiTokenConfig {
    ApiTokenConfig::default().with_bootstrap(BootstrapConfig::from_list(descriptors))
}

#[tokio::test]
async fn test_start_seeds_empty_store() {
    let store = MockApiTokenStore::new();
    let service = ApiTokenService::start(
        store.clone(),
        bootstrap_config("*:*:964a287e1b728cb5f4f3e0120df92cb5,*:*:second"),
    )
    .await;

    assert_eq!(store.insert_count(), 2);

    let principal = service
        .get_user_for_token("*:*.964a287e1b728cb5f4f3e0120df92cb5")
        .expect("seeded token should authenticate");
    assert_eq!(principal.username, "admin");
    assert!(principal.has_permission(Permission::Admin));
    assert!(service.get_user_for_token("*:*.second").is_some());
}

#[tokio::test]
async fn test_seeding_twice_inserts_once() {
    let store = MockApiTokenStore::new();
    let service = ApiTokenService::new(store.clone(), ApiTokenConfig::default());
    let descriptors = ["*:*:abc"];

    let first = service.seed_bootstrap_tokens(&descriptors).await.unwrap();
    let second = service.seed_bootstrap_tokens(&descriptors).await.unwrap();

    assert_eq!(first, BootstrapOutcome::Seeded { created: 1 });
    assert_eq!(second, BootstrapOutcome::AlreadyInitialized { existing: 1 });
    assert_eq!(store.insert_count(), 1);
}

#[tokio::test]
async fn test_existing_tokens_block_seeding() {
    let store = MockApiTokenStore::new();
    store
        .insert(NewApiToken::client("default", "development", "sdk").with_secret("default:development.x"))
        .await
        .unwrap();

    let service = ApiTokenService::start(store.clone(), bootstrap_config("*:*:abc")).await;

    assert_eq!(store.insert_count(), 1);
    assert!(service.get_user_for_token("*:*.abc").is_none());
}

#[tokio::test]
async fn test_disabled_bootstrap_does_nothing() {
    let store = MockApiTokenStore::new();
    let config = ApiTokenConfig::default()
        .with_bootstrap(BootstrapConfig::from_list("*:*:abc").with_enabled(false));

    let _service = ApiTokenService::start(store.clone(), config).await;

    assert_eq!(store.insert_count(), 0);
}

#[tokio::test]
async fn test_malformed_descriptor_inserts_nothing() {
    let store = MockApiTokenStore::new();
    let service = ApiTokenService::new(store.clone(), ApiTokenConfig::default());

    let err = service
        .seed_bootstrap_tokens(&["*:*:good", "not-a-descriptor"])
        .await
        .unwrap_err();

    assert!(matches!(err, TokenError::InvalidBootstrapToken { position: 1, .. }));
    assert_eq!(store.insert_count(), 0);
}

#[tokio::test]
async fn test_failed_insert_keeps_earlier_tokens() {
    let store = MockApiTokenStore::new();
    let service = ApiTokenService::new(store.clone(), ApiTokenConfig::default());

    // The second descriptor collides with the first on the secret's primary key
    let err = service
        .seed_bootstrap_tokens(&["*:*:same", "*:*:same", "*:*:never"])
        .await
        .unwrap_err();

    assert!(matches!(err, TokenError::Store(StoreError::Backend(_))));
    assert_eq!(store.insert_count(), 1);
    assert!(service.get_user_for_token("*:*.same").is_some());
    assert!(service.get_user_for_token("*:*.never").is_none());
}

#[tokio::test]
async fn test_bootstrap_failure_does_not_prevent_start() {
    let store = MockApiTokenStore::new();
    store.fail_reads(StoreError::Unavailable("database starting up".to_string()));

    let service = ApiTokenService::start(store.clone(), bootstrap_config("*:*:abc")).await;

    assert_eq!(store.insert_count(), 0);
    assert!(service.cache().is_empty());
    assert!(service.is_refreshing());
}
