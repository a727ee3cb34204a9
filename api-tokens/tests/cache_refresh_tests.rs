//! Active token cache behaviour as seen through the service.
//!
//! Time-driven tests run on tokio's paused clock, so a 60 second refresh
//! interval elapses instantly and deterministically.

use api_tokens::{
    ApiToken, ApiTokenConfig, ApiTokenService, ApiTokenStore, NewApiToken, Permission, Scope,
    StoreError, TokenType, mocks::MockApiTokenStore,
};
use chrono::Utc;
use std::time::Duration;

fn client_token(secret: &str, environment: &str) -> ApiToken {
    ApiToken {
        secret: secret.to_string(),
        project: Scope::named("default"),
        environment: Scope::named(environment),
        token_type: TokenType::Client,
        username: "sdk".to_string(),
        created_at: Utc::now(),
        expires_at: None,
    }
}

/// Let spawned refresh tasks run to completion.
async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn test_lookup_from_preloaded_store() {
    let store =
        MockApiTokenStore::new().with_tokens(vec![client_token("default:prod.aaa", "production")]);

    let service = ApiTokenService::start(store, ApiTokenConfig::default()).await;

    let principal = service.get_user_for_token("default:prod.aaa").unwrap();
    assert_eq!(principal.permissions.len(), 1);
    assert!(principal.has_permission(Permission::Client));
    assert!(service.get_user_for_token("unknown").is_none());
}

#[tokio::test]
async fn test_refresh_failure_keeps_previous_snapshot() {
    let store =
        MockApiTokenStore::new().with_tokens(vec![client_token("default:prod.aaa", "production")]);
    let service = ApiTokenService::start(store.clone(), ApiTokenConfig::default()).await;

    store.fail_reads(StoreError::Unavailable("connection refused".to_string()));

    let err = service.refresh_now().await.unwrap_err();
    assert!(!err.is_validation_error());
    assert!(service.get_user_for_token("default:prod.aaa").is_some());

    store.clear_failures();
    store.delete("default:prod.aaa").await.unwrap();
    assert_eq!(service.refresh_now().await.unwrap(), 0);
    assert!(service.get_user_for_token("default:prod.aaa").is_none());
}

#[tokio::test(start_paused = true)]
async fn test_periodic_refresh_applies_store_changes() {
    let store = MockApiTokenStore::new();
    let service = ApiTokenService::start(store.clone(), ApiTokenConfig::default()).await;

    // Written behind the service's back
    store
        .insert(NewApiToken::client("default", "development", "sdk").with_secret("default:development.x"))
        .await
        .unwrap();
    assert!(service.get_user_for_token("default:development.x").is_none());

    tokio::time::sleep(Duration::from_secs(61)).await;
    settle().await;

    assert!(service.get_user_for_token("default:development.x").is_some());
}

#[tokio::test(start_paused = true)]
async fn test_failed_initial_load_recovers_on_next_cycle() {
    let store =
        MockApiTokenStore::new().with_tokens(vec![client_token("default:prod.aaa", "production")]);
    store.fail_reads(StoreError::Unavailable("database starting up".to_string()));

    let service = ApiTokenService::start(store.clone(), ApiTokenConfig::default()).await;
    assert!(service.cache().is_empty());

    // A failing cycle does not stop the timer
    tokio::time::sleep(Duration::from_secs(61)).await;
    settle().await;
    assert!(service.cache().is_empty());
    assert!(service.is_refreshing());

    store.clear_failures();
    tokio::time::sleep(Duration::from_secs(60)).await;
    settle().await;

    assert!(service.get_user_for_token("default:prod.aaa").is_some());
}

#[tokio::test(start_paused = true)]
async fn test_destroy_stops_refreshing() {
    let store = MockApiTokenStore::new();
    let service = ApiTokenService::start(store.clone(), ApiTokenConfig::default()).await;

    service.destroy();
    store
        .insert(NewApiToken::client("default", "development", "sdk").with_secret("default:development.x"))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_secs(300)).await;
    settle().await;

    assert!(service.cache().is_empty());
    assert!(!service.is_refreshing());
}

#[tokio::test(start_paused = true)]
async fn test_destroy_cancels_refresh_in_flight() {
    let store = MockApiTokenStore::new();
    let service = ApiTokenService::start(store.clone(), ApiTokenConfig::default()).await;

    store
        .insert(NewApiToken::client("default", "development", "sdk").with_secret("default:development.x"))
        .await
        .unwrap();
    store.delay_reads(Duration::from_secs(30));

    // The first cycle is waiting on the store when the service shuts down
    tokio::time::sleep(Duration::from_secs(61)).await;
    settle().await;
    service.destroy();

    tokio::time::sleep(Duration::from_secs(60)).await;
    settle().await;

    assert!(service.get_user_for_token("default:development.x").is_none());
}

#[tokio::test(start_paused = true)]
async fn test_custom_refresh_interval() {
    let store = MockApiTokenStore::new();
    let config = ApiTokenConfig::default().with_refresh_interval(Duration::from_secs(5));
    let service = ApiTokenService::start(store.clone(), config).await;

    store
        .insert(NewApiToken::client("default", "development", "sdk").with_secret("default:development.x"))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_secs(6)).await;
    settle().await;

    assert_eq!(service.cache().len(), 1);
}
