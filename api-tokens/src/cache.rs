//! Active token cache.
//!
//! Authentication lookups are answered from an in-memory snapshot of every
//! non-expired token, so a request never waits on the store.
//!
//! # Consistency
//!
//! - The snapshot is an immutable `Arc<Vec<ApiToken>>`. Refreshes and appends
//!   build a new list and swap it in with a single assignment, so a lookup
//!   never sees a half-replaced list.
//! - Every refresh draws a ticket before it reads the store. A result is only
//!   applied if no later-started refresh has been applied yet, which lets each
//!   periodic cycle run on its own without older data overwriting newer data.
//! - Tokens appended by [`ActiveTokenCache::insert`] while a refresh is in
//!   flight are carried over into that refresh's result, since the store read
//!   may have missed them.
//! - A failed refresh keeps the previous snapshot (fail-open).
//!
//! Tokens deleted or re-expired in the store stay visible here until the next
//! successful refresh.

use crate::constants::MIN_REFRESH_INTERVAL;
use crate::error::StoreError;
use crate::providers::ApiTokenStore;
use crate::token::{ApiToken, Principal};
use constant_time_eq::constant_time_eq;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};

#[derive(Debug, Default)]
struct Snapshot {
    tokens: Arc<Vec<ApiToken>>,
    /// Ticket of the refresh that produced `tokens` (0 = none yet).
    applied: u64,
    /// Locally inserted tokens, tagged with the last ticket issued at insert.
    recent: Vec<(u64, ApiToken)>,
}

#[derive(Debug, Default)]
struct CacheInner {
    snapshot: RwLock<Snapshot>,
    next_ticket: AtomicU64,
}

/// In-memory snapshot of the active tokens.
///
/// Cheap to clone; clones share the same snapshot.
#[derive(Debug, Clone, Default)]
pub struct ActiveTokenCache {
    inner: Arc<CacheInner>,
}

impl ActiveTokenCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Find the principal for `secret`.
    ///
    /// Exact matches only. Each candidate is compared in constant time.
    #[must_use]
    pub fn lookup(&self, secret: &str) -> Option<Principal> {
        self.snapshot()
            .iter()
            .find(|token| constant_time_eq(token.secret.as_bytes(), secret.as_bytes()))
            .map(ApiToken::to_principal)
    }

    /// Current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Vec<ApiToken>> {
        Arc::clone(&self.read().tokens)
    }

    /// Number of cached tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().tokens.len()
    }

    /// Returns `true` if no tokens are cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replace the whole snapshot, regardless of in-flight refreshes.
    pub fn replace(&self, tokens: Vec<ApiToken>) {
        let ticket = self.next_ticket();
        self.apply(ticket, tokens);
    }

    /// Append a freshly created token so it is usable before the next refresh.
    pub fn insert(&self, token: ApiToken) {
        let mut snapshot = self.write();
        let issued = self.inner.next_ticket.load(Ordering::Relaxed);

        let mut tokens = Vec::with_capacity(snapshot.tokens.len() + 1);
        tokens.extend(snapshot.tokens.iter().cloned());
        tokens.push(token.clone());
        snapshot.tokens = Arc::new(tokens);
        snapshot.recent.push((issued, token));
    }

    /// Reload the snapshot from `store`.
    ///
    /// Returns the number of active tokens the store reported. If a refresh
    /// that started later has already been applied, the result is discarded.
    ///
    /// # Errors
    ///
    /// Returns the store error; the previous snapshot is left untouched.
    pub async fn refresh_from<S: ApiTokenStore>(&self, store: &S) -> Result<usize, StoreError> {
        let ticket = self.next_ticket();
        let tokens = store.get_all_active().await?;
        let count = tokens.len();

        if self.apply(ticket, tokens) {
            tracing::debug!(count, "Active token cache refreshed");
        } else {
            tracing::debug!(ticket, "Discarded refresh result superseded by a newer one");
        }
        Ok(count)
    }

    /// Reload from `store`, logging and swallowing any failure.
    ///
    /// Returns `true` if the store answered.
    pub async fn refresh_or_keep<S: ApiTokenStore>(&self, store: &S) -> bool {
        match self.refresh_from(store).await {
            Ok(_) => true,
            Err(error) if error.is_transient() => {
                tracing::warn!(
                    error = %error,
                    cached = self.len(),
                    "Active token refresh failed, keeping previous snapshot"
                );
                false
            }
            Err(error) => {
                tracing::error!(
                    error = %error,
                    cached = self.len(),
                    "Unexpected error refreshing active tokens, keeping previous snapshot"
                );
                false
            }
        }
    }

    fn next_ticket(&self) -> u64 {
        self.inner.next_ticket.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn apply(&self, ticket: u64, mut tokens: Vec<ApiToken>) -> bool {
        let mut snapshot = self.write();
        if ticket <= snapshot.applied {
            return false;
        }

        // Inserts seen before this ticket was drawn are in the store read
        snapshot.recent.retain(|(issued, _)| *issued >= ticket);
        for (_, token) in &snapshot.recent {
            if !tokens.iter().any(|t| t.secret == token.secret) {
                tokens.push(token.clone());
            }
        }

        snapshot.tokens = Arc::new(tokens);
        snapshot.applied = ticket;
        true
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Snapshot> {
        self.inner
            .snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Snapshot> {
        self.inner
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Spawn the periodic refresh of `cache` from `store`.
///
/// The first refresh fires one `period` after spawning. Each tick runs its
/// refresh as a separate task, so a hung store call only stalls that cycle.
///
/// Abort the returned handle to stop refreshing. Refreshes still in flight
/// are owned by the returned task and are cancelled with it.
///
/// # Panics
///
/// Panics if called outside a Tokio runtime.
pub fn spawn_refresh_task<S>(
    cache: ActiveTokenCache,
    store: Arc<S>,
    period: Duration,
) -> JoinHandle<()>
where
    S: ApiTokenStore + 'static,
{
    let period = period.max(MIN_REFRESH_INTERVAL);

    tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // Dropped with this task, which aborts every cycle still running
        let mut in_flight = JoinSet::new();

        loop {
            interval.tick().await;
            while in_flight.try_join_next().is_some() {}

            let cache = cache.clone();
            let store = Arc::clone(&store);
            in_flight.spawn(async move {
                cache.refresh_or_keep(store.as_ref()).await;
            });
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::MockApiTokenStore;
    use crate::token::{NewApiToken, Permission, Scope, TokenType};
    use chrono::Utc;

    fn token(secret: &str, token_type: TokenType, environment: &str) -> ApiToken {
        ApiToken {
            secret: secret.to_string(),
            project: Scope::named("default"),
            environment: Scope::named(environment),
            token_type,
            username: "tester".to_string(),
            created_at: Utc::now(),
            expires_at: None,
        }
    }

    #[test]
    fn test_lookup_exact_match_only() {
        let cache = ActiveTokenCache::new();
        cache.replace(vec![token("default:prod.aaa", TokenType::Client, "production")]);

        let principal = cache.lookup("default:prod.aaa").unwrap();
        assert!(principal.has_permission(Permission::Client));
        assert_eq!(principal.environment, Scope::named("production"));

        assert!(cache.lookup("unknown").is_none());
        assert!(cache.lookup("default:prod.aa").is_none());
        assert!(cache.lookup("default:prod.aaaa").is_none());
    }

    #[test]
    fn test_lookup_returns_first_match() {
        let cache = ActiveTokenCache::new();
        let mut second = token("dup", TokenType::Client, "production");
        second.username = "second".to_string();
        cache.replace(vec![token("dup", TokenType::Client, "production"), second]);

        assert_eq!(cache.lookup("dup").unwrap().username, "tester");
    }

    #[test]
    fn test_insert_keeps_existing_snapshot_intact() {
        let cache = ActiveTokenCache::new();
        cache.replace(vec![token("a", TokenType::Client, "dev")]);
        let before = cache.snapshot();

        cache.insert(token("b", TokenType::Client, "dev"));

        assert_eq!(before.len(), 1);
        assert_eq!(cache.len(), 2);
        assert!(cache.lookup("b").is_some());
    }

    #[test]
    fn test_stale_ticket_is_discarded() {
        let cache = ActiveTokenCache::new();
        let older = cache.next_ticket();
        let newer = cache.next_ticket();

        assert!(cache.apply(newer, vec![token("new", TokenType::Client, "dev")]));
        assert!(!cache.apply(older, vec![token("old", TokenType::Client, "dev")]));

        assert!(cache.lookup("new").is_some());
        assert!(cache.lookup("old").is_none());
    }

    #[test]
    fn test_insert_survives_refresh_started_before_it() {
        let cache = ActiveTokenCache::new();
        let in_flight = cache.next_ticket();

        cache.insert(token("fresh", TokenType::Client, "dev"));
        assert!(cache.apply(in_flight, vec![token("old", TokenType::Client, "dev")]));

        assert!(cache.lookup("fresh").is_some());
        assert!(cache.lookup("old").is_some());

        // A refresh drawn after the insert trusts the store, e.g. after a delete
        let later = cache.next_ticket();
        assert!(cache.apply(later, Vec::new()));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_snapshot() {
        let store = MockApiTokenStore::new();
        store
            .insert(NewApiToken::client("default", "dev", "tester").with_secret("default:dev.a"))
            .await
            .unwrap();

        let cache = ActiveTokenCache::new();
        assert!(cache.refresh_or_keep(&store).await);
        assert_eq!(cache.len(), 1);

        store.fail_reads(StoreError::Unavailable("timeout".to_string()));
        assert!(!cache.refresh_or_keep(&store).await);
        assert!(cache.lookup("default:dev.a").is_some());

        store.fail_reads(StoreError::Backend("syntax error".to_string()));
        assert!(cache.refresh_from(&store).await.is_err());
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_refresh_picks_up_changes() {
        let store = Arc::new(MockApiTokenStore::new());
        let cache = ActiveTokenCache::new();
        let handle = spawn_refresh_task(cache.clone(), Arc::clone(&store), Duration::from_secs(60));

        store
            .insert(NewApiToken::client("default", "dev", "tester").with_secret("default:dev.a"))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(cache.is_empty());

        tokio::time::sleep(Duration::from_secs(31)).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(cache.len(), 1);

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_cancels_refresh_in_flight() {
        let store = Arc::new(MockApiTokenStore::new());
        store
            .insert(NewApiToken::client("default", "dev", "tester").with_secret("default:dev.a"))
            .await
            .unwrap();
        store.delay_reads(Duration::from_secs(30));

        let cache = ActiveTokenCache::new();
        let handle = spawn_refresh_task(cache.clone(), Arc::clone(&store), Duration::from_secs(60));

        // First cycle starts at 60s and is still waiting on the store at 61s
        tokio::time::sleep(Duration::from_secs(61)).await;
        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());

        tokio::time::sleep(Duration::from_secs(60)).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(cache.is_empty());
    }
}
