//! Mock token store for testing.

use crate::clock::{Clock, SystemClock};
use crate::constants::constraints;
use crate::error::StoreError;
use crate::providers::ApiTokenStore;
use crate::token::{ApiToken, NewApiToken, Scope};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Default)]
struct Inner {
    tokens: Vec<ApiToken>,
    /// Known projects; `None` accepts any project.
    projects: Option<HashSet<String>>,
    /// Known environments; `None` accepts any environment.
    environments: Option<HashSet<String>>,
    read_failure: Option<StoreError>,
    write_failure: Option<StoreError>,
    /// Added latency on `get_all_active`.
    read_delay: Option<Duration>,
    inserts: usize,
}

/// Mock token store.
///
/// In-memory token store for testing. Emulates the foreign keys of a real
/// backend when projects or environments are registered, and can be told to
/// fail reads or writes.
#[derive(Clone)]
pub struct MockApiTokenStore {
    inner: Arc<Mutex<Inner>>,
    clock: Arc<dyn Clock>,
}

impl MockApiTokenStore {
    /// Create a new mock token store that accepts any project and environment.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            clock: Arc::new(SystemClock),
        }
    }

    /// Use `clock` for `created_at` stamps and expiry checks.
    #[must_use]
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Only accept tokens for these projects (besides `*`).
    #[must_use]
    pub fn with_projects<I, P>(self, projects: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        self.lock().projects = Some(projects.into_iter().map(Into::into).collect());
        self
    }

    /// Only accept tokens for these environments (besides `*`).
    #[must_use]
    pub fn with_environments<I, E>(self, environments: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<String>,
    {
        self.lock().environments = Some(environments.into_iter().map(Into::into).collect());
        self
    }

    /// Preload rows as if they had been written earlier (not counted as inserts).
    #[must_use]
    pub fn with_tokens(self, tokens: Vec<ApiToken>) -> Self {
        self.lock().tokens.extend(tokens);
        self
    }

    /// Make every read fail with `error` until [`Self::clear_failures`].
    pub fn fail_reads(&self, error: StoreError) {
        self.lock().read_failure = Some(error);
    }

    /// Make every write fail with `error` until [`Self::clear_failures`].
    pub fn fail_writes(&self, error: StoreError) {
        self.lock().write_failure = Some(error);
    }

    /// Make `get_all_active` take `delay` (on the tokio clock) before answering.
    pub fn delay_reads(&self, delay: Duration) {
        self.lock().read_delay = Some(delay);
    }

    /// Stop injecting failures.
    pub fn clear_failures(&self) {
        let mut inner = self.lock();
        inner.read_failure = None;
        inner.write_failure = None;
    }

    /// Number of successful `insert` calls (for testing).
    #[must_use]
    pub fn insert_count(&self) -> usize {
        self.lock().inserts
    }

    /// Get all stored tokens (for testing).
    #[must_use]
    pub fn tokens(&self) -> Vec<ApiToken> {
        self.lock().tokens.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read<T>(&self, f: impl FnOnce(&Inner) -> T) -> Result<T, StoreError> {
        let inner = self.lock();
        match &inner.read_failure {
            Some(error) => Err(error.clone()),
            None => Ok(f(&inner)),
        }
    }
}

impl Default for MockApiTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MockApiTokenStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockApiTokenStore")
            .field("tokens", &self.lock().tokens.len())
            .finish_non_exhaustive()
    }
}

/// Returns `true` if `scope` is the wildcard or a registered name.
fn is_known(scope: &Scope, registry: Option<&HashSet<String>>) -> bool {
    match (scope, registry) {
        (Scope::All, _) | (_, None) => true,
        (Scope::Named(name), Some(known)) => known.contains(name),
    }
}

impl ApiTokenStore for MockApiTokenStore {
    async fn get_all(&self) -> Result<Vec<ApiToken>, StoreError> {
        self.read(|inner| inner.tokens.clone())
    }

    async fn get_all_active(&self) -> Result<Vec<ApiToken>, StoreError> {
        let delay = self.lock().read_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let now = self.clock.now();
        self.read(|inner| {
            inner
                .tokens
                .iter()
                .filter(|token| !token.is_expired_at(now))
                .cloned()
                .collect()
        })
    }

    async fn count(&self) -> Result<u64, StoreError> {
        self.read(|inner| inner.tokens.len() as u64)
    }

    async fn insert(&self, token: NewApiToken) -> Result<ApiToken, StoreError> {
        let created_at = self.clock.now();
        let mut inner = self.lock();

        if let Some(error) = &inner.write_failure {
            return Err(error.clone());
        }
        if !is_known(&token.project, inner.projects.as_ref()) {
            return Err(StoreError::ForeignKeyViolation {
                constraint: constraints::PROJECT_FKEY.to_string(),
            });
        }
        if !is_known(&token.environment, inner.environments.as_ref()) {
            return Err(StoreError::ForeignKeyViolation {
                constraint: constraints::ENVIRONMENT_FKEY.to_string(),
            });
        }

        let Some(secret) = token.secret else {
            return Err(StoreError::Backend("secret must not be null".to_string()));
        };
        if inner.tokens.iter().any(|existing| existing.secret == secret) {
            return Err(StoreError::Backend(
                "duplicate key value violates unique constraint \"api_tokens_pkey\"".to_string(),
            ));
        }

        let stored = ApiToken {
            secret,
            project: token.project,
            environment: token.environment,
            token_type: token.token_type,
            username: token.username,
            created_at,
            expires_at: token.expires_at,
        };
        inner.tokens.push(stored.clone());
        inner.inserts += 1;
        Ok(stored)
    }

    async fn set_expiry(
        &self,
        secret: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<ApiToken, StoreError> {
        let mut inner = self.lock();

        if let Some(error) = &inner.write_failure {
            return Err(error.clone());
        }

        let token = inner
            .tokens
            .iter_mut()
            .find(|token| token.secret == secret)
            .ok_or(StoreError::NotFound)?;
        token.expires_at = Some(expires_at);
        Ok(token.clone())
    }

    async fn delete(&self, secret: &str) -> Result<(), StoreError> {
        let mut inner = self.lock();

        if let Some(error) = &inner.write_failure {
            return Err(error.clone());
        }

        inner.tokens.retain(|token| token.secret != secret);
        Ok(())
    }
}
