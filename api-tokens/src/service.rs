//! Token lifecycle service.
//!
//! `ApiTokenService` ties the pieces together: it validates and persists new
//! tokens, keeps the [`ActiveTokenCache`] in step with its own writes, and
//! answers authentication lookups from that cache.
//!
//! # Startup
//!
//! ```text
//! ApiTokenService::start(store, config)
//!   1. load the active tokens into the cache (failure leaves it empty)
//!   2. seed bootstrap admin tokens if configured (failure is logged)
//!   3. spawn the periodic refresh
//! ```
//!
//! # Staleness
//!
//! Only creates update the cache eagerly. Expiry changes and deletes reach
//! the cache on the next refresh, so a deleted token can keep authenticating
//! for up to one refresh interval.

use crate::cache::{ActiveTokenCache, spawn_refresh_task};
use crate::config::ApiTokenConfig;
use crate::constants::constraints;
use crate::error::{Result, StoreError, TokenError};
use crate::providers::ApiTokenStore;
use crate::secret::generate_secret;
use crate::token::{ApiToken, NewApiToken, Principal, Scope};
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;

/// API token service.
///
/// # Type Parameters
///
/// - `S`: Token store
///
/// Dropping the service stops its periodic refresh.
pub struct ApiTokenService<S> {
    /// Durable token storage.
    store: Arc<S>,

    /// Snapshot used for lookups.
    cache: ActiveTokenCache,

    /// Service configuration.
    config: ApiTokenConfig,

    /// Periodic refresh, once started.
    refresh_task: Mutex<Option<JoinHandle<()>>>,
}

impl<S: ApiTokenStore + 'static> ApiTokenService<S> {
    /// Create a service without touching the store.
    ///
    /// The cache starts empty and nothing refreshes it until
    /// [`Self::initialize`] and [`Self::start_refresh`] are called. Use
    /// [`Self::start`] to do everything at once.
    #[must_use]
    pub fn new(store: S, config: ApiTokenConfig) -> Self {
        Self {
            store: Arc::new(store),
            cache: ActiveTokenCache::new(),
            config,
            refresh_task: Mutex::new(None),
        }
    }

    /// Create, initialize and start a service.
    ///
    /// Returns once the cache has been loaded and bootstrap seeding has run.
    /// Neither step failing prevents the service from starting.
    ///
    /// # Panics
    ///
    /// Panics if not polled within a Tokio runtime.
    pub async fn start(store: S, config: ApiTokenConfig) -> Self {
        let service = Self::new(store, config);
        service.initialize().await;
        service.start_refresh();

        tracing::info!(
            cached = service.cache.len(),
            refresh_interval = ?service.config.refresh_interval,
            "API token service started"
        );
        service
    }

    /// Load the cache and run bootstrap seeding if configured.
    pub async fn initialize(&self) {
        if !self.cache.refresh_or_keep(self.store.as_ref()).await {
            tracing::warn!("Initial active token load failed, cache empty until next refresh");
        }

        let bootstrap = &self.config.bootstrap;
        if !bootstrap.is_active() {
            return;
        }

        match self.seed_bootstrap_tokens(bootstrap.tokens.as_slice()).await {
            Ok(outcome) => tracing::info!(?outcome, "Bootstrap token seeding finished"),
            Err(error) => tracing::error!(error = %error, "Bootstrap token seeding failed"),
        }
    }

    /// Spawn the periodic cache refresh. No-op if it is already running.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn start_refresh(&self) {
        let mut task = self.lock_task();
        if task.is_some() {
            return;
        }
        *task = Some(spawn_refresh_task(
            self.cache.clone(),
            Arc::clone(&self.store),
            self.config.refresh_interval,
        ));
    }

    /// Principal for `secret`, from the cache only.
    #[must_use]
    pub fn get_user_for_token(&self, secret: &str) -> Option<Principal> {
        self.cache.lookup(secret)
    }

    /// Validate, persist and cache a new token.
    ///
    /// A secret is generated unless the request carries one.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The scope breaks a scoping rule ([`TokenError::InvalidScope`])
    /// - The project does not exist ([`TokenError::UnknownProject`])
    /// - The environment does not exist ([`TokenError::UnknownEnvironment`])
    /// - The store fails for any other reason ([`TokenError::Store`])
    pub async fn create_api_token(&self, mut token: NewApiToken) -> Result<ApiToken> {
        token.scope().validate()?;

        if token.secret.is_none() {
            token.secret = Some(generate_secret(&token.project, &token.environment));
        }

        let project = token.project.clone();
        let environment = token.environment.clone();
        let stored = self
            .store
            .insert(token)
            .await
            .map_err(|error| translate_insert_error(error, &project, &environment))?;

        self.cache.insert(stored.clone());

        tracing::info!(
            token_type = ?stored.token_type,
            project = %stored.project,
            environment = %stored.environment,
            username = %stored.username,
            "API token created"
        );
        Ok(stored)
    }

    /// Change the expiry of a token.
    ///
    /// The cache picks the change up on its next refresh.
    ///
    /// # Errors
    ///
    /// Returns the store error unchanged.
    pub async fn update_expiry(&self, secret: &str, expires_at: DateTime<Utc>) -> Result<ApiToken> {
        let token = self.store.set_expiry(secret, expires_at).await?;
        tracing::debug!(
            project = %token.project,
            environment = %token.environment,
            %expires_at,
            "API token expiry updated"
        );
        Ok(token)
    }

    /// Delete a token.
    ///
    /// The cache drops it on its next refresh; until then it still
    /// authenticates.
    ///
    /// # Errors
    ///
    /// Returns the store error unchanged.
    pub async fn delete(&self, secret: &str) -> Result<()> {
        self.store.delete(secret).await?;
        tracing::debug!("API token deleted");
        Ok(())
    }

    /// Every token in the store, bypassing the cache.
    ///
    /// # Errors
    ///
    /// Returns the store error unchanged.
    pub async fn get_all_tokens(&self) -> Result<Vec<ApiToken>> {
        Ok(self.store.get_all().await?)
    }

    /// Every non-expired token in the store, bypassing the cache.
    ///
    /// # Errors
    ///
    /// Returns the store error unchanged.
    pub async fn get_all_active_tokens(&self) -> Result<Vec<ApiToken>> {
        Ok(self.store.get_all_active().await?)
    }

    /// Reload the cache now instead of waiting for the next tick.
    ///
    /// Returns the number of active tokens loaded.
    ///
    /// # Errors
    ///
    /// Returns the store error; the previous snapshot is kept.
    pub async fn refresh_now(&self) -> Result<usize> {
        Ok(self.cache.refresh_from(self.store.as_ref()).await?)
    }

    /// Active token cache backing lookups.
    #[must_use]
    pub const fn cache(&self) -> &ActiveTokenCache {
        &self.cache
    }

    /// Service configuration.
    #[must_use]
    pub const fn config(&self) -> &ApiTokenConfig {
        &self.config
    }

    pub(crate) fn store(&self) -> &S {
        self.store.as_ref()
    }
}

impl<S> ApiTokenService<S> {
    /// Stop the periodic refresh. Safe to call more than once.
    ///
    /// Refreshes already in flight are cancelled along with the timer.
    pub fn destroy(&self) {
        if let Some(task) = self.lock_task().take() {
            task.abort();
            tracing::info!("API token cache refresh stopped");
        }
    }

    /// Returns `true` while the periodic refresh is scheduled.
    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        self.lock_task().as_ref().is_some_and(|task| !task.is_finished())
    }

    fn lock_task(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.refresh_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S> Drop for ApiTokenService<S> {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Map the project and environment constraint failures on insert to
/// validation errors. Every other store error is returned unchanged.
fn translate_insert_error(error: StoreError, project: &Scope, environment: &Scope) -> TokenError {
    match error {
        StoreError::ForeignKeyViolation { constraint }
            if constraint == constraints::ENVIRONMENT_FKEY =>
        {
            TokenError::UnknownEnvironment {
                environment: environment.to_string(),
            }
        }
        StoreError::ForeignKeyViolation { constraint }
            if constraint == constraints::PROJECT_FKEY =>
        {
            TokenError::UnknownProject {
                project: project.to_string(),
            }
        }
        other => TokenError::Store(other),
    }
}
