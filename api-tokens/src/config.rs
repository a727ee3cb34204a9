//! Token service configuration.
//!
//! Configuration values should be provided by the host process, not hardcoded.
//! Reading them from files or the environment is the host's job.

use crate::constants::DEFAULT_REFRESH_INTERVAL;
use std::time::Duration;

/// Bootstrap seeding configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapConfig {
    /// Whether seeding runs at all.
    ///
    /// Default: `true` (seeding still only happens when `tokens` is non-empty
    /// and the store is empty).
    pub enabled: bool,

    /// Admin token descriptors, each `project:environment:suffix`.
    pub tokens: Vec<String>,
}

impl BootstrapConfig {
    /// Create bootstrap configuration from a list of descriptors.
    #[must_use]
    pub const fn new(tokens: Vec<String>) -> Self {
        Self {
            enabled: true,
            tokens,
        }
    }

    /// Split a comma-separated operator value into descriptors.
    ///
    /// Blank entries are dropped.
    ///
    /// # Examples
    ///
    /// ```
    /// use api_tokens::BootstrapConfig;
    ///
    /// let config = BootstrapConfig::from_list("*:*:first, *:*:second,");
    /// assert_eq!(config.tokens, vec!["*:*:first", "*:*:second"]);
    /// ```
    #[must_use]
    pub fn from_list(value: &str) -> Self {
        Self::new(
            value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
        )
    }

    /// Enable or disable seeding.
    #[must_use]
    pub const fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Returns `true` if seeding should be attempted.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.enabled && !self.tokens.is_empty()
    }
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

/// Token service configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiTokenConfig {
    /// Period between active-token cache refreshes.
    ///
    /// Default: 60 seconds. Values under one second are raised to one second.
    pub refresh_interval: Duration,

    /// First-boot admin token seeding.
    pub bootstrap: BootstrapConfig,
}

impl ApiTokenConfig {
    /// Create configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cache refresh period.
    #[must_use]
    pub const fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    /// Set the bootstrap configuration.
    #[must_use]
    pub fn with_bootstrap(mut self, bootstrap: BootstrapConfig) -> Self {
        self.bootstrap = bootstrap;
        self
    }
}

impl Default for ApiTokenConfig {
    fn default() -> Self {
        Self {
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            bootstrap: BootstrapConfig::default(),
        }
    }
}
