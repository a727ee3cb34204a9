//! First-boot admin token seeding.
//!
//! Operators can hand the service a list of admin token descriptors of the
//! form `project:environment:suffix`. When the store holds no tokens at all,
//! each descriptor becomes a global admin token with the secret
//! `project:environment.suffix`. Once any token exists, seeding is a no-op.
//!
//! Seeding is not transactional: if the third of five inserts fails, the
//! first two stay.

use crate::constants::BOOTSTRAP_USERNAME;
use crate::error::{Result, TokenError};
use crate::providers::ApiTokenStore;
use crate::secret::secret_with_suffix;
use crate::service::ApiTokenService;
use crate::token::{NewApiToken, Scope};
use std::str::FromStr;

/// Parsed bootstrap descriptor.
#[derive(Clone, PartialEq, Eq)]
pub struct BootstrapToken {
    /// Project part of the secret.
    pub project: Scope,

    /// Environment part of the secret.
    pub environment: Scope,

    /// Operator-provided secret suffix.
    suffix: String,
}

impl BootstrapToken {
    /// Parse the descriptor at `position` of the configured list.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::InvalidBootstrapToken`] unless the descriptor has
    /// three non-empty `:`-separated parts. Everything after the second `:`
    /// is the suffix.
    pub fn parse(descriptor: &str, position: usize) -> Result<Self> {
        let invalid = |reason: &str| TokenError::InvalidBootstrapToken {
            position,
            reason: reason.to_string(),
        };

        let mut parts = descriptor.trim().splitn(3, ':');
        let (Some(project), Some(environment), Some(suffix)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid("expected project:environment:secret"));
        };

        if project.is_empty() {
            return Err(invalid("project is empty"));
        }
        if environment.is_empty() {
            return Err(invalid("environment is empty"));
        }
        if suffix.is_empty() {
            return Err(invalid("secret is empty"));
        }

        Ok(Self {
            project: Scope::named(project),
            environment: Scope::named(environment),
            suffix: suffix.to_string(),
        })
    }

    /// Secret the seeded token will carry: `project:environment.suffix`.
    #[must_use]
    pub fn secret(&self) -> String {
        secret_with_suffix(&self.project, &self.environment, &self.suffix)
    }

    /// Global admin token request for this descriptor.
    #[must_use]
    pub fn to_new_token(&self) -> NewApiToken {
        NewApiToken::admin(BOOTSTRAP_USERNAME).with_secret(self.secret())
    }
}

impl FromStr for BootstrapToken {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s, 0)
    }
}

impl std::fmt::Debug for BootstrapToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapToken")
            .field("project", &self.project)
            .field("environment", &self.environment)
            .finish_non_exhaustive()
    }
}

/// Parse every descriptor, failing on the first malformed one.
///
/// # Errors
///
/// Returns [`TokenError::InvalidBootstrapToken`] naming the position of the
/// first malformed descriptor.
pub fn parse_descriptors<D: AsRef<str>>(descriptors: &[D]) -> Result<Vec<BootstrapToken>> {
    descriptors
        .iter()
        .enumerate()
        .map(|(position, descriptor)| BootstrapToken::parse(descriptor.as_ref(), position))
        .collect()
}

/// What a seeding attempt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// The store already had tokens; nothing was inserted.
    AlreadyInitialized {
        /// Tokens found in the store
        existing: u64,
    },

    /// The store was empty and the descriptors were inserted.
    Seeded {
        /// Tokens created
        created: usize,
    },
}

impl<S: ApiTokenStore + 'static> ApiTokenService<S> {
    /// Seed admin tokens from `descriptors` if the store holds no tokens.
    ///
    /// Each token goes through [`ApiTokenService::create_api_token`], so it is
    /// validated and immediately usable.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The store count fails
    /// - A descriptor is malformed (nothing is inserted)
    /// - An insert fails (earlier inserts are kept)
    pub async fn seed_bootstrap_tokens<D: AsRef<str>>(
        &self,
        descriptors: &[D],
    ) -> Result<BootstrapOutcome> {
        let existing = self.store().count().await?;
        if existing > 0 {
            tracing::debug!(existing, "Token store already initialized, skipping bootstrap");
            return Ok(BootstrapOutcome::AlreadyInitialized { existing });
        }

        let tokens = parse_descriptors(descriptors)?;
        for token in &tokens {
            self.create_api_token(token.to_new_token()).await?;
        }

        tracing::info!(created = tokens.len(), "Seeded bootstrap admin tokens");
        Ok(BootstrapOutcome::Seeded {
            created: tokens.len(),
        })
    }
}
