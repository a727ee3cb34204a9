//! Token data model.
//!
//! Token records are owned by the store. The service and cache only ever hold
//! copies, and a [`Principal`] is derived from a record on each successful
//! lookup.

use crate::constants::ALL;
use crate::validation::TokenScope;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

// ═══════════════════════════════════════════════════════════════════════
// Scope
// ═══════════════════════════════════════════════════════════════════════

/// Project or environment a token is restricted to.
///
/// `All` is a distinct tagged value, so "every project" can never be confused
/// with a missing or empty identifier. On the wire it is rendered as `*`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Scope {
    /// Wildcard: every project or every environment.
    All,

    /// One specific project or environment.
    Named(String),
}

impl Scope {
    /// Scope restricted to a single named project or environment.
    ///
    /// Passing `*` yields [`Scope::All`].
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self::from(name.into())
    }

    /// Returns `true` for the wildcard scope.
    #[must_use]
    pub const fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    /// String form used in secrets and on the wire.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::All => ALL,
            Self::Named(name) => name,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Scope {
    fn from(value: String) -> Self {
        if value == ALL {
            Self::All
        } else {
            Self::Named(value)
        }
    }
}

impl From<&str> for Scope {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<Scope> for String {
    fn from(scope: Scope) -> Self {
        match scope {
            Scope::All => ALL.to_string(),
            Scope::Named(name) => name,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Token Types
// ═══════════════════════════════════════════════════════════════════════

/// Kind of access a token grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    /// Global administrative access.
    Admin,

    /// SDK access scoped to one environment.
    Client,
}

impl TokenType {
    /// Permission granted to principals holding this token type.
    #[must_use]
    pub const fn permission(self) -> Permission {
        match self {
            Self::Admin => Permission::Admin,
            Self::Client => Permission::Client,
        }
    }
}

/// Permission carried by a [`Principal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Permission {
    /// Administrative access.
    Admin,

    /// Client SDK access.
    Client,
}

// ═══════════════════════════════════════════════════════════════════════
// Records
// ═══════════════════════════════════════════════════════════════════════

/// Persisted API token.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiToken {
    /// Bearer secret, `<project>:<environment>.<suffix>`. Primary identifier.
    pub secret: String,

    /// Project scope.
    pub project: Scope,

    /// Environment scope.
    pub environment: Scope,

    /// Token type.
    #[serde(rename = "type")]
    pub token_type: TokenType,

    /// Principal the token represents (display/audit only).
    pub username: String,

    /// Set by the store on insert.
    pub created_at: DateTime<Utc>,

    /// Expiry; `None` means the token never expires.
    pub expires_at: Option<DateTime<Utc>>,
}

impl ApiToken {
    /// Returns `true` if the token has expired at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }

    /// Derive the principal this token authenticates as.
    #[must_use]
    pub fn to_principal(&self) -> Principal {
        Principal {
            username: self.username.clone(),
            permissions: BTreeSet::from([self.token_type.permission()]),
            project: self.project.clone(),
            environment: self.environment.clone(),
            token_type: self.token_type,
        }
    }
}

impl fmt::Debug for ApiToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiToken")
            .field("secret", &redact_secret(&self.secret))
            .field("project", &self.project)
            .field("environment", &self.environment)
            .field("token_type", &self.token_type)
            .field("username", &self.username)
            .field("created_at", &self.created_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Request to create a token.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewApiToken {
    /// Project scope.
    pub project: Scope,

    /// Environment scope.
    pub environment: Scope,

    /// Token type.
    #[serde(rename = "type")]
    pub token_type: TokenType,

    /// Principal the token represents.
    pub username: String,

    /// Optional expiry.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,

    /// Pre-built secret. Only bootstrap seeding supplies one.
    #[serde(default, skip_serializing)]
    pub secret: Option<String>,
}

impl NewApiToken {
    /// Global admin token request.
    #[must_use]
    pub fn admin(username: impl Into<String>) -> Self {
        Self {
            project: Scope::All,
            environment: Scope::All,
            token_type: TokenType::Admin,
            username: username.into(),
            expires_at: None,
            secret: None,
        }
    }

    /// Client token request for one environment of `project`.
    #[must_use]
    pub fn client(
        project: impl Into<Scope>,
        environment: impl Into<Scope>,
        username: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            environment: environment.into(),
            token_type: TokenType::Client,
            username: username.into(),
            expires_at: None,
            secret: None,
        }
    }

    /// Set the expiry.
    #[must_use]
    pub const fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Use a pre-built secret instead of generating one.
    #[must_use]
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    /// Scope triple checked by the validator.
    #[must_use]
    pub fn scope(&self) -> TokenScope {
        TokenScope {
            token_type: self.token_type,
            project: self.project.clone(),
            environment: self.environment.clone(),
        }
    }
}

impl fmt::Debug for NewApiToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewApiToken")
            .field("project", &self.project)
            .field("environment", &self.environment)
            .field("token_type", &self.token_type)
            .field("username", &self.username)
            .field("expires_at", &self.expires_at)
            .field("secret", &self.secret.as_deref().map(redact_secret))
            .finish()
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Principal
// ═══════════════════════════════════════════════════════════════════════

/// Authenticated caller derived from a valid token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    /// Username recorded on the token.
    pub username: String,

    /// `{Admin}` or `{Client}`.
    pub permissions: BTreeSet<Permission>,

    /// Project scope.
    pub project: Scope,

    /// Environment scope.
    pub environment: Scope,

    /// Token type.
    #[serde(rename = "type")]
    pub token_type: TokenType,
}

impl Principal {
    /// Returns `true` if the principal holds `permission`.
    #[must_use]
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }
}

/// Keep the `project:environment` prefix of a secret and mask the suffix.
///
/// The suffix starts at the first `.` after the `:`; it may itself contain dots.
fn redact_secret(secret: &str) -> String {
    let prefix_end = secret
        .find(':')
        .and_then(|colon| secret[colon..].find('.').map(|dot| colon + dot));
    match prefix_end {
        Some(idx) => format!("{}.****", &secret[..idx]),
        None => "****".to_string(),
    }
}
