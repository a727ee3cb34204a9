//! Error types for token issuance and validation.

use thiserror::Error;

/// Result type alias for token service operations.
pub type Result<T> = std::result::Result<T, TokenError>;

/// A scoping rule rejected a `(type, project, environment)` combination.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ScopeViolation {
    /// Admin tokens must cover every project.
    #[error("admin token cannot be scoped to single project")]
    AdminProjectScoped,

    /// Admin tokens must cover every environment.
    #[error("admin token cannot be scoped to single environment")]
    AdminEnvironmentScoped,

    /// Client tokens must name exactly one environment.
    #[error("client token cannot be scoped to all environments")]
    ClientAllEnvironments,
}

/// Failures reported by an [`ApiTokenStore`](crate::providers::ApiTokenStore).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Insert referenced a row that does not exist (project or environment).
    #[error("foreign key violation on constraint {constraint}")]
    ForeignKeyViolation {
        /// Name of the violated constraint
        constraint: String,
    },

    /// No token with the given secret.
    #[error("token not found")]
    NotFound,

    /// The store could not be reached. Expected to clear on its own.
    #[error("token store unavailable: {0}")]
    Unavailable(String),

    /// Any other store failure.
    #[error("token store error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Returns `true` for failures expected to resolve without intervention.
    ///
    /// # Examples
    ///
    /// ```
    /// # use api_tokens::StoreError;
    /// assert!(StoreError::Unavailable("connection reset".into()).is_transient());
    /// assert!(!StoreError::NotFound.is_transient());
    /// ```
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Errors surfaced by the token service.
///
/// Validation errors are user-correctable and never retried. Store errors are
/// passed through exactly as the store reported them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    // ═══════════════════════════════════════════════════════════
    // Validation Errors
    // ═══════════════════════════════════════════════════════════

    /// Token scope breaks a scoping rule.
    #[error(transparent)]
    InvalidScope(#[from] ScopeViolation),

    /// Token references a project the backend does not know.
    #[error("Project={project} does not exist")]
    UnknownProject {
        /// Project identifier supplied by the caller
        project: String,
    },

    /// Token references an environment the backend does not know.
    #[error("Environment={environment} does not exist")]
    UnknownEnvironment {
        /// Environment identifier supplied by the caller
        environment: String,
    },

    /// A configured bootstrap descriptor could not be parsed.
    ///
    /// The descriptor itself is not echoed since it carries secret material.
    #[error("Invalid bootstrap token at position {position}: {reason}")]
    InvalidBootstrapToken {
        /// Zero-based index in the configured list
        position: usize,
        /// What was wrong with it
        reason: String,
    },

    // ═══════════════════════════════════════════════════════════
    // System Errors
    // ═══════════════════════════════════════════════════════════

    /// Store failure that is not a domain validation problem.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl TokenError {
    /// Returns `true` if this error is due to invalid caller input.
    ///
    /// # Examples
    ///
    /// ```
    /// # use api_tokens::{ScopeViolation, StoreError, TokenError};
    /// assert!(TokenError::from(ScopeViolation::AdminProjectScoped).is_validation_error());
    /// assert!(!TokenError::from(StoreError::NotFound).is_validation_error());
    /// ```
    #[must_use]
    pub const fn is_validation_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidScope(_)
                | Self::UnknownProject { .. }
                | Self::UnknownEnvironment { .. }
                | Self::InvalidBootstrapToken { .. }
        )
    }
}
