//! Token scoping rules.
//!
//! Admin tokens are global by construction. Client tokens may span every
//! project but must be bound to exactly one environment.

use crate::error::ScopeViolation;
use crate::token::{Scope, TokenType};

/// The `(type, project, environment)` triple a token is issued for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenScope {
    /// Token type.
    pub token_type: TokenType,

    /// Project scope.
    pub project: Scope,

    /// Environment scope.
    pub environment: Scope,
}

impl TokenScope {
    /// Check the triple against the scoping rules.
    ///
    /// # Errors
    ///
    /// Returns the first rule violated, checked in this order:
    /// - [`ScopeViolation::AdminProjectScoped`]
    /// - [`ScopeViolation::AdminEnvironmentScoped`]
    /// - [`ScopeViolation::ClientAllEnvironments`]
    pub fn validate(&self) -> Result<(), ScopeViolation> {
        validate_scope(self.token_type, &self.project, &self.environment)
    }
}

/// Check a `(type, project, environment)` triple against the scoping rules.
///
/// # Examples
///
/// ```
/// use api_tokens::{validate_scope, Scope, ScopeViolation, TokenType};
///
/// assert!(validate_scope(TokenType::Admin, &Scope::All, &Scope::All).is_ok());
/// assert_eq!(
///     validate_scope(TokenType::Client, &Scope::All, &Scope::All),
///     Err(ScopeViolation::ClientAllEnvironments),
/// );
/// ```
///
/// # Errors
///
/// Returns the violated [`ScopeViolation`].
pub fn validate_scope(
    token_type: TokenType,
    project: &Scope,
    environment: &Scope,
) -> Result<(), ScopeViolation> {
    match token_type {
        TokenType::Admin if !project.is_all() => Err(ScopeViolation::AdminProjectScoped),
        TokenType::Admin if !environment.is_all() => Err(ScopeViolation::AdminEnvironmentScoped),
        TokenType::Client if environment.is_all() => Err(ScopeViolation::ClientAllEnvironments),
        TokenType::Admin | TokenType::Client => Ok(()),
    }
}
