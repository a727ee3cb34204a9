//! Token store trait.
//!
//! The durable home of token records. The token service only specifies the
//! contract it needs; the backend supplies the implementation.

use crate::error::StoreError;
use crate::token::{ApiToken, NewApiToken};
use chrono::{DateTime, Utc};
use std::future::Future;

/// Durable storage for API tokens.
///
/// # Implementation Notes
///
/// - `secret` is the primary key and must be unique
/// - `created_at` is assigned by the store on insert
/// - `insert` must reject unknown projects and environments with
///   [`StoreError::ForeignKeyViolation`], naming the violated constraint
///   (see [`constraints`](crate::constants::constraints))
/// - Connectivity problems should be reported as [`StoreError::Unavailable`]
///   so the cache refresh treats them as transient
pub trait ApiTokenStore: Send + Sync {
    /// List every token, expired or not.
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails.
    fn get_all(&self) -> impl Future<Output = Result<Vec<ApiToken>, StoreError>> + Send;

    /// List tokens that have not expired.
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails.
    fn get_all_active(&self) -> impl Future<Output = Result<Vec<ApiToken>, StoreError>> + Send;

    /// Count all tokens.
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails.
    fn count(&self) -> impl Future<Output = Result<u64, StoreError>> + Send;

    /// Insert a token and return the stored record.
    ///
    /// `token.secret` is always populated by the service before insert.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The project or environment does not exist ([`StoreError::ForeignKeyViolation`])
    /// - The storage operation fails
    fn insert(
        &self,
        token: NewApiToken,
    ) -> impl Future<Output = Result<ApiToken, StoreError>> + Send;

    /// Set the expiry of a token and return the updated record.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - No token has this secret ([`StoreError::NotFound`])
    /// - The storage operation fails
    fn set_expiry(
        &self,
        secret: &str,
        expires_at: DateTime<Utc>,
    ) -> impl Future<Output = Result<ApiToken, StoreError>> + Send;

    /// Delete a token.
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails.
    fn delete(&self, secret: &str) -> impl Future<Output = Result<(), StoreError>> + Send;
}
