//! API token constants.
//!
//! This module contains constant values used throughout the token service.

use std::time::Duration;

/// Wire and secret representation of the wildcard scope.
pub const ALL: &str = "*";

/// Username recorded on admin tokens created by bootstrap seeding.
pub const BOOTSTRAP_USERNAME: &str = "admin";

/// Number of random bytes in a generated secret suffix.
///
/// Rendered as hex this yields 64 characters (256 bits).
pub const SECRET_RANDOM_BYTES: usize = 32;

/// Default period between active-token cache refreshes.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Shortest refresh period the periodic task accepts.
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(1);

/// Foreign-key constraint names reported by the token store.
pub mod constraints {
    /// Constraint tying a token to an existing project.
    pub const PROJECT_FKEY: &str = "api_tokens_project_fkey";

    /// Constraint tying a token to an existing environment.
    pub const ENVIRONMENT_FKEY: &str = "api_tokens_environment_fkey";
}
