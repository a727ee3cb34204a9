//! Secret generation.
//!
//! Secrets embed their scope in clear text, followed by a random suffix:
//!
//! ```text
//! <project>:<environment>.<64 hex chars>
//! ```
//!
//! The suffix comes from the operating system CSPRNG. Bootstrap tokens reuse
//! operator-provided material instead, see [`secret_with_suffix`].

use crate::constants::SECRET_RANDOM_BYTES;
use crate::token::Scope;
use rand::RngCore;
use rand::rngs::OsRng;

/// Generate a new secret for `(project, environment)`.
///
/// # Examples
///
/// ```
/// use api_tokens::Scope;
/// use api_tokens::secret::generate_secret;
///
/// let secret = generate_secret(&Scope::named("default"), &Scope::named("production"));
/// assert!(secret.starts_with("default:production."));
/// ```
#[must_use]
pub fn generate_secret(project: &Scope, environment: &Scope) -> String {
    let mut bytes = [0u8; SECRET_RANDOM_BYTES];
    OsRng.fill_bytes(&mut bytes);
    secret_with_suffix(project, environment, &hex::encode(bytes))
}

/// Build a secret from a caller-supplied suffix.
#[must_use]
pub fn secret_with_suffix(project: &Scope, environment: &Scope, suffix: &str) -> String {
    format!("{project}:{environment}.{suffix}")
}
