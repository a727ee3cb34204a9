//! # API Tokens
//!
//! Issues, validates and revokes the bearer secrets ("API tokens") that grant
//! administrative or client-scoped access to the feature-management backend.
//!
//! ## Features
//!
//! - **Scoped**: admin tokens are global, client tokens are bound to one environment
//! - **Unguessable**: secrets carry 256 bits of operating-system randomness
//! - **Fast lookups**: authentication reads an in-memory snapshot, never the store
//! - **Idempotent bootstrap**: operator-supplied admin tokens are seeded once
//! - **Testable**: the store and clock are injected, refreshes can be forced
//!
//! ## Architecture
//!
//! ```text
//!                      ┌──────────────────────┐
//!  create / delete ──▶ │ ApiTokenService      │ ──▶ ApiTokenStore (durable)
//!  update_expiry       │  - scope validation  │           │
//!                      │  - error translation │           │ get_all_active
//!                      └──────────┬───────────┘           ▼
//!                                 │ insert      ┌──────────────────────┐
//!                                 └───────────▶ │ ActiveTokenCache     │ ◀── periodic refresh
//!  get_user_for_token ────────────────────────▶ │ (snapshot, sync read)│
//!                                               └──────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use api_tokens::*;
//!
//! let service = ApiTokenService::start(store, ApiTokenConfig::default()).await;
//!
//! let token = service
//!     .create_api_token(NewApiToken::client("default", "production", "ci-runner"))
//!     .await?;
//!
//! let principal = service.get_user_for_token(&token.secret);
//! assert!(principal.is_some());
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

// Public modules
pub mod bootstrap;
pub mod cache;
pub mod clock;
pub mod config;
pub mod constants;
pub mod error;
pub mod providers;
pub mod secret;
pub mod service;
pub mod token;
pub mod validation;

#[cfg(any(test, feature = "test-utils"))]
pub mod mocks;

// Re-export main types for convenience
pub use bootstrap::{BootstrapOutcome, BootstrapToken};
pub use cache::ActiveTokenCache;
pub use clock::{Clock, SystemClock};
pub use config::{ApiTokenConfig, BootstrapConfig};
pub use error::{Result, ScopeViolation, StoreError, TokenError};
pub use providers::ApiTokenStore;
pub use service::ApiTokenService;
pub use token::{ApiToken, NewApiToken, Permission, Principal, Scope, TokenType};
pub use validation::{TokenScope, validate_scope};
