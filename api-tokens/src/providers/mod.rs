//! Token service providers.
//!
//! This module defines the traits for the external dependencies of the token
//! service. The service depends on these traits, and the host process
//! provides concrete implementations.
//!
//! This enables:
//! - **Testing**: Use mocks (in-memory, deterministic)
//! - **Production**: Use the backend's durable store

pub mod store;

// Re-export provider traits
pub use store::ApiTokenStore;
