//! Mock provider implementations for testing.
//!
//! This module provides simple, in-memory implementations of the provider
//! traits for use in unit and integration tests.

pub mod clock;
pub mod store;

pub use clock::{FixedClock, test_clock};
pub use store::MockApiTokenStore;
