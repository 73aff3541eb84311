//! # Storefront Testing
//!
//! Testing utilities and helpers for storefront state containers.
//!
//! This crate provides:
//! - In-memory and failing [`KeyValueStorage`](storefront_core::environment::KeyValueStorage) backends
//! - The [`ReducerTest`] Given-When-Then harness and effect assertions
//! - Test tracing initialisation
//!
//! ## Example
//!
//! ```ignore
//! use storefront_testing::{InMemoryStorage, ReducerTest, assertions};
//!
//! ReducerTest::new(CartReducer::new())
//!     .with_env(())
//!     .given_state(CartState::default())
//!     .when_action(CartIntent::AddToCart(line))
//!     .then_state(|state| assert_eq!(state.len(), 1))
//!     .then_effects(assertions::assert_no_effects)
//!     .run();
//! ```

pub mod storage_mocks;

/// Mock implementations of Environment traits
pub mod mocks {
    pub use crate::storage_mocks::{FailingStorage, InMemoryStorage};
}

/// Test helpers and utilities
pub mod helpers {
    /// Install a `tracing` subscriber that writes through the test harness
    ///
    /// Safe to call from every test; only the first call installs anything.
    /// Honours `RUST_LOG`, defaulting to `debug` for storefront crates.
    pub fn init_tracing() {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "storefront=debug,storefront_runtime=debug".into());

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    }
}

// Re-export commonly used items
pub use mocks::{FailingStorage, InMemoryStorage};
pub use reducer_test::{ReducerTest, assertions};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_tracing_is_idempotent() {
        helpers::init_tracing();
        helpers::init_tracing();
    }
}
