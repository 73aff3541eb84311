//! # Storefront Core
//!
//! Core traits and types shared by every storefront state container.
//!
//! The cart, the order workflow and the catalog are all written as reducers:
//! a pure function from the current state and a typed intent to the next state
//! plus a list of side effects the runtime should perform.
//!
//! ## Core Concepts
//!
//! - **State**: Data a container owns (cart ledger, order mirrors, product list)
//! - **Action**: Closed enum of intents and results, each with a typed payload
//! - **Reducer**: `(State, Action, Environment) → (State, Effects)`
//! - **Effect**: Description of work (an HTTP round trip), not its execution
//! - **Environment**: Injected dependencies (local storage, API client)
//!
//! ## Example
//!
//! ```ignore
//! use storefront_core::{effect::Effect, reducer::Reducer, smallvec, SmallVec};
//!
//! impl Reducer for CartReducer {
//!     type State = CartState;
//!     type Action = CartIntent;
//!     type Environment = ();
//!
//!     fn reduce(
//!         &self,
//!         state: &mut CartState,
//!         action: CartIntent,
//!         _env: &(),
//!     ) -> SmallVec<[Effect<CartIntent>; 4]> {
//!         // ledger bookkeeping goes here
//!         smallvec![Effect::None]
//!     }
//! }
//! ```

// Re-export commonly used types
pub use smallvec::{smallvec, SmallVec};

/// Reducer module - The core trait for state transitions
///
/// Reducers are pure functions: `(State, Action, Environment) → (State, Effects)`.
/// Every branch of the action enum is handled explicitly, so adding an intent
/// is a compile error until each reducer decides what it means.
pub mod reducer {
    use super::SmallVec;
    use super::effect::Effect;

    /// The Reducer trait - core abstraction for state container logic
    ///
    /// # Type Parameters
    ///
    /// - `State`: The state this reducer operates on
    /// - `Action`: The intent/result type this reducer processes
    /// - `Environment`: The injected dependencies this reducer needs
    ///
    /// # Example
    ///
    /// ```ignore
    /// impl Reducer for OrderReducer {
    ///     type State = OrderState;
    ///     type Action = OrderAction;
    ///     type Environment = OrderEnvironment;
    ///
    ///     fn reduce(
    ///         &self,
    ///         state: &mut OrderState,
    ///         action: OrderAction,
    ///         env: &OrderEnvironment,
    ///     ) -> SmallVec<[Effect<OrderAction>; 4]> {
    ///         match action {
    ///             OrderAction::FetchAllOrders { request_id } => {
    ///                 state.begin_request();
    ///                 let api = Arc::clone(&env.api);
    ///                 smallvec![Effect::Future(Box::pin(async move {
    ///                     Some(match api.fetch_all_orders().await {
    ///                         Ok(orders) => OrderAction::AllOrdersLoaded { request_id, orders },
    ///                         Err(error) => OrderAction::RequestFailed { request_id, error },
    ///                     })
    ///                 }))]
    ///             }
    ///             // ...
    ///         }
    ///     }
    /// }
    /// ```
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// Reduce an action into state changes and effects
        ///
        /// Implementations:
        /// 1. Validate the action against the current state
        /// 2. Update state in place
        /// 3. Return effect descriptions for the runtime to execute
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]>;
    }
}

/// Effect module - Side effect descriptions
///
/// Effects describe work for the runtime. They are values: a reducer can
/// return them without anything happening until a `Store` executes them.
pub mod effect {
    use std::future::Future;
    use std::pin::Pin;

    /// Boxed future produced by an [`Effect::Future`]
    pub type EffectFuture<Action> = Pin<Box<dyn Future<Output = Option<Action>> + Send>>;

    /// Effect type - describes a side effect to be executed
    ///
    /// # Type Parameters
    ///
    /// - `Action`: The action type that effects can produce (feedback loop)
    pub enum Effect<Action> {
        /// No-op effect
        None,

        /// Arbitrary async computation
        ///
        /// Returns `Option<Action>` - if Some, the action is fed back into the reducer
        Future(EffectFuture<Action>),
    }

    // Manual Debug implementation since Future doesn't implement Debug
    impl<Action> std::fmt::Debug for Effect<Action> {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Effect::None => write!(f, "Effect::None"),
                Effect::Future(_) => write!(f, "Effect::Future(<future>)"),
            }
        }
    }

    impl<Action> Effect<Action> {
        /// Wrap an async block as a feedback effect
        #[must_use]
        pub fn future<F>(fut: F) -> Self
        where
            F: Future<Output = Option<Action>> + Send + 'static,
        {
            Effect::Future(Box::pin(fut))
        }

        /// Returns `true` for [`Effect::None`]
        #[must_use]
        pub const fn is_none(&self) -> bool {
            matches!(self, Effect::None)
        }
    }
}

/// Environment module - Dependency injection traits
///
/// All external dependencies a reducer or store touches (persistent local
/// storage, remote APIs) are abstracted behind traits and injected explicitly.
pub mod environment {
    use thiserror::Error;

    /// Errors raised by a [`KeyValueStorage`] backend.
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum StorageError {
        /// The backend could not read or write the key.
        #[error("Storage I/O error for key '{key}': {message}")]
        Io {
            /// Key being accessed
            key: String,
            /// Underlying error description
            message: String,
        },

        /// A value could not be serialized before being written.
        #[error("Failed to serialize value for key '{key}': {message}")]
        Serialization {
            /// Key being written
            key: String,
            /// Underlying error description
            message: String,
        },

        /// A lock guarding the backend was poisoned by a panicking writer.
        #[error("Storage lock poisoned")]
        Poisoned,
    }

    /// Persistent local key-value storage (string keys, string values)
    ///
    /// Mirrors the browser-style local storage the storefront keeps its cart,
    /// token and user record in. Operations are synchronous: the cart persists
    /// after every mutation on the caller's thread.
    ///
    /// # Implementations
    ///
    /// - `FileStorage` (in the `storefront` crate): one file per key on disk
    /// - `InMemoryStorage` (in `storefront-testing`): deterministic tests
    pub trait KeyValueStorage: Send + Sync {
        /// Read a key. A missing key is `Ok(None)`, not an error.
        ///
        /// # Errors
        ///
        /// Returns [`StorageError`] when the backend cannot be read.
        fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

        /// Write (or overwrite) a key.
        ///
        /// # Errors
        ///
        /// Returns [`StorageError`] when the backend cannot be written.
        fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

        /// Delete a key. Deleting a missing key succeeds.
        ///
        /// # Errors
        ///
        /// Returns [`StorageError`] when the backend cannot be written.
        fn remove(&self, key: &str) -> Result<(), StorageError>;
    }
}

#[cfg(test)]
mod tests {
    use super::effect::Effect;

    #[test]
    fn effect_debug_hides_future() {
        let effect: Effect<u8> = Effect::future(async { Some(1) });
        assert_eq!(format!("{effect:?}"), "Effect::Future(<future>)");
        assert_eq!(format!("{:?}", Effect::<u8>::None), "Effect::None");
    }

    #[test]
    fn effect_none_predicate() {
        assert!(Effect::<u8>::None.is_none());
        assert!(!Effect::<u8>::future(async { None }).is_none());
    }

    #[test]
    #[allow(clippy::panic)]
    fn future_effect_resolves_to_action() {
        let effect: Effect<&str> = Effect::future(async { Some("loaded") });
        let Effect::Future(fut) = effect else {
            panic!("expected a future effect");
        };
        assert_eq!(tokio_test::block_on(fut), Some("loaded"));
    }
}
