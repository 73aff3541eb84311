//! # Storefront Runtime
//!
//! Runtime for the storefront's network-bound state containers.
//!
//! This crate provides the [`Store`] that owns a container's state, runs its
//! reducer and executes the effects the reducer returns.
//!
//! ## Core Components
//!
//! - **Store**: Holds state behind a lock and serialises reducer calls
//! - **Effect Executor**: Spawns effect futures and feeds their result actions back
//! - **Request/Response**: [`Store::send_and_wait_for`] awaits the result action of a command
//! - **Metrics**: counters and histograms, exported through [`metrics::install_recorder`]
//!
//! ## Example
//!
//! ```ignore
//! use storefront_runtime::Store;
//!
//! let store = Store::new(OrderState::default(), OrderReducer::new(), environment);
//!
//! // Fire an intent and wait until its round trip has been reduced
//! let mut handle = store.send(OrderAction::FetchAllOrders { request_id }).await?;
//! handle.wait().await;
//!
//! // Read state
//! let count = store.state(|s| s.all_orders.len()).await;
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use storefront_core::{effect::Effect, reducer::Reducer};
use tokio::sync::{RwLock, watch};

pub mod metrics;

/// Error types for the Store runtime
pub mod error {
    use thiserror::Error;

    /// Errors that can occur during Store operations
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum StoreError {
        /// Store is shutting down and not accepting new actions
        #[error("Store is shutting down")]
        ShutdownInProgress,

        /// Shutdown timed out waiting for effects to complete
        #[error("Shutdown timed out with {0} effects still running")]
        ShutdownTimeout(usize),

        /// Timeout waiting for a result action
        ///
        /// Returned by `send_and_wait_for` when a timeout was given and it
        /// expired before a matching action arrived. The command's effect may
        /// still be running, so the outcome is unknown rather than failed.
        #[error("Timeout waiting for action")]
        Timeout,

        /// The store released the waiter without a result
        ///
        /// Happens when shutdown completes while a waiter's result never came.
        #[error("No result was produced for the action")]
        NoResult,
    }
}

pub use error::StoreError;
pub use store::Store;

/// Handle for waiting on the effects spawned by one `send`
///
/// Only the effects returned for the sent action are tracked. A tracked
/// effect counts as finished once its result action has been reduced, so
/// state read after [`EffectHandle::wait`] reflects the round trip.
pub struct EffectHandle {
    counter: Arc<AtomicUsize>,
    completion: watch::Receiver<()>,
}

impl EffectHandle {
    fn new() -> (Self, EffectTracking) {
        let (notifier, completion) = watch::channel(());
        let counter = Arc::new(AtomicUsize::new(0));
        let handle = Self {
            counter: Arc::clone(&counter),
            completion,
        };
        let tracking = EffectTracking {
            counter,
            notifier: Arc::new(notifier),
        };
        (handle, tracking)
    }

    /// Number of tracked effects still running
    #[must_use]
    pub fn pending(&self) -> usize {
        self.counter.load(Ordering::Acquire)
    }

    /// Wait until every tracked effect has finished
    pub async fn wait(&mut self) {
        while self.counter.load(Ordering::Acquire) > 0 {
            if self.completion.changed().await.is_err() {
                break;
            }
        }
    }

    /// Wait with an upper bound
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Timeout`] if effects are still running when the
    /// timeout elapses.
    pub async fn wait_with_timeout(&mut self, timeout: Duration) -> Result<(), StoreError> {
        tokio::time::timeout(timeout, self.wait())
            .await
            .map_err(|_| StoreError::Timeout)
    }
}

impl std::fmt::Debug for EffectHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectHandle")
            .field("pending", &self.pending())
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
struct EffectTracking {
    counter: Arc<AtomicUsize>,
    notifier: Arc<watch::Sender<()>>,
}

impl EffectTracking {
    fn increment(&self) {
        self.counter.fetch_add(1, Ordering::AcqRel);
    }
}

/// Decrements the tracking counter when an effect task ends, even on panic
struct DecrementGuard(EffectTracking);

impl Drop for DecrementGuard {
    fn drop(&mut self) {
        self.0.counter.fetch_sub(1, Ordering::AcqRel);
        self.0.notifier.send_replace(());
    }
}

/// Decrements the store-wide pending counter used by shutdown
struct PendingGuard(Arc<AtomicUsize>);

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Store module - runtime coordinator for a reducer
pub mod store {
    use super::{
        Arc, AtomicBool, AtomicUsize, DecrementGuard, Duration, Effect, EffectHandle,
        EffectTracking, Ordering, PendingGuard, Reducer, RwLock, StoreError,
    };
    use std::sync::{Mutex, MutexGuard, PoisonError};
    use tokio::sync::oneshot;

    /// A caller parked in [`Store::send_and_wait_for`]
    struct Waiter<A> {
        matches: Box<dyn Fn(&A) -> bool + Send>,
        reply: oneshot::Sender<A>,
    }

    /// The Store - runtime coordinator for a reducer
    ///
    /// The Store manages:
    /// 1. State (behind `RwLock`, written only by the reducer)
    /// 2. Reducer (container logic)
    /// 3. Environment (injected dependencies)
    /// 4. Effect execution (with feedback loop)
    ///
    /// Cloning a Store is cheap and yields a handle to the same state.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let store = Store::new(
    ///     OrderState::default(),
    ///     OrderReducer::new(),
    ///     OrderEnvironment::new(api),
    /// );
    ///
    /// store.send(OrderAction::FetchUserOrders { request_id }).await?;
    /// ```
    pub struct Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        state: Arc<RwLock<S>>,
        reducer: Arc<R>,
        environment: Arc<E>,
        shutdown: Arc<AtomicBool>,
        pending_effects: Arc<AtomicUsize>,
        /// Callers awaiting a result action, each with its own reply channel
        waiters: Arc<Mutex<Vec<Waiter<A>>>>,
    }

    impl<S, A, E, R> Clone for Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        fn clone(&self) -> Self {
            Self {
                state: Arc::clone(&self.state),
                reducer: Arc::clone(&self.reducer),
                environment: Arc::clone(&self.environment),
                shutdown: Arc::clone(&self.shutdown),
                pending_effects: Arc::clone(&self.pending_effects),
                waiters: Arc::clone(&self.waiters),
            }
        }
    }

    impl<S, A, E, R> Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E> + Send + Sync + 'static,
        A: Send + Clone + 'static,
        S: Send + Sync + 'static,
        E: Send + Sync + 'static,
    {
        /// Create a new store with initial state, reducer, and environment
        #[must_use]
        pub fn new(initial_state: S, reducer: R, environment: E) -> Self {
            Self {
                state: Arc::new(RwLock::new(initial_state)),
                reducer: Arc::new(reducer),
                environment: Arc::new(environment),
                shutdown: Arc::new(AtomicBool::new(false)),
                pending_effects: Arc::new(AtomicUsize::new(0)),
                waiters: Arc::new(Mutex::new(Vec::new())),
            }
        }

        /// Send an action to the store
        ///
        /// Runs the reducer under the state write lock, then spawns the
        /// returned effects. Returns immediately with an [`EffectHandle`];
        /// await [`EffectHandle::wait`] to observe the completed round trip.
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownInProgress`] if the store is shutting down.
        #[tracing::instrument(skip(self, action), name = "store_send")]
        pub async fn send(&self, action: A) -> Result<EffectHandle, StoreError> {
            if self.shutdown.load(Ordering::Acquire) {
                tracing::warn!("Rejected action: store is shutting down");
                ::metrics::counter!("store.shutdown.rejected_actions").increment(1);
                return Err(StoreError::ShutdownInProgress);
            }

            tracing::debug!("Processing action");
            ::metrics::counter!("store.commands.total").increment(1);

            let (handle, tracking) = EffectHandle::new();

            let effects = {
                let mut state = self.state.write().await;

                let start = std::time::Instant::now();
                let effects = self.reducer.reduce(&mut state, action, &self.environment);
                ::metrics::histogram!("store.reducer.duration_seconds")
                    .record(start.elapsed().as_secs_f64());

                tracing::trace!("Reducer completed, returned {} effects", effects.len());
                effects
            };

            for effect in effects {
                self.execute_effect(effect, tracking.clone());
            }

            Ok(handle)
        }

        /// Send an action and wait for a matching result action
        ///
        /// Designed for request/response intents: register a waiter, send
        /// the command, then return the first effect-produced action matching
        /// `predicate`. Use a request id in the predicate to tell overlapping
        /// requests apart. Every waiter has its own reply channel, so any
        /// number of requests may overlap.
        ///
        /// With `timeout` set to `None` the call waits for the real outcome.
        ///
        /// # Errors
        ///
        /// - [`StoreError::Timeout`]: No matching action before `timeout`
        /// - [`StoreError::NoResult`]: Shutdown released the waiter
        /// - [`StoreError::ShutdownInProgress`]: The store is shutting down
        pub async fn send_and_wait_for<F>(
            &self,
            action: A,
            predicate: F,
            timeout: Option<Duration>,
        ) -> Result<A, StoreError>
        where
            F: Fn(&A) -> bool + Send + 'static,
        {
            // Register BEFORE sending to avoid missing a fast result
            let (reply, receiver) = oneshot::channel();
            self.lock_waiters().push(Waiter {
                matches: Box::new(predicate),
                reply,
            });

            self.send(action).await?;

            let outcome = async move { receiver.await.map_err(|_| StoreError::NoResult) };
            match timeout {
                Some(timeout) => tokio::time::timeout(timeout, outcome)
                    .await
                    .map_err(|_| StoreError::Timeout)?,
                None => outcome.await,
            }
        }

        /// Read current state via a closure
        ///
        /// ```ignore
        /// let busy = store.state(OrderState::is_busy).await;
        /// ```
        pub async fn state<F, T>(&self, f: F) -> T
        where
            F: FnOnce(&S) -> T,
        {
            let state = self.state.read().await;
            f(&state)
        }

        /// Number of effects still running across all sends
        #[must_use]
        pub fn pending_effects(&self) -> usize {
            self.pending_effects.load(Ordering::SeqCst)
        }

        /// Stop accepting actions and wait for running effects to finish
        ///
        /// Once every effect has finished, callers still waiting for a result
        /// are released with [`StoreError::NoResult`].
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownTimeout`] with the number of effects
        /// still running when `timeout` elapses.
        pub async fn shutdown(&self, timeout: Duration) -> Result<(), StoreError> {
            tracing::info!("Store shutdown initiated");
            self.shutdown.store(true, Ordering::Release);

            let deadline = tokio::time::Instant::now() + timeout;
            loop {
                let pending = self.pending_effects();
                if pending == 0 {
                    let released = {
                        let mut waiters = self.lock_waiters();
                        let released = waiters.len();
                        waiters.clear();
                        released
                    };
                    tracing::info!(released, "Store shutdown complete");
                    return Ok(());
                }
                if tokio::time::Instant::now() >= deadline {
                    tracing::warn!(pending, "Store shutdown timed out");
                    return Err(StoreError::ShutdownTimeout(pending));
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        }

        fn lock_waiters(&self) -> MutexGuard<'_, Vec<Waiter<A>>> {
            self.waiters.lock().unwrap_or_else(PoisonError::into_inner)
        }

        /// Hand a result action to the first waiter it matches
        ///
        /// Waiters whose caller has gone away (timed out or dropped) are
        /// pruned on the way.
        fn deliver(&self, action: A) {
            let mut waiters = self.lock_waiters();
            waiters.retain(|waiter| !waiter.reply.is_closed());

            if let Some(index) = waiters.iter().position(|waiter| (waiter.matches)(&action)) {
                let waiter = waiters.swap_remove(index);
                if waiter.reply.send(action).is_err() {
                    tracing::trace!("Waiter left before its result arrived");
                }
            }
        }

        /// Execute an effect with tracking
        ///
        /// Effect futures run on spawned tasks. A produced action is fed back
        /// through the reducer first and then handed to its waiter, so a
        /// caller that wakes up reads state that already includes it.
        #[allow(clippy::needless_pass_by_value)] // tracking is cloned into the task
        fn execute_effect(&self, effect: Effect<A>, tracking: EffectTracking) {
            match effect {
                Effect::None => {
                    tracing::trace!("Executing Effect::None (no-op)");
                    ::metrics::counter!("store.effects.executed", "type" => "none").increment(1);
                },
                Effect::Future(fut) => {
                    tracing::trace!("Executing Effect::Future");
                    ::metrics::counter!("store.effects.executed", "type" => "future").increment(1);
                    tracking.increment();

                    self.pending_effects.fetch_add(1, Ordering::SeqCst);
                    let pending_guard = PendingGuard(Arc::clone(&self.pending_effects));

                    let guard = DecrementGuard(tracking.clone());
                    let store = self.clone();

                    tokio::spawn(async move {
                        let _guard = guard;
                        let _pending_guard = pending_guard;

                        if let Some(action) = fut.await {
                            if let Err(error) = store.send(action.clone()).await {
                                tracing::warn!(%error, "Dropped effect result action");
                            }
                            store.deliver(action);
                        } else {
                            tracing::trace!("Effect::Future completed with no action");
                        }
                    });
                },
            }
        }
    }
}
