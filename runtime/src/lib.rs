//! # Crud Context Runtime
//!
//! Runtime for tracking asynchronous operations through the status reducer.
//!
//! ## Core Components
//!
//! - **Store**: holds the state, applies the reducer and publishes snapshots
//! - **`OperationSet`**: the named asynchronous operations to track
//! - **Provider**: owns one store for one operation set; hands out contexts
//! - **Actions**: wrapped operations that dispatch `Start` then `Success` or
//!   `Failure` around every call
//! - **Accessor**: weak handle that resolves to a context while its provider lives
//!
//! ## Example
//!
//! ```ignore
//! use crud_context_runtime::{OperationSet, Provider};
//!
//! let operations = OperationSet::new()
//!     .with("list", |()| async { Ok::<_, String>(vec![1, 2, 3]) });
//!
//! let provider = Provider::new(operations);
//! let context = provider.context();
//!
//! context.actions.call(&"list", ()).await?;
//!
//! let state = provider.state();
//! assert_eq!(state.get(&"list").and_then(|s| s.data.clone()), Some(vec![1, 2, 3]));
//! ```

use crud_context_core::environment::{Clock, SystemClock};
use crud_context_core::reducer::{Reducer, Reduction};
use std::sync::{Arc, RwLock};

/// CRUD services bound as operation sets
pub mod crud;

/// Prometheus metrics for observability
pub mod metrics;

/// Transition observers (diagnostic hook)
pub mod observer;

/// Operation sets
pub mod operation;

/// Providers, contexts and wrapped actions
pub mod provider;

pub use crud::{CrudOperationSet, CrudService, ServiceFuture, crud_operations};
pub use observer::{NoopObserver, TracingObserver, Transition, TransitionObserver};
pub use operation::{OperationFuture, OperationSet};
pub use provider::{Accessor, Actions, Context, Provider, WrappedOperation, build};

/// Error types for the runtime
pub mod error {
    use thiserror::Error;

    /// Errors that can occur during Store operations
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum StoreError {
        /// Store is shutting down and not accepting new actions
        ///
        /// Returned by `send()` after `shutdown()` was called. Wrapped
        /// operations that settle after their provider was torn down see this
        /// and drop their terminal action.
        #[error("Store is shutting down")]
        ShutdownInProgress,
    }

    /// A context was requested outside the lifetime of its provider
    ///
    /// This is the only error a consumer of this crate has to handle:
    /// operation failures are recorded as state, never returned.
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum ScopeError {
        /// The provider behind this accessor has been torn down or dropped
        #[error("Context accessed outside of its provider: the provider has been torn down")]
        ProviderGone,
    }

    /// Errors from looking up a wrapped operation
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum ContextError {
        /// The key is not part of the provider's operation set
        #[error("Unknown operation: {0}")]
        UnknownOperation(String),
    }
}

pub use error::{ContextError, ScopeError, StoreError};

/// Configuration for Provider instances
///
/// # Example
///
/// ```ignore
/// let config = ProviderConfig::default()
///     .with_broadcast_capacity(256)
///     .with_catch_panics(false)
///     .with_observer(NoopObserver);
///
/// let provider = Provider::with_config(operations, config);
/// ```
pub struct ProviderConfig<K, T> {
    /// Capacity of the action broadcast channel
    pub broadcast_capacity: usize,
    /// Whether panics inside operations are recorded as failures
    pub catch_panics: bool,
    /// Hook invoked after every applied transition
    pub observer: Arc<dyn observer::TransitionObserver<K, T>>,
    /// Clock stamping each transition
    pub clock: Arc<dyn Clock>,
}

impl<K, T> ProviderConfig<K, T> {
    /// Set the action broadcast capacity
    ///
    /// Zero is raised to one.
    #[must_use]
    pub const fn with_broadcast_capacity(mut self, capacity: usize) -> Self {
        self.broadcast_capacity = if capacity == 0 { 1 } else { capacity };
        self
    }

    /// Enable or disable recording panics as failures
    ///
    /// When disabled, a panicking operation unwinds through the caller of the
    /// wrapped operation and its slice stays `loading`.
    #[must_use]
    pub const fn with_catch_panics(mut self, catch_panics: bool) -> Self {
        self.catch_panics = catch_panics;
        self
    }

    /// Set the transition observer
    #[must_use]
    pub fn with_observer<O>(mut self, observer: O) -> Self
    where
        O: observer::TransitionObserver<K, T> + 'static,
    {
        self.observer = Arc::new(observer);
        self
    }

    /// Set the clock
    #[must_use]
    pub fn with_clock<C>(mut self, clock: C) -> Self
    where
        C: Clock + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }
}

impl<K, T> Default for ProviderConfig<K, T>
where
    K: std::fmt::Debug + 'static,
    T: 'static,
{
    fn default() -> Self {
        Self {
            broadcast_capacity: 16,
            catch_panics: true,
            observer: Arc::new(observer::TracingObserver),
            clock: Arc::new(SystemClock),
        }
    }
}

impl<K, T> Clone for ProviderConfig<K, T> {
    fn clone(&self) -> Self {
        Self {
            broadcast_capacity: self.broadcast_capacity,
            catch_panics: self.catch_panics,
            observer: Arc::clone(&self.observer),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<K, T> std::fmt::Debug for ProviderConfig<K, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("broadcast_capacity", &self.broadcast_capacity)
            .field("catch_panics", &self.catch_panics)
            .finish_non_exhaustive()
    }
}

/// Outcome of sending an action to a [`Store`]
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch<S> {
    /// The reducer applied the action; carries the resulting snapshot
    Applied(S),
    /// The reducer ignored the action; state is unchanged
    Ignored,
}

/// Store module - The runtime for reducers
///
/// Store runtime for coordinating reducer execution and publishing state.
pub mod store {
    use super::{Arc, Dispatch, Reducer, Reduction, RwLock, StoreError};
    use std::sync::PoisonError;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::{broadcast, watch};

    /// The Store - runtime coordinator for a reducer
    ///
    /// The Store manages:
    /// 1. State (behind `RwLock` for concurrent access)
    /// 2. Reducer (state transitions)
    /// 3. Snapshot publication (`watch`) for re-rendering consumers
    /// 4. Action broadcast for observers
    ///
    /// The reducer never awaits, so [`send`](Self::send) is synchronous: the
    /// action is applied, published and broadcast before it returns. All three
    /// happen under the write lock, so snapshot and broadcast order always
    /// match the order in which the reducer applied the actions.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let store = Store::new(StateMap::from_keys(["list"]), StatusReducer::new());
    ///
    /// store.send(StatusAction::Start { op: "list" })?;
    /// let loading = store.state(|s| s.any_loading());
    /// ```
    pub struct Store<R>
    where
        R: Reducer,
    {
        state: Arc<RwLock<R::State>>,
        reducer: R,
        shutdown: Arc<AtomicBool>,
        snapshots: Arc<watch::Sender<R::State>>,
        action_broadcast: broadcast::Sender<R::Action>,
    }

    impl<R> Store<R>
    where
        R: Reducer + Send + Sync + 'static,
        R::State: Clone + Send + Sync + 'static,
        R::Action: Clone + Send + 'static,
    {
        /// Create a new store with initial state and reducer
        ///
        /// The action broadcast capacity defaults to 16.
        #[must_use]
        pub fn new(initial_state: R::State, reducer: R) -> Self {
            Self::with_broadcast_capacity(initial_state, reducer, 16)
        }

        /// Create a new Store with custom action broadcast capacity
        ///
        /// Increase the capacity if action observers frequently lag. A
        /// capacity of zero is raised to one.
        #[must_use]
        pub fn with_broadcast_capacity(initial_state: R::State, reducer: R, capacity: usize) -> Self {
            let (action_broadcast, _) = broadcast::channel(capacity.max(1));
            let (snapshots, _) = watch::channel(initial_state.clone());

            Self {
                state: Arc::new(RwLock::new(initial_state)),
                reducer,
                shutdown: Arc::new(AtomicBool::new(false)),
                snapshots: Arc::new(snapshots),
                action_broadcast,
            }
        }

        /// Send an action to the store
        ///
        /// Runs the reducer under the write lock. When the action applies, the
        /// new state is published on the snapshot channel, the action is
        /// broadcast to action subscribers and the snapshot is returned.
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownInProgress`] if the store is shutting down.
        #[tracing::instrument(skip(self, action), name = "store_send")]
        pub fn send(&self, action: R::Action) -> Result<Dispatch<R::State>, StoreError> {
            if self.shutdown.load(Ordering::Acquire) {
                tracing::debug!("Rejected action: store is shutting down");
                metrics::counter!(crate::metrics::names::ACTIONS_REJECTED).increment(1);
                return Err(StoreError::ShutdownInProgress);
            }

            let observed = action.clone();

            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            tracing::trace!("Acquired write lock on state");

            if self.reducer.reduce(&mut *state, action) == Reduction::Ignored {
                tracing::trace!("Reducer ignored action");
                return Ok(Dispatch::Ignored);
            }

            let snapshot = state.clone();
            self.snapshots.send_replace(snapshot.clone());

            // No receivers is fine: observation is optional
            let _ = self.action_broadcast.send(observed);
            drop(state);

            metrics::counter!(crate::metrics::names::ACTIONS_PROCESSED).increment(1);

            Ok(Dispatch::Applied(snapshot))
        }

        /// Read current state via a closure
        ///
        /// ```ignore
        /// let loading = store.state(|s| s.any_loading());
        /// ```
        pub fn state<F, T>(&self, f: F) -> T
        where
            F: FnOnce(&R::State) -> T,
        {
            let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
            f(&*state)
        }

        /// Latest published state, without touching the lock
        #[must_use]
        pub fn snapshot(&self) -> R::State {
            self.snapshots.borrow().clone()
        }

        /// Subscribe to state snapshots
        ///
        /// The receiver starts at the current state and is notified after
        /// every applied action.
        #[must_use]
        pub fn subscribe(&self) -> watch::Receiver<R::State> {
            self.snapshots.subscribe()
        }

        /// Subscribe to every applied action
        ///
        /// If the receiver lags it skips old actions and receives
        /// `RecvError::Lagged`.
        #[must_use]
        pub fn subscribe_actions(&self) -> broadcast::Receiver<R::Action> {
            self.action_broadcast.subscribe()
        }
    }

    impl<R> Store<R>
    where
        R: Reducer,
    {
        /// Stop accepting actions
        ///
        /// Idempotent. State stays readable after shutdown.
        pub fn shutdown(&self) {
            if !self.shutdown.swap(true, Ordering::AcqRel) {
                tracing::debug!("Store shut down");
            }
        }

        /// Whether [`shutdown`](Self::shutdown) was called
        #[must_use]
        pub fn is_shut_down(&self) -> bool {
            self.shutdown.load(Ordering::Acquire)
        }
    }

    impl<R> Clone for Store<R>
    where
        R: Reducer + Clone,
    {
        fn clone(&self) -> Self {
            Self {
                state: Arc::clone(&self.state),
                reducer: self.reducer.clone(),
                shutdown: Arc::clone(&self.shutdown),
                snapshots: Arc::clone(&self.snapshots),
                action_broadcast: self.action_broadcast.clone(),
            }
        }
    }
}

// Re-export for convenience
pub use store::Store;
